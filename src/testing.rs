//! Scripted stand-ins for the host, used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{ProvisionError, Result};
use crate::hardware::HostProbe;
use crate::host::{CommandOutput, CommandRunner, CommandSpec};
use crate::runtime::{RuntimeApi, base_model_name};

/// Ordered record of commands and runtime API calls.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Records every command; fails the first one whose rendering starts with a
/// registered prefix.
pub struct RecordingRunner {
    pub events: EventLog,
    failures: RefCell<Vec<(String, CommandOutput)>>,
    stdout: RefCell<HashMap<String, String>>,
    commands: RefCell<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new(events: EventLog) -> Self {
        RecordingRunner {
            events,
            failures: RefCell::new(Vec::new()),
            stdout: RefCell::new(HashMap::new()),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn fail_on(self, prefix: &str, code: i32) -> Self {
        self.failures
            .borrow_mut()
            .push((prefix.to_string(), CommandOutput::failed(code, "scripted failure")));
        self
    }

    pub fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.stdout.borrow_mut().insert(prefix.to_string(), stdout.to_string());
        self
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.borrow().clone()
    }

    /// Rendered commands, in invocation order.
    pub fn rendered(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|c| c.to_string()).collect()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.rendered().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl CommandRunner for RecordingRunner {
    fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let rendered = cmd.to_string();
        self.commands.borrow_mut().push(cmd.clone());
        self.events.lock().unwrap().push(format!("cmd: {}", rendered));

        if let Some((_, out)) = self
            .failures
            .borrow()
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
        {
            return Ok(out.clone());
        }
        let stdout = self
            .stdout
            .borrow()
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(CommandOutput::ok(&stdout))
    }
}

/// Runtime API whose listing reflects the models "pulled" so far.
pub struct FakeRuntime {
    events: EventLog,
    pub alive: bool,
    /// Base names that never show up in the listing even after a pull.
    pub hidden: HashSet<String>,
    pub warm_up_fails: bool,
}

impl FakeRuntime {
    pub fn new(events: EventLog) -> Self {
        FakeRuntime {
            events,
            alive: true,
            hidden: HashSet::new(),
            warm_up_fails: false,
        }
    }

    pub fn hide(mut self, base: &str) -> Self {
        self.hidden.insert(base.to_string());
        self
    }

    fn pulled(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("cmd: "))
            .filter_map(|e| e.split_once("ollama pull "))
            .map(|(_, model)| model.to_string())
            .collect()
    }
}

impl RuntimeApi for FakeRuntime {
    fn check_alive(&self) -> std::result::Result<(), String> {
        self.events.lock().unwrap().push("api: alive".to_string());
        if self.alive {
            Ok(())
        } else {
            Err("connection refused".to_string())
        }
    }

    fn list_models(&self) -> Result<Vec<String>> {
        self.events.lock().unwrap().push("api: list".to_string());
        Ok(self
            .pulled()
            .into_iter()
            .filter(|m| !self.hidden.contains(base_model_name(m)))
            .collect())
    }

    fn warm_up(&self, model: &str) -> Result<()> {
        self.events.lock().unwrap().push(format!("api: warm-up {}", model));
        if self.warm_up_fails {
            Err(ProvisionError::Http("model failed to load".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Host probe answering from fixed values.
pub struct FakeProbe {
    machine: String,
    commands: HashSet<String>,
    pci: Option<String>,
    env: HashMap<String, String>,
    machine_reads: Cell<usize>,
}

impl FakeProbe {
    pub fn new(machine: &str) -> Self {
        FakeProbe {
            machine: machine.to_string(),
            commands: HashSet::new(),
            pci: None,
            env: HashMap::new(),
            machine_reads: Cell::new(0),
        }
    }

    pub fn with_command(mut self, program: &str) -> Self {
        self.commands.insert(program.to_string());
        self
    }

    pub fn with_pci(mut self, listing: &str) -> Self {
        self.pci = Some(listing.to_string());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn machine_reads(&self) -> usize {
        self.machine_reads.get()
    }
}

impl HostProbe for FakeProbe {
    fn machine(&self) -> String {
        self.machine_reads.set(self.machine_reads.get() + 1);
        self.machine.clone()
    }

    fn has_command(&self, program: &str) -> bool {
        self.commands.contains(program)
    }

    fn pci_devices(&self) -> Option<String> {
        self.pci.clone()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }
}
