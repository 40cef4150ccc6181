//! The ordered, fail-fast provisioning sequence.
//!
//! Stages run strictly in order and the first error ends the run. Nothing is
//! rolled back: every stage is safe to repeat, so re-running the whole
//! sequence is how a failed run is recovered.

mod container;
mod firewall;
mod models;
mod packages;
mod runtime;

use std::sync::Arc;

use crate::config::ProvisionConfig;
use crate::display::{self, Summary};
use crate::error::{ProvisionError, Result};
use crate::hardware::{Environment, HostProbe};
use crate::host::{CommandRunner, CommandSpec};
use crate::runtime::RuntimeApi;

pub use container::docker_run_command;
pub use firewall::firewall_commands;
pub use runtime::service_override;

/// `curl` fetch of an installer script to stdout; non-2xx responses fail.
pub fn download_command(url: &str) -> CommandSpec {
    CommandSpec::new("curl").args(["-fsSL", url])
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub environment: Environment,
    pub host_ip: String,
}

pub struct Provisioner<'a> {
    runner: &'a dyn CommandRunner,
    probe: &'a dyn HostProbe,
    runtime: Arc<dyn RuntimeApi>,
    config: &'a ProvisionConfig,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        probe: &'a dyn HostProbe,
        runtime: Arc<dyn RuntimeApi>,
        config: &'a ProvisionConfig,
    ) -> Self {
        Provisioner {
            runner,
            probe,
            runtime,
            config,
        }
    }

    /// Detects the environment and runs every stage, then prints the summary.
    pub fn run(&self) -> Result<Outcome> {
        self.config.validate()?;

        // Detection happens before anything touches the host.
        let env = Environment::detect(self.probe, self.config.architecture, self.config.accelerator)?;
        display::stage(
            "detect",
            &format!(
                "architecture {}, GPU passthrough {} ({})",
                env.architecture,
                if env.use_gpu { "on" } else { "off" },
                env.gpu_reason
            ),
        );
        tracing::info!(
            architecture = %env.architecture,
            use_gpu = env.use_gpu,
            "environment resolved"
        );

        self.install_packages()?;
        if self.config.web_ui.bundled_runtime {
            // The runtime lives inside the front-end container, so the
            // container has to be up before models can be pulled.
            self.launch_container(&env)?;
            self.await_runtime()?;
            self.fetch_models()?;
        } else {
            self.install_runtime()?;
            self.fetch_models()?;
            self.launch_container(&env)?;
        }
        self.configure_firewall(&env)?;

        let host_ip = self.primary_ip();
        Summary {
            host_ip: host_ip.clone(),
            config: self.config,
            env: &env,
        }
        .print();

        Ok(Outcome {
            environment: env,
            host_ip,
        })
    }

    /// Fails with `MissingPrerequisite` unless `program` is on `PATH`.
    fn require(&self, program: &str) -> Result<()> {
        if self.probe.has_command(program) {
            Ok(())
        } else {
            Err(ProvisionError::MissingPrerequisite(program.to_string()))
        }
    }

    /// Downloads an installer script, then runs it as root. The download is
    /// its own step so a network failure stops the run here.
    fn run_installer(&self, url: &str) -> Result<()> {
        self.require("curl")?;
        let script = self.runner.run(&download_command(url))?.stdout;
        self.runner.run(&CommandSpec::script(script))?;
        Ok(())
    }

    /// First address from `hostname -I`, or loopback when that is unavailable.
    fn primary_ip(&self) -> String {
        let first = self
            .runner
            .output(&CommandSpec::new("hostname").arg("-I"))
            .ok()
            .filter(|out| out.success)
            .and_then(|out| out.stdout.split_whitespace().next().map(str::to_string));

        match first {
            Some(ip) => ip,
            None => {
                display::warning("could not determine the host IP; showing 127.0.0.1");
                "127.0.0.1".to_string()
            }
        }
    }
}
