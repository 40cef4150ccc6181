use crate::config::ProvisionConfig;
use crate::display;
use crate::error::Result;
use crate::hardware::Environment;
use crate::host::CommandSpec;

use super::Provisioner;

const STAGE: &str = "firewall";

fn allow_rule(cidr: &str, port: u16, comment: &str) -> CommandSpec {
    CommandSpec::root("ufw")
        .args(["allow", "from", cidr, "to", "any", "port"])
        .arg(port.to_string())
        .args(["proto", "tcp", "comment", comment])
}

fn allow_rules(config: &ProvisionConfig) -> [CommandSpec; 2] {
    [
        allow_rule(&config.allow_from, config.ports.runtime_api, "Ollama API"),
        allow_rule(&config.allow_from, config.ports.web_ui, "Open WebUI"),
    ]
}

fn enable_command() -> CommandSpec {
    CommandSpec::root("ufw").args(["--force", "enable"])
}

/// The two allow rules followed by the enable, in order.
pub fn firewall_commands(config: &ProvisionConfig) -> Vec<CommandSpec> {
    let mut commands = allow_rules(config).to_vec();
    commands.push(enable_command());
    commands
}

impl Provisioner<'_> {
    /// Open both service ports to the configured range and enable ufw.
    ///
    /// Enabling is unconditional. Inbound paths not covered by an existing
    /// rule, SSH included, are closed; the operator is warned, no rules are
    /// added on their behalf.
    pub(super) fn configure_firewall(&self, env: &Environment) -> Result<()> {
        self.require("ufw")?;

        for rule in allow_rules(self.config) {
            display::stage(STAGE, &rule.to_string());
            self.runner.run(&rule)?;
        }

        display::firewall_warning(
            &self.config.allow_from,
            &[self.config.ports.runtime_api, self.config.ports.web_ui],
            env.remote_session,
        );
        if env.remote_session {
            tracing::warn!("enabling firewall from a remote session");
        }

        display::stage(STAGE, "Enabling ufw");
        self.runner.run(&enable_command())?;

        display::done(
            STAGE,
            &format!(
                "ports {} and {} open to {}",
                self.config.ports.runtime_api, self.config.ports.web_ui, self.config.allow_from
            ),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hardware::Architecture;
    use crate::provision::tests::{full_probe, test_config};
    use crate::testing::{EventLog, FakeProbe, FakeRuntime, RecordingRunner};

    fn env(remote: bool) -> Environment {
        Environment {
            architecture: Architecture::Arm64,
            use_gpu: false,
            gpu_reason: String::new(),
            invoking_user: None,
            remote_session: remote,
        }
    }

    #[test]
    fn cidr_is_passed_through_verbatim() {
        let mut config = ProvisionConfig::default();
        config.allow_from = "anything-goes".to_string();
        let rendered: Vec<_> = firewall_commands(&config).iter().map(|c| c.to_string()).collect();

        assert_eq!(rendered.len(), 3);
        assert!(rendered[0].contains("from anything-goes to any port 11434"));
        assert!(rendered[1].contains("from anything-goes to any port 3000"));
        assert_eq!(rendered[2], "ufw --force enable");
    }

    #[test]
    fn rule_failure_leaves_firewall_disabled() {
        let events = EventLog::default();
        let runner = RecordingRunner::new(events.clone()).fail_on("ufw allow from 10.1.0.0/16 to any port 3000", 1);
        let probe = full_probe("x86_64");
        let config = test_config();
        let p = Provisioner::new(&runner, &probe, Arc::new(FakeRuntime::new(events)), &config);

        assert!(p.configure_firewall(&env(true)).is_err());
        assert_eq!(runner.count_starting_with("ufw --force enable"), 0);
    }

    #[test]
    fn requires_ufw() {
        let events = EventLog::default();
        let runner = RecordingRunner::new(events.clone());
        let probe = FakeProbe::new("x86_64");
        let config = test_config();
        let p = Provisioner::new(&runner, &probe, Arc::new(FakeRuntime::new(events)), &config);

        assert!(p.configure_firewall(&env(false)).is_err());
        assert!(runner.rendered().is_empty());
    }
}
