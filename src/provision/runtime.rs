use std::time::Duration;

use crate::display;
use crate::error::{ProvisionError, Result};
use crate::host::CommandSpec;

use super::Provisioner;

const STAGE: &str = "runtime";

/// systemd drop-in that binds the runtime to every interface and lifts the
/// cross-origin restriction.
pub fn service_override(port: u16) -> String {
    format!(
        "[Service]\n\
         Environment=\"OLLAMA_HOST=0.0.0.0:{}\"\n\
         Environment=\"OLLAMA_ORIGINS=*\"\n",
        port
    )
}

impl Provisioner<'_> {
    /// Install the runtime, rebind it to the network and check it answers.
    pub(super) fn install_runtime(&self) -> Result<()> {
        let runtime = &self.config.runtime;

        display::stage(STAGE, &format!("Installing Ollama from {}", runtime.installer_url));
        self.run_installer(&runtime.installer_url)?;

        let dropin_dir = format!("/etc/systemd/system/{}.service.d", runtime.service);
        let dropin = format!("{}/override.conf", dropin_dir);
        display::stage(STAGE, &format!("Writing {}", dropin));
        self.runner
            .run(&CommandSpec::root("mkdir").args(["-p", dropin_dir.as_str()]))?;
        self.runner.run(
            &CommandSpec::root("tee")
                .arg(dropin.as_str())
                .stdin(service_override(self.config.ports.runtime_api)),
        )?;

        display::stage(STAGE, &format!("Restarting {}", runtime.service));
        self.runner
            .run(&CommandSpec::root("systemctl").arg("daemon-reload"))?;
        self.runner
            .run(&CommandSpec::root("systemctl").args(["restart", runtime.service.as_str()]))?;

        self.await_runtime()
    }

    /// Waits the settle delay, then makes one liveness request.
    pub(super) fn await_runtime(&self) -> Result<()> {
        let settle = self.config.runtime.settle_delay_secs;
        if settle > 0 {
            tracing::debug!(secs = settle, "waiting for runtime to settle");
            std::thread::sleep(Duration::from_secs(settle));
        }

        let log_hint = if self.config.web_ui.bundled_runtime {
            format!("docker logs {}", self.config.web_ui.container_name)
        } else {
            format!("journalctl -u {} -e", self.config.runtime.service)
        };
        let url = format!("http://127.0.0.1:{}/", self.config.ports.runtime_api);
        self.runtime
            .check_alive()
            .map_err(|reason| ProvisionError::RuntimeUnreachable {
                url: url.clone(),
                log_hint,
                reason,
            })?;

        display::done(STAGE, &format!("Ollama listening on 0.0.0.0:{}", self.config.ports.runtime_api));
        Ok(())
    }
}
