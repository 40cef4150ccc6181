use crate::config::ProvisionConfig;
use crate::display;
use crate::error::Result;
use crate::hardware::Environment;
use crate::host::CommandSpec;

use super::Provisioner;

const STAGE: &str = "container";
const DOCKER_GROUP: &str = "docker";
/// Port the runtime listens on inside the all-in-one image.
const BUNDLED_RUNTIME_PORT: u16 = 11434;

/// `docker run` for the web front-end. GPU passthrough is a launch-time flag;
/// changing it later means recreating the container.
///
/// With a bundled runtime the container also publishes the runtime API and
/// keeps its models in a second volume; otherwise it reaches the host's
/// runtime through `host.docker.internal`.
pub fn docker_run_command(config: &ProvisionConfig, env: &Environment) -> CommandSpec {
    let web = &config.web_ui;
    let mut cmd = CommandSpec::root("docker").args([
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        web.container_name.clone(),
        "--restart".to_string(),
        "always".to_string(),
        "--platform".to_string(),
        env.architecture.docker_platform().to_string(),
        "-p".to_string(),
        format!("{}:{}", config.ports.web_ui, web.container_port),
    ]);
    if web.bundled_runtime {
        cmd = cmd.args([
            "-p".to_string(),
            format!("{}:{}", config.ports.runtime_api, BUNDLED_RUNTIME_PORT),
            "-v".to_string(),
            format!("{}:/root/.ollama", web.runtime_volume),
        ]);
    } else {
        cmd = cmd.args([
            "--add-host=host.docker.internal:host-gateway".to_string(),
            "-e".to_string(),
            format!(
                "OLLAMA_BASE_URL=http://host.docker.internal:{}",
                config.ports.runtime_api
            ),
        ]);
    }
    cmd = cmd.args(["-v".to_string(), format!("{}:/app/backend/data", web.volume)]);
    if env.use_gpu {
        cmd = cmd.args(["--gpus", "all"]);
    }
    cmd.arg(web.effective_image())
}

impl Provisioner<'_> {
    /// Install Docker if needed and (re)create the single front-end container.
    pub(super) fn launch_container(&self, env: &Environment) -> Result<()> {
        if self.probe.has_command("docker") {
            display::stage(STAGE, "Docker already installed");
        } else {
            display::stage(
                STAGE,
                &format!("Installing Docker from {}", self.config.docker.installer_url),
            );
            self.run_installer(&self.config.docker.installer_url)?;
            self.require("docker")?;
        }

        match env.invoking_user.as_deref() {
            Some(user) if user != "root" => {
                display::stage(STAGE, &format!("Adding {} to the {} group", user, DOCKER_GROUP));
                self.runner
                    .run(&CommandSpec::root("usermod").args(["-aG", DOCKER_GROUP, user]))?;
                tracing::info!(user, "group membership applies after the next login");
            }
            _ => display::warning("no non-root invoking user found; skipping docker group setup"),
        }

        let name = self.config.web_ui.container_name.as_str();
        let existing = self
            .runner
            .output(&CommandSpec::root("docker").args(["container", "inspect", name]))?;
        if existing.success {
            display::stage(STAGE, &format!("Replacing existing container {}", name));
            self.runner
                .run(&CommandSpec::root("docker").args(["rm", "-f", name]))?;
        }

        display::stage(
            STAGE,
            &format!(
                "Starting {} ({}{})",
                name,
                self.config.web_ui.effective_image(),
                if env.use_gpu { ", GPU passthrough" } else { "" }
            ),
        );
        self.runner.run(&docker_run_command(self.config, env))?;

        display::done(
            STAGE,
            &format!("Open WebUI running on port {}", self.config.ports.web_ui),
        );
        Ok(())
    }
}
