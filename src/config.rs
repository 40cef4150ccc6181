use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, Result};
use crate::hardware::{AcceleratorPolicy, Architecture};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "llmhost.toml";

/// Environment variable prefix, e.g. `LLMHOST_ALLOW_FROM`.
pub const ENV_PREFIX: &str = "LLMHOST";

/// Everything the provisioning sequence needs, fixed before the first stage runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// `None` means detect from the host.
    pub architecture: Option<Architecture>,
    pub accelerator: AcceleratorPolicy,
    /// Pulled in order; the first one is pre-warmed and used in examples.
    pub models: Vec<String>,
    /// Source range for both firewall rules. Passed through unvalidated.
    pub allow_from: String,
    pub ports: Ports,
    /// Installed with the package manager before anything else.
    pub packages: Vec<String>,
    pub runtime: RuntimeConfig,
    pub web_ui: WebUiConfig,
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ports {
    pub runtime_api: u16,
    pub web_ui: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub installer_url: String,
    /// systemd unit name.
    pub service: String,
    /// Pause between restarting the service and probing it.
    pub settle_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebUiConfig {
    pub image: String,
    pub container_name: String,
    pub volume: String,
    /// Port the front-end listens on inside the container.
    pub container_port: u16,
    /// Run the all-in-one image with the runtime inside the container
    /// instead of installing it on the host.
    pub bundled_runtime: bool,
    /// Image used when `bundled_runtime` is set.
    pub bundled_image: String,
    /// Model store of the bundled runtime, mounted at `/root/.ollama`.
    pub runtime_volume: String,
}

impl WebUiConfig {
    /// The image actually launched for the current mode.
    pub fn effective_image(&self) -> &str {
        if self.bundled_runtime {
            &self.bundled_image
        } else {
            &self.image
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub installer_url: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            architecture: None,
            accelerator: AcceleratorPolicy::Auto,
            models: vec!["llama3.2:3b".to_string(), "qwen2.5:7b".to_string()],
            allow_from: "192.168.1.0/24".to_string(),
            ports: Ports::default(),
            packages: vec!["curl".to_string(), "ufw".to_string(), "pciutils".to_string()],
            runtime: RuntimeConfig::default(),
            web_ui: WebUiConfig::default(),
            docker: DockerConfig::default(),
        }
    }
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            runtime_api: 11434,
            web_ui: 3000,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            installer_url: "https://ollama.com/install.sh".to_string(),
            service: "ollama".to_string(),
            settle_delay_secs: 5,
        }
    }
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            image: "ghcr.io/open-webui/open-webui:main".to_string(),
            container_name: "open-webui".to_string(),
            volume: "open-webui".to_string(),
            container_port: 8080,
            bundled_runtime: false,
            bundled_image: "ghcr.io/open-webui/open-webui:ollama".to_string(),
            runtime_volume: "ollama".to_string(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            installer_url: "https://get.docker.com".to_string(),
        }
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub architecture: Option<Architecture>,
    pub accelerator: Option<AcceleratorPolicy>,
    pub models: Vec<String>,
    pub allow_from: Option<String>,
}

impl ProvisionConfig {
    /// Layers defaults, then the config file, then `LLMHOST_*` variables.
    ///
    /// An explicit `path` must exist; the default `llmhost.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&ProvisionConfig::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        builder = match path {
            Some(p) => builder.add_source(config::File::from(p).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("models")
                    .with_list_parse_key("packages"),
            )
            .build()?;

        let loaded: ProvisionConfig = config.try_deserialize()?;
        tracing::debug!(?path, "configuration loaded");
        Ok(loaded)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if overrides.architecture.is_some() {
            self.architecture = overrides.architecture;
        }
        if let Some(policy) = overrides.accelerator {
            self.accelerator = policy;
        }
        if !overrides.models.is_empty() {
            self.models = overrides.models;
        }
        if let Some(cidr) = overrides.allow_from {
            self.allow_from = cidr;
        }
    }

    /// Rejects configurations the sequence cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ProvisionError::InvalidConfig(msg.to_string()));

        if self.models.iter().all(|m| m.trim().is_empty()) {
            return invalid("at least one model is required");
        }
        if self.models.iter().any(|m| m.trim().is_empty()) {
            return invalid("model identifiers must not be empty");
        }
        if self.allow_from.trim().is_empty() {
            return invalid("allow_from must name a network range");
        }
        if self.ports.runtime_api == 0 || self.ports.web_ui == 0 {
            return invalid("ports must be non-zero");
        }
        if self.ports.runtime_api == self.ports.web_ui {
            return invalid("runtime_api and web_ui ports must differ");
        }
        if self.web_ui.container_name.trim().is_empty() {
            return invalid("web_ui.container_name must not be empty");
        }
        if self.web_ui.bundled_runtime && self.web_ui.runtime_volume.trim().is_empty() {
            return invalid("web_ui.runtime_volume must not be empty with bundled_runtime");
        }
        Ok(())
    }

    /// The pre-warmed model shown in usage examples.
    pub fn primary_model(&self) -> &str {
        self.models.first().map(String::as_str).unwrap_or_default()
    }
}
