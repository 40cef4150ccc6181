//! HTTP access to the model-serving runtime (Ollama).

use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProvisionError, Result};

/// The parts of the runtime's HTTP API the provisioner relies on.
pub trait RuntimeApi: Send + Sync {
    /// Single liveness request; `Err` carries the reason it failed.
    fn check_alive(&self) -> std::result::Result<(), String>;

    /// Identifiers of locally installed models, e.g. `llama3.2:3b`.
    fn list_models(&self) -> Result<Vec<String>>;

    /// Starts loading `model` into memory and returns without waiting. The
    /// request must outlive this process; `Err` means it was never sent.
    fn warm_up(&self, model: &str) -> Result<()>;
}

/// Base model identifier: the part before the tag separator.
pub fn base_model_name(model: &str) -> &str {
    model.split(':').next().unwrap_or(model)
}

/// Whether the listing contains a model with the same base name as `model`.
pub fn listing_contains(listing: &[String], model: &str) -> bool {
    let base = base_model_name(model);
    listing.iter().any(|installed| base_model_name(installed) == base)
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// `ureq`-backed client for a local Ollama daemon.
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    pub fn new(port: u16) -> Self {
        Self::with_base_url(format!("http://127.0.0.1:{}", port))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        OllamaClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `curl` posting an empty-prompt generation, which loads the model
    /// without producing output.
    fn warm_up_command(&self, model: &str) -> Command {
        let body = serde_json::json!({ "model": model, "prompt": "" }).to_string();
        let mut cmd = Command::new("curl");
        cmd.args(["-s", "-o", "/dev/null", "-d"])
            .arg(body)
            .arg(format!("{}/api/generate", self.base_url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl RuntimeApi for OllamaClient {
    fn check_alive(&self) -> std::result::Result<(), String> {
        let url = format!("{}/", self.base_url);
        match ureq::get(&url).timeout(Duration::from_secs(5)).call() {
            Ok(resp) if (200..300).contains(&resp.status()) => Ok(()),
            Ok(resp) => Err(format!("HTTP {}", resp.status())),
            Err(ureq::Error::Status(code, _)) => Err(format!("HTTP {}", code)),
            Err(e) => Err(e.to_string()),
        }
    }

    fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let tags: TagsResponse = ureq::get(&url)
            .timeout(Duration::from_secs(10))
            .call()
            .map_err(|e| ProvisionError::Http(format!("GET {}: {}", url, e)))?
            .into_json()
            .map_err(|e| ProvisionError::Http(format!("GET {}: {}", url, e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn warm_up(&self, model: &str) -> Result<()> {
        let mut cmd = self.warm_up_command(model);
        // Never waited on; the child keeps running after we exit.
        let child = cmd.spawn().map_err(|source| ProvisionError::Spawn {
            command: format!("curl {}/api/generate", self.base_url),
            source,
        })?;
        tracing::debug!(model, pid = child.id(), "warm-up dispatched");
        Ok(())
    }
}
