use crate::display;
use crate::error::{ProvisionError, Result};
use crate::host::CommandSpec;
use crate::runtime::{base_model_name, listing_contains};

use super::Provisioner;

const STAGE: &str = "models";

impl Provisioner<'_> {
    /// Pull each model in order, confirming it is listed before the next pull.
    pub(super) fn fetch_models(&self) -> Result<()> {
        if !self.config.web_ui.bundled_runtime {
            self.require("ollama")?;
        }

        let total = self.config.models.len();
        for (i, model) in self.config.models.iter().enumerate() {
            display::stage(STAGE, &format!("Pulling {} ({}/{})", model, i + 1, total));
            self.runner.run(&self.pull_command(model))?;

            let listing = self.runtime.list_models()?;
            if !listing_contains(&listing, model) {
                return Err(ProvisionError::ModelNotListed {
                    model: model.clone(),
                    base: base_model_name(model).to_string(),
                });
            }
            tracing::info!(model = %model, "model available");
        }
        display::done(STAGE, &format!("{} model(s) available", total));

        let primary = self.config.primary_model();
        display::stage(STAGE, &format!("Loading {} into memory in the background", primary));
        if let Err(e) = self.runtime.warm_up(primary) {
            tracing::debug!(model = %primary, error = %e, "warm-up not dispatched (ignored)");
        }
        Ok(())
    }

    /// `ollama pull` on the host, or inside the container when it bundles the runtime.
    fn pull_command(&self, model: &str) -> CommandSpec {
        if self.config.web_ui.bundled_runtime {
            CommandSpec::root("docker").args([
                "exec",
                self.config.web_ui.container_name.as_str(),
                "ollama",
                "pull",
                model,
            ])
        } else {
            CommandSpec::new("ollama").args(["pull", model])
        }
    }
}
