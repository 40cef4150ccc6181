use crate::display;
use crate::error::Result;
use crate::host::CommandSpec;

use super::Provisioner;

const STAGE: &str = "packages";

fn apt_get(args: &[&str]) -> CommandSpec {
    CommandSpec::root("apt-get")
        .env("DEBIAN_FRONTEND", "noninteractive")
        .args(args.iter().copied())
}

impl Provisioner<'_> {
    /// Refresh the index, upgrade, then install the prerequisite tools.
    pub(super) fn install_packages(&self) -> Result<()> {
        self.require("apt-get")?;

        display::stage(STAGE, "Updating package index");
        self.runner.run(&apt_get(&["update"]))?;

        display::stage(STAGE, "Upgrading installed packages");
        self.runner.run(&apt_get(&["upgrade", "-y"]))?;

        let packages = &self.config.packages;
        if !packages.is_empty() {
            display::stage(STAGE, &format!("Installing {}", packages.join(", ")));
            self.runner
                .run(&apt_get(&["install", "-y"]).args(packages.iter().cloned()))?;
        }

        display::done(STAGE, "System packages up to date");
        Ok(())
    }
}
