pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod hardware;
pub mod host;
pub mod logging;
pub mod provision;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use config::{Overrides, ProvisionConfig};
pub use error::ProvisionError;
pub use hardware::{AcceleratorPolicy, Architecture, Environment, HostProbe, SystemProbe, SystemSpecs};
pub use host::{CommandRunner, CommandSpec, SystemRunner};
pub use provision::{Outcome, Provisioner};
pub use runtime::{OllamaClient, RuntimeApi};
