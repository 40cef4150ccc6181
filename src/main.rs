use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::*;

use llmhost::cli::{Cli, Commands};
use llmhost::display;
use llmhost::logging::{self, LoggingConfig};
use llmhost::{Environment, OllamaClient, ProvisionConfig, Provisioner, SystemProbe, SystemRunner, SystemSpecs};

fn run_detect(config: &ProvisionConfig) -> anyhow::Result<()> {
    let env = Environment::detect(&SystemProbe, config.architecture, config.accelerator)?;
    let specs = SystemSpecs::detect();
    display::display_environment(&env, &specs, config);
    Ok(())
}

fn run_provision(config: &ProvisionConfig) -> anyhow::Result<()> {
    let runner = SystemRunner::detect();
    let runtime = Arc::new(OllamaClient::new(config.ports.runtime_api));
    Provisioner::new(&runner, &SystemProbe, runtime, config).run()?;
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ProvisionConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.apply(cli.overrides());
    tracing::debug!(?config, "effective configuration");

    match cli.command {
        Some(Commands::Detect) => run_detect(&config),
        None => run_provision(&config),
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(&LoggingConfig::from_verbosity(cli.verbose, cli.log_format));

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
