use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::Overrides;
use crate::hardware::{AcceleratorPolicy, Architecture};
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "llmhost")]
#[command(about = "Provision this host to serve local LLMs on the LAN (Ollama + Open WebUI)")]
#[command(
    long_about = "Provision this host to serve local LLMs on the LAN.\n\n\
    Updates packages, installs Ollama and binds it to all interfaces, pulls the \
    configured models, starts Open WebUI in Docker and restricts both ports to one \
    network range with ufw.\n\n\
    Models and the allowed range come from llmhost.toml, LLMHOST_MODELS / \
    LLMHOST_ALLOW_FROM, or --model / --allow-from.\n\n\
    WARNING: ufw is enabled at the end of the run. Inbound access not already \
    allowed by a rule, including SSH, will be blocked."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Target 64-bit ARM (skip architecture detection)
    #[arg(long, global = true, conflicts_with = "x86")]
    pub arm: bool,

    /// Target x86_64 (skip architecture detection)
    #[arg(long, global = true)]
    pub x86: bool,

    /// Attach GPU passthrough to the web UI container
    #[arg(long, global = true, conflicts_with = "no_gpu")]
    pub gpu: bool,

    /// Never attach GPU passthrough
    #[arg(long = "no-gpu", global = true)]
    pub no_gpu: bool,

    /// Config file (TOML). Defaults to ./llmhost.toml when present
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Model to pull; repeat to pull several. The first is pre-loaded
    #[arg(short = 'm', long = "model", value_name = "ID", global = true)]
    pub models: Vec<String>,

    /// Network range allowed through the firewall
    #[arg(long, value_name = "CIDR", global = true)]
    pub allow_from: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Show detected architecture and GPU decision without changing anything
    Detect,
}

impl Cli {
    pub fn architecture(&self) -> Option<Architecture> {
        if self.arm {
            Some(Architecture::Arm64)
        } else if self.x86 {
            Some(Architecture::X86_64)
        } else {
            None
        }
    }

    pub fn accelerator(&self) -> Option<AcceleratorPolicy> {
        if self.gpu {
            Some(AcceleratorPolicy::Enabled)
        } else if self.no_gpu {
            Some(AcceleratorPolicy::Disabled)
        } else {
            None
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            architecture: self.architecture(),
            accelerator: self.accelerator(),
            models: self.models.clone(),
            allow_from: self.allow_from.clone(),
        }
    }
}
