use std::fmt;
use std::process::Command;

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::error::{ProvisionError, Result};
use crate::host::command_exists;

/// CPU architecture the web front-end container is launched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Architecture {
    /// Maps a `uname -m` style machine string.
    pub fn from_machine(machine: &str) -> Option<Self> {
        match machine.trim().to_ascii_lowercase().as_str() {
            "aarch64" | "arm64" => Some(Architecture::Arm64),
            "x86_64" | "amd64" => Some(Architecture::X86_64),
            _ => None,
        }
    }

    /// Docker platform string, e.g. `linux/arm64`.
    pub fn docker_platform(&self) -> &'static str {
        match self {
            Architecture::Arm64 => "linux/arm64",
            Architecture::X86_64 => "linux/amd64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
        }
    }
}

/// Whether to attach GPU passthrough to the web front-end container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorPolicy {
    Enabled,
    Disabled,
    #[default]
    Auto,
}

impl fmt::Display for AcceleratorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceleratorPolicy::Enabled => write!(f, "forced on"),
            AcceleratorPolicy::Disabled => write!(f, "forced off"),
            AcceleratorPolicy::Auto => write!(f, "auto"),
        }
    }
}

/// Explicit override wins verbatim; otherwise the machine string decides.
pub fn resolve_architecture(explicit: Option<Architecture>, machine: &str) -> Result<Architecture> {
    if let Some(arch) = explicit {
        return Ok(arch);
    }
    Architecture::from_machine(machine)
        .ok_or_else(|| ProvisionError::UnsupportedArchitecture(machine.trim().to_string()))
}

/// Forced policies ignore both probes; `Auto` enables on either signal.
pub fn resolve_accelerator(policy: AcceleratorPolicy, management_tool: bool, device_listed: bool) -> bool {
    match policy {
        AcceleratorPolicy::Enabled => true,
        AcceleratorPolicy::Disabled => false,
        AcceleratorPolicy::Auto => management_tool || device_listed,
    }
}

/// Read-only questions the detector asks the host.
pub trait HostProbe {
    /// Machine architecture string (`uname -m` style).
    fn machine(&self) -> String;
    /// Whether `program` is on `PATH`.
    fn has_command(&self, program: &str) -> bool;
    /// Enumerated PCI devices, if the listing tool is available.
    fn pci_devices(&self) -> Option<String>;
    fn env_var(&self, key: &str) -> Option<String>;
}

/// Probes the real host.
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn machine(&self) -> String {
        // sysinfo reports the same value as `uname -m`; fall back to the
        // compile target when the kernel query is unavailable.
        System::cpu_arch().unwrap_or_else(|| std::env::consts::ARCH.to_string())
    }

    fn has_command(&self, program: &str) -> bool {
        command_exists(program)
    }

    fn pci_devices(&self) -> Option<String> {
        let output = Command::new("lspci").output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout).ok()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Everything the stages need to know about the host, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub architecture: Architecture,
    pub use_gpu: bool,
    /// How the GPU decision was reached, for reporting.
    pub gpu_reason: String,
    /// Login that should join the docker group (`SUDO_USER`, then `USER`).
    pub invoking_user: Option<String>,
    /// Set when running over SSH; the firewall stage may cut this session.
    pub remote_session: bool,
}

impl Environment {
    /// Fills in whatever the overrides left unset. Never mutates the host.
    pub fn detect(
        probe: &dyn HostProbe,
        arch_override: Option<Architecture>,
        policy: AcceleratorPolicy,
    ) -> Result<Self> {
        let architecture = match arch_override {
            Some(arch) => arch,
            None => {
                let machine = probe.machine();
                tracing::debug!(machine = %machine, "detected machine architecture");
                resolve_architecture(None, &machine)?
            }
        };

        let (use_gpu, gpu_reason) = match policy {
            AcceleratorPolicy::Auto => detect_gpu(probe),
            forced => (
                resolve_accelerator(forced, false, false),
                format!("{} by flag", forced),
            ),
        };

        let invoking_user = probe.env_var("SUDO_USER").or_else(|| probe.env_var("USER"));
        let remote_session = probe.env_var("SSH_CONNECTION").is_some();

        Ok(Environment {
            architecture,
            use_gpu,
            gpu_reason,
            invoking_user,
            remote_session,
        })
    }
}

fn detect_gpu(probe: &dyn HostProbe) -> (bool, String) {
    // NVIDIA management tool first, then the PCI listing.
    let smi = probe.has_command("nvidia-smi");
    if smi {
        return (
            resolve_accelerator(AcceleratorPolicy::Auto, true, false),
            "nvidia-smi found".to_string(),
        );
    }

    let listed = probe
        .pci_devices()
        .map(|devices| {
            devices.lines().any(|line| {
                let lower = line.to_lowercase();
                lower.contains("nvidia")
                    && (lower.contains("vga") || lower.contains("3d controller"))
            })
        })
        .unwrap_or(false);

    if resolve_accelerator(AcceleratorPolicy::Auto, false, listed) {
        (true, "NVIDIA device in lspci".to_string())
    } else {
        (false, "no NVIDIA GPU detected".to_string())
    }
}

/// Host facts shown by `llmhost detect` and in the summary.
#[derive(Debug, Clone)]
pub struct SystemSpecs {
    pub total_ram_gb: f64,
    pub total_cpu_cores: usize,
    pub cpu_name: String,
    pub os: String,
}

impl SystemSpecs {
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        let total_ram_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let total_cpu_cores = sys.cpus().len();
        let cpu_name = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Unknown CPU".to_string());
        let os = System::long_os_version().unwrap_or_else(|| "Unknown OS".to_string());

        SystemSpecs {
            total_ram_gb,
            total_cpu_cores,
            cpu_name,
            os,
        }
    }
}
