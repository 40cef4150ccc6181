use colored::*;
use tabled::{Table, Tabled, settings::Style};

use crate::config::ProvisionConfig;
use crate::hardware::{Environment, SystemSpecs};

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(name: &str, value: impl Into<String>) -> SettingRow {
    SettingRow {
        name: name.to_string(),
        value: value.into(),
    }
}

/// One stage-labeled progress line.
pub fn stage(label: &str, message: &str) {
    println!("{} {} {}", "==>".bold().cyan(), format!("[{}]", label).bold(), message);
}

pub fn done(label: &str, message: &str) {
    println!("{} {} {}", " ✓ ".green().bold(), format!("[{}]", label).bold(), message);
}

/// Non-fatal problems go to stderr, away from the stage lines.
pub fn warning(message: &str) {
    eprintln!("{}", render_warning(message));
}

fn render_warning(message: &str) -> String {
    format!("{} {}", " ! ".yellow().bold(), message.yellow())
}

/// Printed before the firewall is enabled; enabling can drop SSH access.
pub fn firewall_warning(allow_from: &str, ports: &[u16], remote_session: bool) {
    let ports = ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    println!();
    println!("{}", "┌─ FIREWALL ────────────────────────────────────────────────────┐".yellow().bold());
    println!(
        "  Enabling ufw with inbound access only to TCP ports {} from {}.",
        ports, allow_from
    );
    println!("  Any other inbound port (including SSH) is closed unless an");
    println!("  existing rule already allows it.");
    if remote_session {
        println!(
            "  {}",
            "You are connected over SSH: this session may be cut off."
                .red()
                .bold()
        );
        println!("  Add a rule first if needed, e.g.: sudo ufw allow from {} to any port 22 proto tcp", allow_from);
    }
    println!("{}", "└───────────────────────────────────────────────────────────────┘".yellow().bold());
    println!();
}

/// Output of `llmhost detect`.
pub fn display_environment(env: &Environment, specs: &SystemSpecs, config: &ProvisionConfig) {
    println!("\n{}", "=== Host Detection ===".bold().cyan());

    let gpu = if env.use_gpu {
        format!("{} ({})", "enabled".green(), env.gpu_reason)
    } else {
        format!("{} ({})", "disabled".yellow(), env.gpu_reason)
    };
    let rows = vec![
        row("OS", specs.os.clone()),
        row("CPU", format!("{} ({} cores)", specs.cpu_name, specs.total_cpu_cores)),
        row("Total RAM", format!("{:.2} GB", specs.total_ram_gb)),
        row("Architecture", env.architecture.to_string()),
        row("Container platform", env.architecture.docker_platform()),
        row("GPU passthrough", gpu),
        row("Invoking user", env.invoking_user.clone().unwrap_or_else(|| "-".to_string())),
        row("Remote session", if env.remote_session { "yes" } else { "no" }),
        row("Runtime", runtime_placement(config)),
        row("Models", config.models.join(", ")),
        row("Allowed range", config.allow_from.clone()),
    ];

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!();
}

fn runtime_placement(config: &ProvisionConfig) -> String {
    if config.web_ui.bundled_runtime {
        format!("inside container {}", config.web_ui.container_name)
    } else {
        format!("host service {}", config.runtime.service)
    }
}

/// Final report of a successful run.
pub struct Summary<'a> {
    pub host_ip: String,
    pub config: &'a ProvisionConfig,
    pub env: &'a Environment,
}

impl Summary<'_> {
    pub fn runtime_url(&self) -> String {
        format!("http://{}:{}", self.host_ip, self.config.ports.runtime_api)
    }

    pub fn web_ui_url(&self) -> String {
        format!("http://{}:{}", self.host_ip, self.config.ports.web_ui)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let primary = self.config.primary_model();

        out.push_str(&format!("\n{}\n", "=== Setup Complete ===".bold().green()));

        let rows = vec![
            row("Architecture", self.env.architecture.to_string()),
            row("GPU passthrough", if self.env.use_gpu { "enabled" } else { "disabled" }),
            row("Ollama API", self.runtime_url()),
            row("Open WebUI", self.web_ui_url()),
            row("Allowed from", self.config.allow_from.clone()),
            row("Models", self.config.models.join("\n")),
        ];
        out.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        out.push('\n');

        out.push_str(&format!("\n{}\n", "Try it:".bold().underline()));
        if self.config.web_ui.bundled_runtime {
            out.push_str(&format!(
                "  docker exec -it {} ollama run {}\n",
                self.config.web_ui.container_name, primary
            ));
        } else {
            out.push_str(&format!("  ollama run {}\n", primary));
        }
        out.push_str(&format!(
            "  curl {}/api/generate -d '{{\"model\": \"{}\", \"prompt\": \"Hello\"}}'\n",
            self.runtime_url(),
            primary
        ));
        out.push_str(&format!("  open {} in a browser on the local network\n", self.web_ui_url()));

        if let Some(user) = self.env.invoking_user.as_deref().filter(|u| *u != "root") {
            out.push_str(&format!(
                "\n{} log out and back in for '{}' to use docker without sudo.\n",
                "Note:".bold(),
                user
            ));
        }
        out
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}
