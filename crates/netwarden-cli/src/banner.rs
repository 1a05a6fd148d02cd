//! Startup banner printed by `netwarden serve`.

use colored::Colorize;

pub struct Banner {
    version: String,
}

impl Banner {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    pub fn print(&self) {
        println!(
            "{}",
            "────────────────────────────────────────────".bright_cyan()
        );
        println!(
            "  {} {}",
            "Netwarden".bright_white().bold(),
            format!("v{}", self.version).bright_green()
        );
        println!("  {}", "scan orchestration engine".bright_black());
        println!(
            "{}",
            "────────────────────────────────────────────".bright_cyan()
        );
    }
}
