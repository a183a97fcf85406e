//! Configuration management commands for CLI.

use clap::Subcommand;

use chime_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Set the default snooze duration in minutes
    SetSnooze {
        /// Minutes to postpone by default
        minutes: u32,
    },
    /// List the snooze presets
    Presets,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetSnooze { minutes } => {
            if minutes == 0 {
                return Err("snooze duration must be at least one minute".into());
            }
            let mut config = Config::load()?;
            config.snooze.default_minutes = minutes;
            config.save()?;
            println!("Default snooze set to {minutes}m");
        }
        ConfigAction::Presets => {
            let config = Config::load()?;
            for preset in &config.snooze.presets {
                println!("{}  {} min", preset.label, preset.minutes);
            }
        }
    }
    Ok(())
}
