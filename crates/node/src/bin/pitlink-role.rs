//! Set or show the PitLink node role

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use node::Settings;
use role::{Role, RoleState};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pitlink-role", version, about = "Set or show the PitLink node role")]
struct Cli {
    /// Settings file holding the role file locations
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Make this node a car (production, requires root)
    Car,
    /// Make this node a ground station (production, requires root)
    Ground,
    /// Set a development role, no privilege needed
    Dev {
        /// car or ground
        role: Role,
    },
    /// Print the resolved role
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let config = &settings.role;

    let state = match cli.cmd {
        Command::Car => role::set_production(config, Role::Car)?,
        Command::Ground => role::set_production(config, Role::Ground)?,
        Command::Dev { role: dev_role } => role::set_dev(config, dev_role)?,
        Command::Show => {
            let state = role::resolve(config)?;
            println!("{}", state);
            if state == RoleState::Unset {
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    println!("Role set to {}", state);
    Ok(())
}
