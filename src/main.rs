use anyhow::Result;
use clap::{CommandFactory, Parser};
use livelingo::app::run_session_command;
use livelingo::audio::device::{Direction, list_devices};
use livelingo::cli::{Cli, Commands, ConfigAction};
use livelingo::config::Config;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        None => {
            let config = cli.apply_overrides(load_config(cli.config.as_deref())?);
            if run_session_command(config, cli.quiet).await.is_err() {
                // Already reported through the session's error line.
                std::process::exit(1);
            }
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { ref action }) => {
            handle_config_command(action, &cli)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "livelingo",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the `log` backend. `RUST_LOG` wins over `-v`.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("livelingo={level}")),
    )
    .format_timestamp(None)
    .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/livelingo/config.toml)
/// 3. Built-in defaults
///
/// Environment variables are applied on top.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// List available audio input and output devices.
fn list_audio_devices() -> Result<()> {
    let inputs = list_devices(Direction::Input)?;
    let outputs = list_devices(Direction::Output)?;

    if inputs.is_empty() && outputs.is_empty() {
        eprintln!("No audio devices found");
        std::process::exit(1);
    }

    let color = std::io::stdout().is_terminal();
    for (title, devices) in [("Input devices:", &inputs), ("Output devices:", &outputs)] {
        if color {
            println!("{}", title.bold());
        } else {
            println!("{title}");
        }
        if devices.is_empty() {
            println!("  (none)");
        }
        for (idx, device) in devices.iter().enumerate() {
            println!("  [{}] {}", idx, device);
        }
    }

    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Show => {
            let config = cli.apply_overrides(load_config(cli.config.as_deref())?);
            print!("{}", config.redacted().to_toml_string()?);
        }
    }
    Ok(())
}
