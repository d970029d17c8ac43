//! Command-line interface for livelingo
//!
//! Provides argument parsing using clap derive macros.

use crate::config::{Config, LanguageMode};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Real-time Japanese ⇄ Traditional Chinese speech translation
#[derive(Parser, Debug)]
#[command(
    name = "livelingo",
    version,
    about = "Real-time Japanese ⇄ Traditional Chinese speech translation"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: lifecycle, -vv: every dropped event)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Translation direction
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<LanguageMode>,

    /// Voice used for the translated speech (e.g., Kore, Puck)
    #[arg(long, value_name = "NAME")]
    pub voice: Option<String>,

    /// Microphone to capture from (see `livelingo devices`)
    #[arg(long, value_name = "DEVICE")]
    pub input_device: Option<String>,

    /// Speaker to play translations on
    #[arg(long, value_name = "DEVICE")]
    pub output_device: Option<String>,

    /// Number of finished turns kept in the transcript history
    #[arg(long, value_name = "N")]
    pub history: Option<usize>,
}

impl Cli {
    /// Flags take precedence over file and environment settings.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(mode) = self.mode {
            config.session.mode = mode;
        }
        if let Some(voice) = &self.voice {
            config.session.voice = voice.clone();
        }
        if let Some(device) = &self.input_device {
            config.audio.input_device = Some(device.clone());
        }
        if let Some(device) = &self.output_device {
            config.audio.output_device = Some(device.clone());
        }
        if let Some(history) = self.history {
            config.session.history_capacity = history;
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List audio input and output devices
    Devices,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file location
    Path,
    /// Print the effective configuration (API key redacted)
    Show,
}
