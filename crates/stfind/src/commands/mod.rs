//! Command dispatch: bridges CLI args -> tracker operations -> output.

pub mod config_cmd;
pub mod devices;
pub mod login;
pub mod ring;
pub mod util;
pub mod watch;

use std::path::PathBuf;

use clap::ValueEnum;
use stfind_config::Config;
use stfind_core::Tracker;

use crate::cli::{ColorMode, Command, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Resolved settings shared by every handler.
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Context {
    /// Load the config file and apply command-line overrides.
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config_path = global
            .config
            .clone()
            .unwrap_or_else(stfind_config::config_path);
        let mut config = stfind_config::load_config_from(&config_path)?;
        if let Some(timeout) = global.timeout {
            config.timeout_secs = timeout;
        }

        let format = match global.output {
            Some(format) => format,
            None => parse_enum::<OutputFormat>("output", &config.output)?,
        };
        let color_mode = match global.color {
            Some(mode) => mode,
            None => parse_enum::<ColorMode>("color", &config.color)?,
        };

        Ok(Self {
            config,
            config_path,
            format,
            color: output::should_color(color_mode),
            quiet: global.quiet,
        })
    }

    /// A tracker built from the loaded config. Does no I/O.
    pub fn tracker(&self) -> Result<Tracker, CliError> {
        Ok(Tracker::new(self.config.to_tracker_config()?)?)
    }
}

fn parse_enum<T: ValueEnum>(field: &str, raw: &str) -> Result<T, CliError> {
    T::from_str(raw, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => login::handle(ctx, &args).await,
        Command::Logout => login::logout(ctx),
        Command::Devices(args) => devices::handle(ctx, args).await,
        Command::Ring(args) => ring::handle(ctx, &args).await,
        Command::Watch(args) => watch::handle(ctx, &args).await,
        Command::Config(args) => config_cmd::handle(ctx, args),
        // Handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}
