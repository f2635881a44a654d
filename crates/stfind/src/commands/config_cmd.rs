//! Config subcommand handlers.

use stfind_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;
use crate::output;

use super::Context;

pub fn handle(ctx: &Context, args: ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let out = output::render_single(
                ctx.format,
                &ctx.config,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |_| ctx.config_path.display().to_string(),
            );
            output::print_output(out.trim_end(), ctx.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&ctx.config_path.display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if ctx.config_path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!(
                        "{} already exists, pass --force to overwrite it",
                        ctx.config_path.display()
                    ),
                });
            }
            stfind_config::save_config_to(&Config::default(), &ctx.config_path)?;
            if !ctx.quiet {
                eprintln!("Wrote {}", ctx.config_path.display());
            }
            Ok(())
        }
    }
}
