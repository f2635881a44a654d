//! Login / logout handlers.

use crate::cli::LoginArgs;
use crate::error::CliError;

use super::{Context, util};

pub async fn handle(ctx: &Context, args: &LoginArgs) -> Result<(), CliError> {
    let tracker = ctx.tracker()?;
    let session = util::interactive_login(&tracker, ctx).await?;

    if args.no_save {
        tracing::info!("session not persisted (--no-save)");
        return Ok(());
    }
    util::persist_session(&session)?;
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<(), CliError> {
    stfind_config::clear_session()?;
    if !ctx.quiet {
        eprintln!("Stored session removed.");
    }
    Ok(())
}
