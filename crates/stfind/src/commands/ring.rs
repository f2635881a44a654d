//! Ring command handler.

use serde::Serialize;
use stfind_core::RingOutcome;

use crate::cli::RingArgs;
use crate::error::CliError;
use crate::output;

use super::{Context, util};

#[derive(Serialize)]
struct RingReport<'a> {
    id: &'a str,
    outcome: RingOutcome,
}

pub async fn handle(ctx: &Context, args: &RingArgs) -> Result<(), CliError> {
    let tracker = ctx.tracker()?;
    util::restore_session(&tracker)?;

    let outcome = match tracker.ring(&args.id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_auth_invalid() {
                util::forget_session();
            }
            return Err(e.into());
        }
    };

    if outcome == RingOutcome::Rejected {
        return Err(CliError::Rejected {
            message: format!("the service refused to ring '{}'", args.id),
        });
    }

    let report = RingReport {
        id: &args.id,
        outcome,
    };
    let out = output::render_single(
        ctx.format,
        &report,
        |r| {
            format!(
                "Ring request accepted for {}.\n{}",
                r.id,
                output::dim_text(
                    "It rings only if a phone or tablet signed in to the account is in Bluetooth range.",
                    ctx.color
                )
            )
        },
        |r| r.outcome.to_string(),
    );
    output::print_output(&out, ctx.quiet);
    Ok(())
}
