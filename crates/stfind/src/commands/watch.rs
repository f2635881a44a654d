//! Watch: run the poll schedule and print device changes as they arrive.

use chrono::Utc;
use stfind_core::{DeviceRecord, Tracker, TrackerEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cli::{OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::devices::coords;
use super::{Context, util};

pub async fn handle(ctx: &Context, args: &WatchArgs) -> Result<(), CliError> {
    let mut config = ctx.config.clone();
    if let Some(interval) = args.interval {
        config.update_interval_secs = interval;
    }
    let tracker = Tracker::new(config.to_tracker_config()?)?;

    if stfind_config::load_session()?.is_some() {
        util::restore_session(&tracker)?;
    } else if args.no_reauth {
        return Err(CliError::NotLoggedIn);
    } else {
        let session = util::interactive_login(&tracker, ctx).await?;
        util::persist_session(&session)?;
    }

    let mut events = tracker.events();
    tracker.start().await;
    let result = watch_loop(&tracker, &mut events, ctx, args).await;
    tracker.shutdown().await;
    result
}

async fn watch_loop(
    tracker: &Tracker,
    events: &mut tokio::sync::broadcast::Receiver<TrackerEvent>,
    ctx: &Context,
    args: &WatchArgs,
) -> Result<(), CliError> {
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            event = events.recv() => event,
        };

        match event {
            Ok(TrackerEvent::DeviceUpdated { id }) => {
                if let Some(record) = tracker.registry().get(&id) {
                    output::print_output(&render_update(&record, ctx), ctx.quiet);
                }
            }
            Ok(TrackerEvent::ReauthRequired) => {
                util::forget_session();
                if args.no_reauth {
                    return Err(CliError::SessionExpired {
                        message: "the service rejected the session".into(),
                    });
                }
                eprintln!(
                    "{}",
                    output::warn_text("Session expired, logging in again.", ctx.color)
                );
                let session = util::login_until_approved(tracker, ctx).await?;
                util::persist_session(&session)?;
            }
            Ok(TrackerEvent::RingResult { id, accepted }) => {
                info!(device_id = %id, accepted, "ring result");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

fn render_update(record: &DeviceRecord, ctx: &Context) -> String {
    match ctx.format {
        OutputFormat::Plain => record.id.clone(),
        OutputFormat::Table => {
            let mut line = format!(
                "{} {} ({})",
                output::dim_text(&Utc::now().format("%H:%M:%S").to_string(), ctx.color),
                record.display_name,
                record.id
            );
            if let Some(loc) = &record.last_location {
                line.push_str(&format!("  {}", coords(loc)));
            }
            if let Some(battery) = record.battery_percent {
                line.push_str(&format!("  battery {battery}%"));
            }
            if record.stale {
                line.push_str(&format!("  {}", output::warn_text("stale", ctx.color)));
            } else if !record.last_poll_ok {
                line.push_str(&format!("  {}", output::warn_text("unreachable", ctx.color)));
            }
            line
        }
        // One document per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            output::render_json_compact(record)
        }
    }
}
