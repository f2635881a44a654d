//! Device command handlers.

use std::sync::Arc;

use chrono::Utc;
use stfind_core::{DeviceLocation, DeviceRecord};
use tabled::Tabled;

use crate::cli::{DevicesArgs, DevicesCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Seen")]
    seen: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl DeviceRow {
    fn new(d: &Arc<DeviceRecord>, color: bool) -> Self {
        let now = Utc::now();
        Self {
            id: d.id.clone(),
            name: d.display_name.clone(),
            kind: d.kind.to_string(),
            battery: d
                .battery_percent
                .map_or_else(|| "-".into(), |b| format!("{b}%")),
            location: d.last_location.as_ref().map_or_else(|| "-".into(), coords),
            seen: d
                .last_location
                .as_ref()
                .and_then(|l| l.timestamp)
                .map_or_else(|| "-".into(), |at| output::format_age(at, now)),
            status: status(d, color),
        }
    }
}

pub(super) fn coords(loc: &DeviceLocation) -> String {
    match loc.accuracy_m {
        Some(acc) => format!("{:.5}, {:.5} ±{acc:.0}m", loc.latitude, loc.longitude),
        None => format!("{:.5}, {:.5}", loc.latitude, loc.longitude),
    }
}

fn status(d: &DeviceRecord, color: bool) -> String {
    if d.stale {
        output::warn_text("stale", color)
    } else if d.last_polled_at.is_some() && !d.last_poll_ok {
        output::warn_text("unreachable", color)
    } else {
        output::ok_text("ok", color)
    }
}

fn detail(d: &Arc<DeviceRecord>, color: bool) -> String {
    let now = Utc::now();
    let mut lines = vec![
        format!("ID:           {}", d.id),
        format!("Name:         {}", d.display_name),
        format!("Kind:         {}", d.kind),
        format!("Model:        {}", d.model.as_deref().unwrap_or("-")),
        format!("Capabilities: {}", d.capabilities),
        format!(
            "Battery:      {}",
            d.battery_percent
                .map_or_else(|| "-".into(), |b| format!("{b}%"))
        ),
    ];
    match &d.last_location {
        Some(loc) => {
            lines.push(format!("Location:     {}", coords(loc)));
            if let Some(at) = loc.timestamp {
                lines.push(format!(
                    "Located:      {} ({})",
                    at.format("%Y-%m-%d %H:%M:%S UTC"),
                    output::format_age(at, now)
                ));
            }
        }
        None => lines.push("Location:     -".into()),
    }
    for (part, loc) in &d.sub_locations {
        lines.push(format!("  {part:<11} {}", coords(loc)));
    }
    lines.push(format!("Status:       {}", status(d, color)));
    if let Some(at) = d.last_polled_at {
        lines.push(output::dim_text(
            &format!("Polled:       {}", output::format_age(at, now)),
            color,
        ));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: DevicesArgs) -> Result<(), CliError> {
    let tracker = ctx.tracker()?;
    util::restore_session(&tracker)?;
    let summary = util::poll(&tracker).await?;
    tracing::debug!(?summary, "poll finished");

    match args.command {
        DevicesCommand::List => {
            let snap = tracker.devices_snapshot();
            let out = output::render_list(
                ctx.format,
                snap.as_slice(),
                |d| DeviceRow::new(d, ctx.color),
                |d| d.id.clone(),
            );
            output::print_output(&out, ctx.quiet);
            if summary.failed > 0 && !ctx.quiet {
                eprintln!(
                    "{}",
                    output::warn_text(
                        &format!("{} device(s) could not be refreshed", summary.failed),
                        ctx.color
                    )
                );
            }
            Ok(())
        }

        DevicesCommand::Get { id } => {
            let record = tracker
                .registry()
                .get(&id)
                .ok_or(CliError::NotFound { id })?;
            let out = output::render_single(
                ctx.format,
                &record,
                |d| detail(d, ctx.color),
                |d| d.id.clone(),
            );
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}
