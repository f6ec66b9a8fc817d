use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use map_surface::TracingMapSurface;
use routing::{OsrmRoutingProvider, Resolution, RouteResolver};
use serde_json::json;
use shared::domain::{DeliveryPhase, GeoPoint, TrackingInput};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracking_core::TrackingSession;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "tracker.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a driving route and print it as JSON.
    Route {
        /// "lat,lng"
        #[arg(long)]
        origin: GeoPoint,
        #[arg(long)]
        destination: GeoPoint,
    },
    /// Play a delivery from idle through in-transit to a final phase.
    Simulate {
        #[arg(long)]
        origin: GeoPoint,
        #[arg(long)]
        destination: GeoPoint,
        #[arg(long)]
        original_location: Option<GeoPoint>,
        #[arg(long, default_value = "delivered")]
        final_phase: DeliveryPhase,
        /// Overrides the configured animation duration.
        #[arg(long)]
        duration_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config)?;
    let provider = Arc::new(
        OsrmRoutingProvider::new(settings.osrm_config())
            .context("failed to create routing provider")?,
    );

    match cli.command {
        Command::Route {
            origin,
            destination,
        } => {
            let resolver = RouteResolver::new(provider);
            let resolution = resolver.resolve(&origin, &destination).await;
            let output = match &resolution {
                Resolution::Fallback { reason, .. } => json!({
                    "source": "fallback",
                    "reason": reason.to_string(),
                    "route": resolution.route_or_fallback(),
                }),
                Resolution::Skipped => json!({ "source": "skipped", "route": null }),
                _ => json!({
                    "source": "provider",
                    "kind": resolution.route().map(|route| route.kind()),
                    "route": resolution.route(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Simulate {
            origin,
            destination,
            original_location,
            final_phase,
            duration_ms,
        } => {
            if let Some(duration_ms) = duration_ms {
                settings.animation_duration_ms = duration_ms;
            }
            let tracking = settings.tracking_config();
            let deadline = tracking.animation_duration
                + Duration::from_secs(settings.request_timeout_secs)
                + Duration::from_secs(1);

            let mut session = TrackingSession::new(provider, TracingMapSurface::new(), tracking);
            let input = |phase| {
                let input = TrackingInput::new(phase, Some(origin.clone()), Some(destination.clone()));
                match &original_location {
                    Some(location) => input.with_original_location(location.clone()),
                    None => input,
                }
            };

            session.update(input(DeliveryPhase::Idle));
            session.update(input(DeliveryPhase::InTransit));

            let playback = async {
                let mut reported = 0;
                while !session.status().complete {
                    session.process_next().await;
                    let tenth = (session.status().progress.unwrap_or(0.0) * 10.0) as u32;
                    if tenth > reported {
                        reported = tenth;
                        info!("simulate: progress={}%", tenth * 10);
                    }
                }
            };
            if tokio::time::timeout(deadline, playback).await.is_err() {
                info!("simulate: playback did not finish within {deadline:?}");
            }

            session.update(input(final_phase));
            println!("{}", serde_json::to_string_pretty(&session.status())?);
            session.teardown();
        }
    }

    Ok(())
}
