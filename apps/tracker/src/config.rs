use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use routing::{OsrmConfig, DEFAULT_OSRM_BASE_URL};
use serde::Deserialize;
use tracking_core::TrackingConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub routing_base_url: String,
    pub request_timeout_secs: u64,
    pub animation_duration_ms: u64,
    pub tick_interval_ms: u64,
    pub arrival_zoom: u8,
    pub fit_padding: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            routing_base_url: DEFAULT_OSRM_BASE_URL.into(),
            request_timeout_secs: 10,
            animation_duration_ms: 30_000,
            tick_interval_ms: 16,
            arrival_zoom: 16,
            fit_padding: 50,
        }
    }
}

impl Settings {
    pub fn osrm_config(&self) -> OsrmConfig {
        OsrmConfig {
            base_url: self.routing_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn tracking_config(&self) -> TrackingConfig {
        TrackingConfig {
            animation_duration: Duration::from_millis(self.animation_duration_ms),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            arrival_zoom: self.arrival_zoom,
            fit_padding: self.fit_padding,
        }
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?,
        Err(_) => Settings::default(),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    // APP__ prefixed names win over the bare ones.
    let read = |name: &str| lookup(&format!("APP__{name}")).or_else(|| lookup(name));

    if let Some(v) = read("ROUTING_BASE_URL") {
        settings.routing_base_url = v;
    }
    if let Some(v) = read("ROUTING_TIMEOUT_SECS") {
        settings.request_timeout_secs = parse_number("ROUTING_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = read("ANIMATION_DURATION_MS") {
        settings.animation_duration_ms = parse_number("ANIMATION_DURATION_MS", &v)?;
    }
    if let Some(v) = read("TICK_INTERVAL_MS") {
        settings.tick_interval_ms = parse_number("TICK_INTERVAL_MS", &v)?;
    }
    if let Some(v) = read("ARRIVAL_ZOOM") {
        settings.arrival_zoom = parse_number("ARRIVAL_ZOOM", &v)?;
    }
    if let Some(v) = read("FIT_PADDING") {
        settings.fit_padding = parse_number("FIT_PADDING", &v)?;
    }

    Ok(())
}

fn parse_number<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value '{raw}' for {name}"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
