use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use clap::Parser;
use std::time::Duration;

use crate::client::DEFAULT_BACKEND_URL;

#[derive(Parser, Debug, Clone)]
#[command(name = "velov-forecast-map")]
#[command(about = "Colors Vélo'v station markers by predicted bike availability")]
#[command(version)]
pub struct Config {
    /// Base URL of the forecast backend
    #[arg(long, env = "VELOV_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Address the marker service binds to
    #[arg(long, env = "VELOV_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port the marker service listens on
    #[arg(short, long, env = "VELOV_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between automatic fleet recolors (0 disables the background task)
    #[arg(long, env = "VELOV_REFRESH_SECS", default_value_t = 30)]
    pub refresh_secs: u64,

    /// IANA timezone the backend expects dates in
    ///
    /// Examples: Europe/Paris, UTC, America/Montreal
    #[arg(long, env = "VELOV_TIMEZONE", default_value = "Europe/Paris")]
    pub timezone: String,

    /// Timeout in seconds for each backend request
    #[arg(long, env = "VELOV_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Maximum number of station details kept in memory
    #[arg(long, env = "VELOV_DETAILS_CACHE_CAPACITY", default_value_t = 4096)]
    pub details_cache_capacity: u64,
}

impl Config {
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("{} is not a known timezone", self.timezone))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_secs > 0).then(|| Duration::from_secs(self.refresh_secs))
    }

    pub fn log(&self) {
        log::info!("backend url: {}", self.backend_url);
        log::info!("listen address: {}:{}", self.bind, self.port);
        log::info!("timezone: {}", self.timezone);
        match self.refresh_interval() {
            Some(interval) => log::info!("auto-refresh: every {}s", interval.as_secs()),
            None => log::info!("auto-refresh: disabled"),
        }
    }
}
