use crate::errors::{Error, Result};
use crate::model::{Channel, FetchWindow, RemoteEndpoint};
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_LUMINOSITY_MAX_POINTS: usize = 10_000;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub sth_host: String,
    pub sth_port: u16,
    pub fiware_service: String,
    pub fiware_servicepath: String,
    pub entity_type: String,
    pub entity_id: String,
    pub http_addr: String,
    pub window: FetchWindow,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub timezone: Tz,
    /// `None` keeps every luminosity point for the process lifetime
    pub luminosity_max_points: Option<usize>,
    pub luminosity_dedup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sth_host: "localhost".to_string(),
            sth_port: 8666,
            fiware_service: "smart".to_string(),
            fiware_servicepath: "/".to_string(),
            entity_type: "Lamp".to_string(),
            entity_id: "urn:ngsi-ld:Lamp:003".to_string(),
            http_addr: "0.0.0.0:8050".to_string(),
            window: FetchWindow::new(10),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            timezone: chrono_tz::Europe::Lisbon,
            luminosity_max_points: Some(DEFAULT_LUMINOSITY_MAX_POINTS),
            luminosity_dedup: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let timezone = match env::var("TARGET_TIMEZONE") {
            Ok(name) => Tz::from_str(name.trim())
                .map_err(|e| Error::Config(format!("TARGET_TIMEZONE '{}': {}", name, e)))?,
            Err(_) => defaults.timezone,
        };

        let poll_interval =
            Duration::from_millis(parse_var("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS).max(1));
        let request_timeout = clamp_timeout(
            Duration::from_millis(parse_var("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)),
            poll_interval,
        );

        let window = FetchWindow::new(parse_var("LAST_N", defaults.window.last_n()));

        // A cap below the window would evict points the next fetch returns again
        let luminosity_max_points =
            match parse_var("LUMINOSITY_MAX_POINTS", DEFAULT_LUMINOSITY_MAX_POINTS) {
                0 => None,
                cap => Some(cap.max(window.last_n())),
            };

        Ok(Self {
            sth_host: env::var("STH_HOST").unwrap_or(defaults.sth_host),
            sth_port: parse_var("STH_PORT", defaults.sth_port),
            fiware_service: env::var("FIWARE_SERVICE").unwrap_or(defaults.fiware_service),
            fiware_servicepath: env::var("FIWARE_SERVICEPATH")
                .unwrap_or(defaults.fiware_servicepath),
            entity_type: env::var("ENTITY_TYPE").unwrap_or(defaults.entity_type),
            entity_id: env::var("ENTITY_ID").unwrap_or(defaults.entity_id),
            http_addr: env::var("HTTP_ADDR").unwrap_or(defaults.http_addr),
            window,
            poll_interval,
            request_timeout,
            timezone,
            luminosity_max_points,
            luminosity_dedup: parse_var("LUMINOSITY_DEDUP", defaults.luminosity_dedup),
        })
    }

    pub fn endpoint(&self, channel: Channel) -> RemoteEndpoint {
        RemoteEndpoint {
            host: self.sth_host.clone(),
            port: self.sth_port,
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            channel,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// A request must expire before the next tick is due.
fn clamp_timeout(timeout: Duration, poll_interval: Duration) -> Duration {
    let ceiling = poll_interval.mul_f64(0.9);
    timeout.min(ceiling).max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.window.last_n(), 10);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.timezone, chrono_tz::Europe::Lisbon);
        assert!(config.request_timeout < config.poll_interval);
    }

    #[test]
    fn test_clamp_timeout() {
        assert_eq!(
            clamp_timeout(Duration::from_secs(3), Duration::from_secs(10)),
            Duration::from_secs(3)
        );
        assert_eq!(
            clamp_timeout(Duration::from_secs(30), Duration::from_secs(10)),
            Duration::from_secs(9)
        );
        assert_eq!(
            clamp_timeout(Duration::ZERO, Duration::from_secs(10)),
            Duration::from_millis(1)
        );
    }

    const VARS: [&str; 7] = [
        "STH_PORT",
        "LAST_N",
        "POLL_INTERVAL_MS",
        "REQUEST_TIMEOUT_MS",
        "TARGET_TIMEZONE",
        "LUMINOSITY_MAX_POINTS",
        "LUMINOSITY_DEDUP",
    ];

    fn clear_vars() {
        for name in VARS {
            env::remove_var(name);
        }
    }

    // Environment is process-wide, so every from_env case runs in this one test
    #[test]
    fn test_from_env() {
        clear_vars();

        env::set_var("STH_PORT", "not-a-port");
        env::set_var("LAST_N", "-3");
        env::set_var("POLL_INTERVAL_MS", "2000");
        env::set_var("REQUEST_TIMEOUT_MS", "5000");
        env::set_var("LUMINOSITY_DEDUP", "maybe");
        let config = Config::from_env().unwrap();
        assert_eq!(config.sth_port, 8666);
        assert_eq!(config.window.last_n(), 10);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_millis(1800));
        assert!(config.luminosity_dedup);
        assert_eq!(config.luminosity_max_points, Some(10_000));
        clear_vars();

        env::set_var("LUMINOSITY_MAX_POINTS", "0");
        let config = Config::from_env().unwrap();
        assert_eq!(config.luminosity_max_points, None);
        clear_vars();

        env::set_var("LAST_N", "20");
        env::set_var("LUMINOSITY_MAX_POINTS", "5");
        let config = Config::from_env().unwrap();
        assert_eq!(config.window.last_n(), 20);
        assert_eq!(config.luminosity_max_points, Some(20));
        clear_vars();

        env::set_var("TARGET_TIMEZONE", "America/New_York");
        let config = Config::from_env().unwrap();
        assert_eq!(config.timezone, chrono_tz::America::New_York);

        env::set_var("TARGET_TIMEZONE", "Mars/Olympus_Mons");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.reason(), "config");
        clear_vars();
    }

    #[test]
    fn test_endpoint_for_channel() {
        let config = Config::default();
        let endpoint = config.endpoint(Channel::Humidity);
        assert_eq!(endpoint.channel, Channel::Humidity);
        assert_eq!(endpoint.port, 8666);
        assert!(endpoint.url().ends_with("/attributes/humidity"));
    }
}
