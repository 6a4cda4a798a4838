//! Runtime configuration from environment variables.
//!
//! Every field has a working default so the notifier can run inside a
//! Home Assistant add-on container with nothing but `SUPERVISOR_TOKEN`
//! set. Unset title/id/interval are reported with a warning so the
//! substituted default is visible in the log.

use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::EnumString;

/// Where update facts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UpdateSource {
    /// Poll the Supervisor REST API and subscribe to the HACS sensor.
    RestApi,
    /// Subscribe to `update.` domain entities instead of polling.
    UpdateEntities,
}

/// One selectable origin for the `POLL_ORIGINS` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PollOrigin {
    Core,
    Os,
    Supervisor,
    Hacs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub notify: NotifyConfig,
    pub poll: PollConfig,
    pub hass: HassConfig,
    pub update_source: UpdateSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Title for the persistent and mobile notifications.
    pub title: String,
    /// Persistent notification id, reused as the mobile notification tag.
    pub notification_id: String,
    /// Maintain the persistent in-app notification.
    pub persistent: bool,
    /// Send badge updates to mobile targets.
    pub show_badge: bool,
    /// `notify.*` service names (without the `notify.` prefix).
    pub mobile_targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub origins: Vec<PollOrigin>,
    pub supervisor_url: String,
    pub supervisor_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HassConfig {
    /// Home Assistant core API base, e.g. `http://supervisor/core`.
    pub api_url: String,
    pub token: Option<String>,
    /// Entity id of the HACS aggregate sensor.
    pub hacs_sensor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notify: NotifyConfig {
                title: "Updates pending in Home Assistant".to_string(),
                notification_id: "updates_available".to_string(),
                persistent: true,
                show_badge: true,
                mobile_targets: vec![],
            },
            poll: PollConfig {
                interval_secs: 30,
                timeout_secs: 10,
                origins: vec![
                    PollOrigin::Core,
                    PollOrigin::Os,
                    PollOrigin::Supervisor,
                    PollOrigin::Hacs,
                ],
                supervisor_url: "http://supervisor".to_string(),
                supervisor_token: None,
            },
            hass: HassConfig {
                api_url: "http://supervisor/core".to_string(),
                token: None,
                hacs_sensor: "sensor.hacs".to_string(),
            },
            update_source: UpdateSource::RestApi,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match std::env::var("NOTIFY_TITLE") {
            Ok(title) => config.notify.title = title,
            Err(_) => warn!(
                "Default value '{}' is used for NOTIFY_TITLE",
                config.notify.title
            ),
        }
        match std::env::var("NOTIFY_ID") {
            Ok(id) => config.notify.notification_id = id,
            Err(_) => warn!(
                "Default value '{}' is used for NOTIFY_ID",
                config.notify.notification_id
            ),
        }
        match std::env::var("UPDATE_POLL_INTERVAL") {
            Ok(secs) => {
                config.poll.interval_secs = parse_interval(&secs, config.poll.interval_secs);
            }
            Err(_) => warn!(
                "Default value '{}' is used for UPDATE_POLL_INTERVAL",
                config.poll.interval_secs
            ),
        }

        if let Ok(secs) = std::env::var("HTTP_TIMEOUT")
            && let Ok(secs) = secs.parse()
        {
            config.poll.timeout_secs = secs;
        }
        if let Ok(value) = std::env::var("PERSISTENT_NOTIFICATION") {
            config.notify.persistent = parse_bool(&value, config.notify.persistent);
        }
        if let Ok(value) = std::env::var("SHOW_BADGE") {
            config.notify.show_badge = parse_bool(&value, config.notify.show_badge);
        }
        if let Ok(targets) = std::env::var("MOBILE_TARGETS") {
            config.notify.mobile_targets = split_list(&targets);
        }
        if let Ok(source) = std::env::var("UPDATE_SOURCE") {
            match source.parse() {
                Ok(source) => config.update_source = source,
                Err(_) => warn!(
                    "Unknown UPDATE_SOURCE '{}', using rest_api",
                    source
                ),
            }
        }
        if let Ok(origins) = std::env::var("POLL_ORIGINS") {
            config.poll.origins = split_list(&origins)
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(origin) => Some(origin),
                    Err(_) => {
                        warn!("Unknown poll origin '{}' ignored", o);
                        None
                    }
                })
                .collect();
        }
        if let Ok(url) = std::env::var("SUPERVISOR_URL") {
            config.poll.supervisor_url = url;
        }
        if let Ok(token) = std::env::var("SUPERVISOR_TOKEN") {
            config.poll.supervisor_token = Some(token);
        }
        if let Ok(url) = std::env::var("HASS_URL") {
            config.hass.api_url = url;
        }
        // The core API accepts the Supervisor token when reached through
        // the Supervisor proxy, so fall back to it.
        config.hass.token = std::env::var("HASS_TOKEN")
            .ok()
            .or_else(|| config.poll.supervisor_token.clone());
        if let Ok(sensor) = std::env::var("HACS_SENSOR") {
            config.hass.hacs_sensor = sensor;
        }

        config
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    /// Whether the HACS sensor should be watched.
    pub fn watch_hacs(&self) -> bool {
        self.update_source == UpdateSource::RestApi
            && self.poll.origins.contains(&PollOrigin::Hacs)
    }
}

/// A zero interval would panic the poll timer, so anything that is not
/// a positive number of seconds falls back to the default.
fn parse_interval(value: &str, default: u64) -> u64 {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        Ok(_) => {
            warn!(
                "UPDATE_POLL_INTERVAL must be positive, using default {}",
                default
            );
            default
        }
        Err(_) => {
            warn!(
                "UPDATE_POLL_INTERVAL '{}' is not a number, using default {}",
                value, default
            );
            default
        }
    }
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        other => {
            warn!("Invalid boolean '{}', using default {}", other, default);
            default
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
