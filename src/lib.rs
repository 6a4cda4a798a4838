//! Update Notifier library.
//!
//! Aggregates pending Home Assistant updates (core/OS/Supervisor,
//! add-ons, HACS repositories and `update.` entities) and maintains a
//! persistent notification plus optional mobile push notifications.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod hass;
pub mod notifier;
pub mod render;
pub mod source;
pub mod update;
