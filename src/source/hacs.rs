//! HACS aggregate sensor reader.
//!
//! The HACS integration exposes one numeric sensor whose state counts
//! pending repository updates and whose `repositories` attribute lists
//! them. A state of zero (or anything non-numeric) yields an empty set.

use crate::update::{UpdateFact, UpdateKind, UpdateSet};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Repository {
    name: Option<String>,
    display_name: Option<String>,
    installed_version: Option<String>,
    available_version: Option<String>,
}

/// Build the Plugin update set from the sensor's state and attributes.
pub fn update_set(state: Option<&str>, attributes: &Value) -> UpdateSet {
    let pending: f64 = state.and_then(|s| s.parse().ok()).unwrap_or(0.0);
    if pending <= 0.0 {
        return UpdateSet::new();
    }

    let repositories = match attributes.get("repositories") {
        Some(value) => match serde_json::from_value::<Vec<Repository>>(value.clone()) {
            Ok(repositories) => repositories,
            Err(e) => {
                warn!("[HACS] Unparseable repositories attribute: {}", e);
                return UpdateSet::new();
            }
        },
        None => return UpdateSet::new(),
    };

    repositories
        .into_iter()
        .map(|repo| {
            let name = repo
                .display_name
                .or(repo.name.clone())
                .unwrap_or_else(|| "unnamed repository".to_string());
            let mut fact = UpdateFact::new(UpdateKind::Plugin, name)
                .versions(repo.installed_version, repo.available_version)
                .path("/hacs");
            if let Some(id) = repo.name {
                fact = fact.source_id(id);
            }
            fact
        })
        .collect()
}
