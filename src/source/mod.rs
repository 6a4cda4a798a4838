//! Source readers: one per update origin.
//!
//! The supervisor poller runs on a timer; the HACS and entity readers
//! run off the websocket event stream through [`route_state_changes`].

pub mod entities;
pub mod hacs;
pub mod supervisor;

use crate::config::Config;
use crate::hass::{HaClient, StateChange};
use crate::update::{Origin, UpdateSet};
use entities::EntityTracker;
use log::{info, warn};
use tokio::sync::mpsc;

/// Seed the reactive origins from a one-shot state read, so the
/// notification is correct before the first live event arrives. A
/// failed read is soft: the origins fill in as events come.
pub async fn prime_from_states(client: &HaClient, tx: &mpsc::Sender<StateChange>) {
    let states = match client.get_states().await {
        Ok(states) => states,
        Err(e) => {
            warn!("[Source] Priming state read failed: {}", e);
            return;
        }
    };
    for state in states {
        let change = StateChange {
            entity_id: state.entity_id,
            state: Some(state.state),
            attributes: state.attributes,
        };
        if tx.send(change).await.is_err() {
            return;
        }
    }
}

/// Route `state_changed` events to the reactive source readers.
///
/// Runs until the event channel closes. Each matching event produces a
/// full `(Origin, UpdateSet)` message for the notifier; non-matching
/// entities are ignored. The entity tracker lives here, so concurrent
/// websocket callbacks can never mutate it.
pub async fn route_state_changes(
    config: Config,
    mut rx: mpsc::Receiver<StateChange>,
    tx: mpsc::Sender<(Origin, UpdateSet)>,
) {
    let watch_hacs = config.watch_hacs();
    let watch_entities = config.update_source == crate::config::UpdateSource::UpdateEntities;
    let mut tracker = EntityTracker::new();

    while let Some(change) = rx.recv().await {
        let message = if watch_hacs && change.entity_id == config.hass.hacs_sensor {
            let set = hacs::update_set(change.state.as_deref(), &change.attributes);
            Some((Origin::Hacs, set))
        } else if watch_entities && entities::is_update_entity(&change.entity_id) {
            let set = tracker.apply(
                &change.entity_id,
                change.state.as_deref(),
                &change.attributes,
            );
            Some((Origin::Entities, set))
        } else {
            None
        };

        if let Some(message) = message
            && tx.send(message).await.is_err()
        {
            info!("[Source] Notifier channel closed, stopping event router");
            return;
        }
    }
}
