//! The serialized notification worker.
//!
//! All source readers feed one mpsc channel; this task is the only
//! owner of [`NotificationState`], so readers never race on it and the
//! renderer always sees a consistent snapshot across origins.

use crate::aggregator::NotificationState;
use crate::hass::notify::{Dispatcher, NotifySink};
use crate::render::render;
use crate::update::{Origin, UpdateSet};
use log::{debug, info};
use tokio::sync::mpsc;

/// Aggregates update sets and re-renders the notification on change.
pub struct Notifier<S> {
    state: NotificationState,
    dispatcher: Dispatcher<S>,
}

impl<S: NotifySink> Notifier<S> {
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self {
            state: NotificationState::new(),
            dispatcher,
        }
    }

    /// Feed one origin's freshly computed set through the change
    /// detector; dispatch service calls only when something changed.
    pub async fn apply(&mut self, origin: Origin, set: UpdateSet) {
        if !self.state.update(origin, set) {
            debug!("[Notifier] {:?} unchanged, skipping render", origin);
            return;
        }
        let rendered = render(&self.state.snapshot());
        info!(
            "[Notifier] {:?} changed, {} update(s) pending",
            origin, rendered.badge_count
        );
        self.dispatcher.publish(&rendered).await;
    }

    /// Consume messages until every sender is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<(Origin, UpdateSet)>) {
        while let Some((origin, set)) = rx.recv().await {
            self.apply(origin, set).await;
        }
        info!("[Notifier] All sources stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::hass::notify::testing::RecordingSink;
    use crate::update::{UpdateFact, UpdateKind};

    fn notifier(targets: Vec<&str>) -> Notifier<RecordingSink> {
        let config = NotifyConfig {
            title: "Updates pending in Home Assistant".to_string(),
            notification_id: "updates_available".to_string(),
            persistent: true,
            show_badge: true,
            mobile_targets: targets.into_iter().map(String::from).collect(),
        };
        Notifier::new(Dispatcher::new(RecordingSink::new(), config))
    }

    fn core_update() -> UpdateSet {
        [UpdateFact::new(UpdateKind::Platform, "Core").versions(Some("2024.1"), Some("2024.2"))]
            .into_iter()
            .collect()
    }

    fn core_and_addon_update() -> UpdateSet {
        let mut set = core_update();
        set.insert(
            UpdateFact::new(UpdateKind::Addon, "Mosquitto broker")
                .versions(Some("6.4.0"), Some("6.4.1"))
                .path("/hassio/addon/core_mosquitto/info"),
        );
        set
    }

    fn calls_of(notifier: &Notifier<RecordingSink>) -> Vec<(String, String)> {
        notifier
            .dispatcher
            .sink()
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(domain, service, _)| (domain.clone(), service.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_three_ticks_identical_identical_superset() {
        let mut notifier = notifier(vec![]);

        // Tick 1 renders, tick 2 is identical and must not, tick 3 is a
        // superset and renders again.
        notifier.apply(Origin::Supervisor, core_update()).await;
        assert_eq!(calls_of(&notifier).len(), 1);

        notifier.apply(Origin::Supervisor, core_update()).await;
        assert_eq!(calls_of(&notifier).len(), 1);

        notifier
            .apply(Origin::Supervisor, core_and_addon_update())
            .await;
        let calls = calls_of(&notifier);
        assert_eq!(calls.len(), 2);
        assert!(calls
            .iter()
            .all(|(domain, service)| domain == "persistent_notification" && service == "create"));
    }

    #[tokio::test]
    async fn test_all_empty_dismisses_and_clears_badge() {
        let mut notifier = notifier(vec!["mobile_app_phone"]);

        notifier.apply(Origin::Supervisor, core_update()).await;
        notifier.apply(Origin::Supervisor, UpdateSet::new()).await;

        let sink = notifier.dispatcher.sink();
        let calls = sink.calls.lock().unwrap();
        // Second render: dismiss + clear + badge 0, never a create with
        // empty text.
        let second_render = &calls[3..];
        assert_eq!(second_render.len(), 3);
        assert_eq!(second_render[0].1, "dismiss");
        assert_eq!(second_render[1].2["message"], "clear_notification");
        assert_eq!(second_render[2].2["data"]["push"]["badge"], 0);
    }

    #[tokio::test]
    async fn test_origins_merge_into_one_notification() {
        let mut notifier = notifier(vec![]);

        notifier.apply(Origin::Supervisor, core_update()).await;
        notifier
            .apply(
                Origin::Hacs,
                [UpdateFact::new(UpdateKind::Plugin, "Mushroom")
                    .versions(Some("3.0"), Some("3.1"))
                    .path("/hacs")]
                .into_iter()
                .collect(),
            )
            .await;

        let sink = notifier.dispatcher.sink();
        let calls = sink.calls.lock().unwrap();
        let message = calls.last().unwrap().2["message"].as_str().unwrap();
        assert!(message.contains("[Home Assistant](/config/dashboard)"));
        assert!(message.contains("[HACS](/hacs)"));
        assert!(message.find("Core").unwrap() < message.find("Mushroom").unwrap());
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let notifier = notifier(vec![]);
        let (tx, rx) = mpsc::channel(8);

        tx.send((Origin::Supervisor, core_update())).await.unwrap();
        drop(tx);
        notifier.run(rx).await;
    }
}
