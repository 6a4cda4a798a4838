//! Notification dispatch.
//!
//! Turns rendered notification content into Home Assistant service
//! calls: `persistent_notification.create`/`dismiss` for the in-app
//! notification and `notify.<target>` for mobile push, clear and badge
//! updates. Calls are fire-and-forget; failures are logged and the next
//! render retries naturally.

use crate::config::NotifyConfig;
use crate::error::Result;
use crate::hass::api::HaClient;
use crate::render::Rendered;
use async_trait::async_trait;
use log::{error, info, warn};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Seam for service calls, so dispatch logic is testable without a
/// running Home Assistant.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn call_service(&self, domain: &str, service: &str, data: Value) -> Result<()>;
}

#[async_trait]
impl NotifySink for HaClient {
    async fn call_service(&self, domain: &str, service: &str, data: Value) -> Result<()> {
        HaClient::call_service(self, domain, service, data).await
    }
}

/// Dispatches rendered content to the persistent notification and the
/// configured mobile targets.
pub struct Dispatcher<S> {
    sink: S,
    config: NotifyConfig,
}

impl<S: NotifySink> Dispatcher<S> {
    pub fn new(sink: S, config: NotifyConfig) -> Self {
        Self { sink, config }
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    /// Issue every service call implied by `rendered`. Errors are
    /// logged per call and never propagated.
    pub async fn publish(&self, rendered: &Rendered) {
        if self.config.persistent {
            self.publish_persistent(rendered).await;
        }
        for target in &self.config.mobile_targets {
            self.publish_mobile(target, rendered).await;
            if self.config.show_badge {
                self.publish_badge(target, rendered.badge_count).await;
            }
        }
    }

    async fn publish_persistent(&self, rendered: &Rendered) {
        let result = if rendered.is_empty() {
            info!("[Notify] Dismissing persistent notification");
            self.sink
                .call_service(
                    "persistent_notification",
                    "dismiss",
                    json!({ "notification_id": self.config.notification_id }),
                )
                .await
        } else {
            info!("[Notify] Updating persistent notification");
            self.sink
                .call_service(
                    "persistent_notification",
                    "create",
                    json!({
                        "title": self.config.title,
                        "message": rendered.persistent_text,
                        "notification_id": self.config.notification_id,
                    }),
                )
                .await
        };
        if let Err(e) = result {
            error!("[Notify] Persistent notification call failed: {}", e);
        }
    }

    async fn publish_mobile(&self, target: &str, rendered: &Rendered) {
        let data = if rendered.mobile_text.is_empty() {
            json!({
                "message": "clear_notification",
                "data": { "tag": self.config.notification_id },
            })
        } else {
            json!({
                "title": self.config.title,
                "message": rendered.mobile_text,
                "data": {
                    "tag": self.config.notification_id,
                    "url": "/config/updates",
                    "clickAction": "/config/updates",
                    "actions": [
                        { "action": "URI", "title": "Open Add-ons", "uri": "/config/dashboard" },
                        { "action": "URI", "title": "Open HACS", "uri": "/hacs" },
                    ],
                },
            })
        };
        if let Err(e) = self.sink.call_service("notify", target, data).await {
            error!("[Notify] Push to {} failed: {}", target, e);
        }
    }

    async fn publish_badge(&self, target: &str, count: usize) {
        // Badge-only pseudo-message for the companion app; a count of
        // zero clears the badge.
        let data = json!({
            "message": "delete_alert",
            "data": { "push": { "badge": count } },
        });
        if let Err(e) = self.sink.call_service("notify", target, data).await {
            error!("[Notify] Badge update to {} failed: {}", target, e);
        }
    }
}

/// Filter configured mobile targets against `notify` service discovery.
/// Unknown targets are dropped with a warning; a failed discovery call
/// keeps the list as configured.
pub async fn validated_targets(client: &HaClient, configured: &[String]) -> Vec<String> {
    if configured.is_empty() {
        return vec![];
    }
    apply_discovery(configured, client.notify_services().await)
}

/// Apply a discovery result to the configured target list.
fn apply_discovery(
    configured: &[String],
    discovered: Result<HashSet<String>>,
) -> Vec<String> {
    let known = match discovered {
        Ok(known) => known,
        Err(e) => {
            warn!("[Notify] Service discovery failed, keeping configured targets: {}", e);
            return configured.to_vec();
        }
    };
    configured
        .iter()
        .filter(|target| {
            if known.contains(target.as_str()) {
                true
            } else {
                warn!("[Notify] Unknown notify target '{}' dropped", target);
                false
            }
        })
        .cloned()
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    fn config(targets: Vec<&str>) -> NotifyConfig {
        NotifyConfig {
            title: "Updates pending in Home Assistant".to_string(),
            notification_id: "updates_available".to_string(),
            persistent: true,
            show_badge: true,
            mobile_targets: targets.into_iter().map(String::from).collect(),
        }
    }

    fn rendered(text: &str, badge: usize) -> Rendered {
        Rendered {
            persistent_text: text.to_string(),
            mobile_text: text.to_string(),
            badge_count: badge,
        }
    }

    #[tokio::test]
    async fn test_non_empty_render_creates_notification() {
        let dispatcher = Dispatcher::new(RecordingSink::new(), config(vec![]));
        dispatcher.publish(&rendered("* **Core**: 1 -> 2", 1)).await;

        let calls = dispatcher.sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (domain, service, data) = &calls[0];
        assert_eq!(domain, "persistent_notification");
        assert_eq!(service, "create");
        assert_eq!(data["notification_id"], "updates_available");
        assert_eq!(data["message"], "* **Core**: 1 -> 2");
    }

    #[tokio::test]
    async fn test_empty_render_dismisses_not_creates() {
        let dispatcher = Dispatcher::new(RecordingSink::new(), config(vec![]));
        dispatcher.publish(&rendered("", 0)).await;

        let calls = dispatcher.sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "dismiss");
    }

    #[tokio::test]
    async fn test_mobile_push_and_badge_per_target() {
        let dispatcher =
            Dispatcher::new(RecordingSink::new(), config(vec!["mobile_app_phone"]));
        dispatcher.publish(&rendered("- Core: 1 -> 2", 2)).await;

        let calls = dispatcher.sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0, "notify");
        assert_eq!(calls[1].1, "mobile_app_phone");
        assert_eq!(calls[1].2["data"]["tag"], "updates_available");
        assert_eq!(calls[2].2["data"]["push"]["badge"], 2);
    }

    #[tokio::test]
    async fn test_empty_mobile_clears_and_zeroes_badge() {
        let dispatcher =
            Dispatcher::new(RecordingSink::new(), config(vec!["mobile_app_phone"]));
        dispatcher.publish(&rendered("", 0)).await;

        let calls = dispatcher.sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].2["message"], "clear_notification");
        assert_eq!(calls[2].2["data"]["push"]["badge"], 0);
    }

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_unknown_targets_dropped_on_discovery() {
        let known: HashSet<String> = ["mobile_app_phone".to_string()].into_iter().collect();
        let filtered = apply_discovery(
            &targets(&["mobile_app_phone", "mobile_app_old_tablet"]),
            Ok(known),
        );
        assert_eq!(filtered, targets(&["mobile_app_phone"]));
    }

    #[test]
    fn test_discovery_failure_keeps_configured_targets() {
        let configured = targets(&["mobile_app_phone", "mobile_app_tablet"]);
        let filtered = apply_discovery(
            &configured,
            Err(crate::error::NotifierError::EmptyBody {
                url: "http://supervisor/core/api/services".to_string(),
            }),
        );
        assert_eq!(filtered, configured);
    }

    #[tokio::test]
    async fn test_persistent_disabled_skips_persistent_call() {
        let mut cfg = config(vec![]);
        cfg.persistent = false;
        let dispatcher = Dispatcher::new(RecordingSink::new(), cfg);
        dispatcher.publish(&rendered("* **Core**: 1 -> 2", 1)).await;

        assert!(dispatcher.sink.calls.lock().unwrap().is_empty());
    }
}
