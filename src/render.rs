//! Notification text rendering.
//!
//! Turns a consistent snapshot of all origins into the persistent
//! notification body (markdown), the mobile push body (plain text) and
//! the badge count. Rendering is pure; dispatch lives in `hass::notify`.

use crate::update::{UpdateFact, UpdateKind};

/// Rendered notification content for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Markdown body for `persistent_notification.create`; empty means
    /// dismiss.
    pub persistent_text: String,
    /// Plain-text body for mobile push; empty means clear.
    pub mobile_text: String,
    /// Total pending updates across all origins.
    pub badge_count: usize,
}

impl Rendered {
    pub fn is_empty(&self) -> bool {
        self.persistent_text.is_empty()
    }
}

/// Section header for each kind: markdown link for the persistent body,
/// plain label for the mobile body.
fn section_header(kind: UpdateKind) -> (&'static str, &'static str) {
    match kind {
        UpdateKind::Platform => ("[Home Assistant](/config/dashboard)", "Home Assistant"),
        UpdateKind::Addon => ("[Add-ons](/config/dashboard)", "Add-ons"),
        UpdateKind::Plugin => ("[HACS](/hacs)", "HACS"),
        UpdateKind::Entity => ("[Updates](/config/updates)", "Updates"),
    }
}

fn version_or_unknown(version: Option<&str>) -> &str {
    version.unwrap_or("unknown")
}

fn persistent_bullet(fact: &UpdateFact) -> String {
    let name = match &fact.path {
        Some(path) => format!("[**{}**]({})", fact.name, path),
        None => format!("**{}**", fact.name),
    };
    format!(
        "* {}: {} -> {}",
        name,
        version_or_unknown(fact.current_version.as_deref()),
        version_or_unknown(fact.new_version.as_deref()),
    )
}

fn mobile_bullet(fact: &UpdateFact) -> String {
    format!(
        "- {}: {} -> {}",
        fact.name,
        version_or_unknown(fact.current_version.as_deref()),
        version_or_unknown(fact.new_version.as_deref()),
    )
}

/// Render a snapshot (facts grouped by kind, already in priority order).
pub fn render(snapshot: &[(UpdateKind, Vec<&UpdateFact>)]) -> Rendered {
    let mut persistent_sections = Vec::new();
    let mut mobile_sections = Vec::new();
    let mut badge_count = 0;

    for (kind, facts) in snapshot {
        if facts.is_empty() {
            continue;
        }
        badge_count += facts.len();

        let (markdown_header, plain_header) = section_header(*kind);

        let bullets: Vec<String> = facts.iter().map(|f| persistent_bullet(f)).collect();
        persistent_sections.push(format!("{}\n\n{}", markdown_header, bullets.join("\n")));

        let bullets: Vec<String> = facts.iter().map(|f| mobile_bullet(f)).collect();
        mobile_sections.push(format!("{}\n{}", plain_header, bullets.join("\n")));
    }

    Rendered {
        persistent_text: persistent_sections.join("\n\n"),
        mobile_text: mobile_sections.join("\n\n"),
        badge_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::UpdateFact;

    fn snapshot_of(facts: Vec<UpdateFact>) -> Vec<(UpdateKind, Vec<UpdateFact>)> {
        UpdateKind::ALL
            .iter()
            .map(|&kind| {
                (
                    kind,
                    facts.iter().filter(|f| f.kind == kind).cloned().collect(),
                )
            })
            .collect()
    }

    fn borrow(snapshot: &[(UpdateKind, Vec<UpdateFact>)]) -> Vec<(UpdateKind, Vec<&UpdateFact>)> {
        snapshot
            .iter()
            .map(|(kind, facts)| (*kind, facts.iter().collect()))
            .collect()
    }

    #[test]
    fn test_empty_snapshot_renders_empty() {
        let snapshot = snapshot_of(vec![]);
        let rendered = render(&borrow(&snapshot));
        assert!(rendered.is_empty());
        assert!(rendered.mobile_text.is_empty());
        assert_eq!(rendered.badge_count, 0);
    }

    #[test]
    fn test_platform_then_addon_sections_with_link() {
        let snapshot = snapshot_of(vec![
            UpdateFact::new(UpdateKind::Addon, "Mosquitto broker")
                .versions(Some("6.4.0"), Some("6.4.1"))
                .path("/hassio/addon/core_mosquitto/info"),
            UpdateFact::new(UpdateKind::Platform, "Core")
                .versions(Some("2024.1.0"), Some("2024.2.0")),
        ]);
        let rendered = render(&borrow(&snapshot));

        let platform_at = rendered
            .persistent_text
            .find("[Home Assistant](/config/dashboard)")
            .expect("platform header missing");
        let addon_at = rendered
            .persistent_text
            .find("[Add-ons](/config/dashboard)")
            .expect("addon header missing");
        assert!(platform_at < addon_at);
        assert!(rendered.persistent_text.contains(
            "* [**Mosquitto broker**](/hassio/addon/core_mosquitto/info): 6.4.0 -> 6.4.1"
        ));
        assert!(rendered
            .persistent_text
            .contains("* **Core**: 2024.1.0 -> 2024.2.0"));
        assert_eq!(rendered.badge_count, 2);
    }

    #[test]
    fn test_mobile_text_uses_plain_bullets() {
        let snapshot = snapshot_of(vec![UpdateFact::new(UpdateKind::Plugin, "Mushroom")
            .versions(Some("3.0.0"), Some("3.1.0"))
            .path("/hacs")]);
        let rendered = render(&borrow(&snapshot));

        assert!(rendered.mobile_text.contains("HACS"));
        assert!(rendered.mobile_text.contains("- Mushroom: 3.0.0 -> 3.1.0"));
        assert!(!rendered.mobile_text.contains('*'));
        assert!(!rendered.mobile_text.contains('['));
    }

    #[test]
    fn test_badge_counts_all_origins() {
        let snapshot = snapshot_of(vec![
            UpdateFact::new(UpdateKind::Platform, "Core").versions(Some("1"), Some("2")),
            UpdateFact::new(UpdateKind::Plugin, "Mushroom").versions(Some("1"), Some("2")),
            UpdateFact::new(UpdateKind::Entity, "ESPHome")
                .versions(Some("1"), Some("2"))
                .source_id("update.esphome"),
        ]);
        assert_eq!(render(&borrow(&snapshot)).badge_count, 3);
    }

    #[test]
    fn test_missing_versions_render_unknown() {
        let snapshot = snapshot_of(vec![UpdateFact::new(UpdateKind::Platform, "OS")]);
        let rendered = render(&borrow(&snapshot));
        assert!(rendered.persistent_text.contains("* **OS**: unknown -> unknown"));
    }
}
