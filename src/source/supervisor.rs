//! Supervisor REST API poller for core/OS/supervisor and add-on updates.
//!
//! Polled on a fixed interval. Every failure mode is soft: a missing
//! token, a non-2xx response, an empty body or unparseable JSON logs an
//! error and contributes nothing this cycle. The next tick retries.

use crate::config::{PollConfig, PollOrigin};
use crate::error::{NotifierError, Result};
use crate::update::{UpdateFact, UpdateKind, UpdateSet};
use log::{error, info};
use serde::Deserialize;
use std::time::Duration;
use strum::Display;

/// One pollable `/info` endpoint section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Section {
    Core,
    Os,
    Supervisor,
}

impl Section {
    /// Display name used in the rendered notification.
    fn label(self) -> &'static str {
        match self {
            Section::Core => "Core",
            Section::Os => "OS",
            Section::Supervisor => "Supervisor",
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    data: Option<InfoData>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoData {
    version: Option<String>,
    version_latest: Option<String>,
    #[serde(default)]
    update_available: bool,
    #[serde(default)]
    addons: Vec<AddonInfo>,
}

#[derive(Debug, Deserialize)]
struct AddonInfo {
    name: Option<String>,
    slug: Option<String>,
    version: Option<String>,
    version_latest: Option<String>,
    #[serde(default)]
    update_available: bool,
}

/// Periodic reader for the Supervisor origin.
pub struct SupervisorPoller {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    sections: Vec<Section>,
}

impl SupervisorPoller {
    pub fn new(config: &PollConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let sections = config
            .origins
            .iter()
            .filter_map(|origin| match origin {
                PollOrigin::Core => Some(Section::Core),
                PollOrigin::Os => Some(Section::Os),
                PollOrigin::Supervisor => Some(Section::Supervisor),
                PollOrigin::Hacs => None,
            })
            .collect();
        Ok(Self {
            client,
            base_url: config.supervisor_url.trim_end_matches('/').to_string(),
            token: config.supervisor_token.clone(),
            sections,
        })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Fetch every configured section and collect the facts. Never
    /// fails; sections that error are skipped for this cycle.
    pub async fn poll(&self) -> UpdateSet {
        let mut set = UpdateSet::new();
        for &section in &self.sections {
            match self.fetch_section(section).await {
                Ok(data) => collect_facts(section, &data, &mut set),
                Err(e) => error!("[Supervisor] Fetching {} info failed: {}", section, e),
            }
        }
        set
    }

    async fn fetch_section(&self, section: Section) -> Result<InfoData> {
        let token = self
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(NotifierError::MissingToken("SUPERVISOR_TOKEN"))?;
        let url = format!("{}/{}/info", self.base_url, section);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifierError::UnexpectedStatus {
                url,
                status: response.status(),
            });
        }
        let body = response.text().await?;
        if body.is_empty() {
            return Err(NotifierError::EmptyBody { url });
        }
        let parsed: InfoResponse = serde_json::from_str(&body)?;
        Ok(parsed.data.unwrap_or_default())
    }
}

/// Convert one section's payload into facts.
fn collect_facts(section: Section, data: &InfoData, set: &mut UpdateSet) {
    if data.update_available {
        info!("[Supervisor] New {} update is available", section.label());
        set.insert(
            UpdateFact::new(UpdateKind::Platform, section.label())
                .versions(data.version.as_deref(), data.version_latest.as_deref()),
        );
    }

    for addon in &data.addons {
        // The per-addon flag decides, never the parent section flag.
        if !addon.update_available {
            continue;
        }
        let name = addon
            .name
            .clone()
            .or_else(|| addon.slug.clone())
            .unwrap_or_else(|| "unnamed add-on".to_string());
        info!("[Supervisor] New update for add-on {} is available", name);
        let mut fact = UpdateFact::new(UpdateKind::Addon, name)
            .versions(addon.version.as_deref(), addon.version_latest.as_deref());
        if let Some(slug) = &addon.slug {
            fact = fact.path(format!("/hassio/addon/{}/info", slug));
        }
        set.insert(fact);
    }
}
