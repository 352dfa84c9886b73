//! Waiting for the sandbox controller to render every applied Application
//!
//! One poll round fetches the sync status of every Application, then for each
//! outstanding one either extracts its manifests, requests a refresh, or
//! aborts the run. Everything learned so far lives in a [`PollProgress`]
//! owned by the caller, so a timeout still leaves the extracted manifests
//! available for diagnostics.

use super::vocabulary::{is_error_condition, is_expected, is_fatal, is_transient};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The sandbox cluster, as seen by the extraction stage.
pub trait ClusterService {
    /// Apply a multi-document YAML file.
    fn apply(&self, manifest_path: &Path) -> Result<()>;

    /// The rendered manifests of one Application as a multi-document dump.
    fn manifests(&self, app: &str) -> Result<String>;

    /// Ask the controller to re-render one Application.
    fn refresh(&self, app: &str) -> Result<()>;

    /// Sync status of every Application in the sandbox namespace.
    fn statuses(&self) -> Result<Vec<AppStatus>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub condition_type: String,
    pub message: String,
}

impl Condition {
    pub fn new(condition_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self { condition_type: condition_type.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatus {
    pub name: String,
    pub sync_status: String,
    pub conditions: Vec<Condition>,
}

/// What one status report means for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Rendered; manifests can be fetched.
    Resolved,
    /// Will never render.
    Failed(String),
    /// Stuck on an infrastructure hiccup; worth a refresh.
    Refresh(String),
    /// Still working.
    Pending,
}

pub fn classify(status: &AppStatus) -> Resolution {
    let mut refresh_reason = None;
    for condition in status.conditions.iter().filter(|c| is_error_condition(&c.condition_type)) {
        if is_expected(&condition.message) {
            refresh_reason.get_or_insert_with(|| condition.message.clone());
        } else if is_fatal(&condition.message) {
            return Resolution::Failed(condition.message.clone());
        } else if is_transient(&condition.message) {
            refresh_reason.get_or_insert_with(|| condition.message.clone());
        }
    }

    if let Some(reason) = refresh_reason {
        return Resolution::Refresh(reason);
    }
    match status.sync_status.as_str() {
        "Synced" | "OutOfSync" => Resolution::Resolved,
        _ => Resolution::Pending,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(180), interval: Duration::from_secs(5) }
    }
}

/// Accumulated state of a poll loop.
#[derive(Debug, Clone, Default)]
pub struct PollProgress {
    /// Raw manifest dumps by Application name.
    pub manifests: BTreeMap<String, String>,
    /// Applications a refresh was requested for, with the request count.
    pub refreshes: BTreeMap<String, usize>,
    pub rounds: usize,
}

impl PollProgress {
    pub fn resolved(&self) -> usize {
        self.manifests.len()
    }

    /// Names from `apps` that have no manifests yet.
    pub fn outstanding<'a>(&self, apps: &'a [String]) -> Vec<&'a str> {
        apps.iter()
            .filter(|app| !self.manifests.contains_key(app.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Poll until every name in `apps` has manifests in `progress`.
///
/// Fails on the first fatal condition or when `settings.timeout` elapses.
/// Status and manifest lookups that fail are logged and retried next round.
pub fn poll_until_resolved(
    cluster: &dyn ClusterService,
    apps: &[String],
    settings: &PollSettings,
    progress: &mut PollProgress,
) -> Result<()> {
    let started = Instant::now();

    loop {
        let outstanding: BTreeSet<&str> = progress.outstanding(apps).into_iter().collect();
        if outstanding.is_empty() {
            info!("Extracted manifests for {} applications", apps.len());
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= settings.timeout {
            warn!(
                "Timed out with {} applications still outstanding: {}",
                outstanding.len(),
                outstanding.iter().copied().collect::<Vec<_>>().join(", ")
            );
            return Err(Error::PollTimeout {
                elapsed_secs: elapsed.as_secs(),
                resolved: apps.len() - outstanding.len(),
                outstanding: outstanding.len(),
            });
        }

        progress.rounds += 1;
        info!(
            "Waiting for {} out of {} applications to become 'OutOfSync' or 'Synced'",
            outstanding.len(),
            apps.len()
        );

        match cluster.statuses() {
            Ok(statuses) => {
                for status in statuses.iter().filter(|s| outstanding.contains(s.name.as_str())) {
                    handle_status(cluster, status, progress)?;
                }
            }
            Err(err) => warn!(error = %err, "Failed to list application statuses"),
        }

        if progress.outstanding(apps).is_empty() {
            continue;
        }
        std::thread::sleep(settings.interval);
    }
}

fn handle_status(cluster: &dyn ClusterService, status: &AppStatus, progress: &mut PollProgress) -> Result<()> {
    match classify(status) {
        Resolution::Resolved => match cluster.manifests(&status.name) {
            Ok(raw) => {
                debug!(app = %status.name, "Extracted manifests");
                progress.manifests.insert(status.name.clone(), raw);
            }
            Err(err) => warn!(app = %status.name, error = %err, "Failed to get manifests, will retry"),
        },
        Resolution::Failed(message) => {
            return Err(Error::ApplicationFailed { app: status.name.clone(), message });
        }
        Resolution::Refresh(reason) => {
            info!(app = %status.name, "Application hit a transient error, refreshing: {}", reason);
            *progress.refreshes.entry(status.name.clone()).or_default() += 1;
            if let Err(err) = cluster.refresh(&status.name) {
                warn!(app = %status.name, error = %err, "Failed to refresh application");
            }
        }
        Resolution::Pending => debug!(app = %status.name, sync = %status.sync_status, "Still pending"),
    }
    Ok(())
}
