// src/engine/marker.rs

//! Marker-file strategy.
//!
//! For hosts without a usable watch facility, or when an external build
//! tool decides when to redeploy: every period, each deployed module
//! directory is probed for a sentinel file. A present sentinel is deleted
//! and every top-level deployment rooted there is redeployed. The next
//! sweep is only scheduled once every redeploy of the current one is done.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::RedeployConfig;
use crate::deploy::{Deployment, DeploymentManager};
use crate::fs::FileSystem;

use super::counter::CompletionCounter;
use super::orchestrator::{RedeployOutcome, redeploy};

/// Result of one sweep: the counter to wait on and the started tasks.
#[derive(Debug)]
pub struct MarkerSweep {
    pub counter: Arc<CompletionCounter>,
    pub handles: Vec<JoinHandle<RedeployOutcome>>,
}

#[derive(Clone)]
pub struct MarkerPoller {
    manager: Arc<dyn DeploymentManager>,
    fs: Arc<dyn FileSystem>,
    period: Duration,
    marker_file: String,
}

impl fmt::Debug for MarkerPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerPoller")
            .field("period", &self.period)
            .field("marker_file", &self.marker_file)
            .finish_non_exhaustive()
    }
}

impl MarkerPoller {
    pub fn new(
        config: &RedeployConfig,
        manager: Arc<dyn DeploymentManager>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            manager,
            fs,
            period: config.redeploy_check_period,
            marker_file: config.marker_file.clone(),
        }
    }

    /// Probe every deployed module directory once and start the redeploys
    /// that were requested.
    pub fn check(&self) -> MarkerSweep {
        let counter = Arc::new(CompletionCounter::new());
        let mut handles = Vec::new();

        for (dir, deployments) in group_by_module_dir(self.manager.list_deployments()) {
            let marker = dir.join(&self.marker_file);
            if !self.fs.exists(&marker) {
                continue;
            }
            // Consume the marker before redeploying, so a write during the
            // redeploy requests another one.
            if let Err(err) = self.fs.remove_file(&marker) {
                error!(?marker, error = %err, "cannot remove redeploy marker; skipping");
                continue;
            }
            info!(?dir, count = deployments.len(), "redeploy marker found");

            for deployment in deployments {
                counter.increment();
                let manager = Arc::clone(&self.manager);
                let counter = Arc::clone(&counter);
                handles.push(tokio::spawn(async move {
                    let outcome = redeploy(manager.as_ref(), &deployment).await;
                    counter.complete();
                    outcome
                }));
            }
        }

        MarkerSweep { counter, handles }
    }

    /// Sweep every period until aborted. A sweep that started redeploys
    /// holds the next one back until all of them are done.
    pub fn spawn(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            info!(
                period_ms = this.period.as_millis() as u64,
                marker = %this.marker_file,
                "marker poller started"
            );
            loop {
                tokio::time::sleep(this.period).await;
                let sweep = this.check();
                if !sweep.handles.is_empty() {
                    debug!(count = sweep.handles.len(), "waiting for redeploys before re-arming");
                }
                sweep.counter.wait().await;
            }
        })
    }
}

/// Top-level, file-backed deployments grouped by module directory.
fn group_by_module_dir(deployments: BTreeMap<String, Deployment>) -> BTreeMap<PathBuf, Vec<Deployment>> {
    let mut grouped: BTreeMap<PathBuf, Vec<Deployment>> = BTreeMap::new();
    for deployment in deployments.into_values() {
        if !deployment.is_redeploy_candidate() {
            continue;
        }
        if let Some(dir) = deployment.module_dir.clone() {
            grouped.entry(dir).or_default().push(deployment);
        }
    }
    grouped
}
