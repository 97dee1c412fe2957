// src/engine/runtime.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::RedeployConfig;
use crate::deploy::{Deployment, DeploymentManager};
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{IgnoreSet, NotifyBackend, WatchBackend, WatchTree};

use super::orchestrator::{RedeployOutcome, redeploy};
use super::state::{ControllerState, SharedState, lock_state};

/// Watch-strategy redeployer.
///
/// This is the IO shell around [`ControllerState`]: it owns the timer,
/// spawns one task per redeploy and feeds completions back into the state.
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct HotRedeployer {
    state: SharedState,
    manager: Arc<dyn DeploymentManager>,
    tick_period: Duration,
    grace_period: Duration,
}

impl fmt::Debug for HotRedeployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotRedeployer")
            .field("tick_period", &self.tick_period)
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl HotRedeployer {
    pub fn new(
        config: &RedeployConfig,
        manager: Arc<dyn DeploymentManager>,
        backend: Box<dyn WatchBackend>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let ignore = IgnoreSet::new(&config.ignore)?;
        let tree = WatchTree::new(backend, fs);
        Ok(Self {
            state: Arc::new(Mutex::new(ControllerState::new(tree, ignore))),
            manager,
            tick_period: config.tick_period,
            grace_period: config.grace_period,
        })
    }

    /// Redeployer over the OS watch facility and the real filesystem.
    pub fn with_notify(config: &RedeployConfig, manager: Arc<dyn DeploymentManager>) -> Result<Self> {
        let backend = NotifyBackend::new()?;
        Self::new(config, manager, Box::new(backend), Arc::new(RealFileSystem))
    }

    /// The host reports that `deployment` was started from `dir`.
    ///
    /// Registration failures are returned to the caller; they only affect
    /// this module root.
    pub fn module_deployed(&self, dir: &Path, deployment: Deployment) -> Result<()> {
        let result = lock_state(&self.state).module_deployed(dir, deployment);
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(?dir, error = %err, "cannot watch module root");
                Err(err)
            }
        }
    }

    /// The host reports that deployment `name`, started from `dir`, is gone.
    ///
    /// Returns `true` when that was the last deployment for the root and its
    /// watches have been released.
    pub fn module_undeployed(&self, dir: &Path, name: &str) -> bool {
        lock_state(&self.state).module_undeployed(dir, name)
    }

    pub fn tick(&self) -> Result<Vec<JoinHandle<RedeployOutcome>>> {
        self.tick_at(tokio::time::Instant::now().into_std())
    }

    /// Run one tick as of `now` and start a task for every redeploy it
    /// decides on. Returns without waiting for those tasks.
    pub fn tick_at(&self, now: Instant) -> Result<Vec<JoinHandle<RedeployOutcome>>> {
        let planned = lock_state(&self.state).plan_tick(now, self.grace_period)?;

        let mut handles = Vec::with_capacity(planned.len());
        for plan in planned {
            let manager = Arc::clone(&self.manager);
            let state = Arc::clone(&self.state);
            handles.push(tokio::spawn(async move {
                let outcome = redeploy(manager.as_ref(), &plan.deployment).await;
                lock_state(&state).finish_redeploy(&plan.root, &plan.deployment.name, &outcome);
                outcome
            }));
        }
        Ok(handles)
    }

    /// Drive [`tick`](Self::tick) from a periodic timer until the task is
    /// aborted. A failed tick is logged and the next one runs as usual.
    pub fn spawn(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            info!(
                tick_ms = this.tick_period.as_millis() as u64,
                grace_ms = this.grace_period.as_millis() as u64,
                "hot redeployer started"
            );
            let mut interval = tokio::time::interval(this.tick_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match this.tick() {
                    Ok(handles) if !handles.is_empty() => {
                        debug!(count = handles.len(), "redeploys started");
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "tick aborted"),
                }
            }
        })
    }

    pub fn tracked_deployments(&self, root: &Path) -> Vec<String> {
        lock_state(&self.state).tracked_deployments(root)
    }

    pub fn watched_roots(&self) -> Vec<PathBuf> {
        lock_state(&self.state).watched_roots()
    }

    pub fn watched_dirs(&self, root: &Path) -> Vec<PathBuf> {
        lock_state(&self.state).tree().watched_dirs(root)
    }
}
