// src/engine/state.rs

//! Shared redeployer state and the synchronous part of a tick.
//!
//! Everything here is guarded by one mutex in [`super::HotRedeployer`]: the
//! watch indices, the watched-module table and the debounce timestamps. The
//! tick driver and the host's "module deployed/undeployed" notifications
//! both go through it, as do redeploy completions. Nothing in this file
//! awaits or spawns; it decides, and the shell executes.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::deploy::Deployment;
use crate::engine::debounce::DebounceGate;
use crate::engine::orchestrator::RedeployOutcome;
use crate::errors::{RedeployError, Result};
use crate::watch::{IgnoreSet, WatchTree, drain_changes};

/// Per-module-root record.
#[derive(Debug, Default)]
pub struct WatchedModule {
    /// Top-level deployments rooted here, keyed by deployment name.
    deployments: BTreeMap<String, Deployment>,
    /// Deployments with a redeploy task currently running.
    in_flight: HashSet<String>,
    /// Deployments that missed a redeploy because one was already running.
    /// Once tracked and idle they are redeployed on the next tick.
    deferred: BTreeSet<String>,
}

impl WatchedModule {
    pub fn deployment_names(&self) -> Vec<String> {
        self.deployments.keys().cloned().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.deployments.is_empty() && self.in_flight.is_empty()
    }
}

/// A redeploy decided by a tick, waiting to be started by the shell.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRedeploy {
    pub root: PathBuf,
    pub deployment: Deployment,
}

#[derive(Debug)]
pub struct ControllerState {
    tree: WatchTree,
    gate: DebounceGate,
    ignore: IgnoreSet,
    modules: HashMap<PathBuf, WatchedModule>,
}

pub type SharedState = Arc<Mutex<ControllerState>>;

/// Lock the shared state, recovering it if a previous holder panicked.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ControllerState {
    pub fn new(tree: WatchTree, ignore: IgnoreSet) -> Self {
        Self {
            tree,
            gate: DebounceGate::new(),
            ignore,
            modules: HashMap::new(),
        }
    }

    pub fn tree(&self) -> &WatchTree {
        &self.tree
    }

    pub fn module(&self, root: &Path) -> Option<&WatchedModule> {
        self.modules.get(root)
    }

    /// Start watching `deployment`, which has just been deployed from `dir`.
    ///
    /// The first deployment seen for a root triggers recursive watch
    /// registration; a failure there leaves no trace, so the next call for
    /// the same root tries again.
    /// Returns the canonical module root, or `None` for child deployments,
    /// which come back whenever their parent is redeployed.
    pub fn module_deployed(
        &mut self,
        dir: &Path,
        deployment: Deployment,
    ) -> Result<Option<PathBuf>> {
        if !deployment.is_redeploy_candidate() {
            debug!(
                deployment = %deployment.name,
                "child or non-file deployment; not watched"
            );
            return Ok(None);
        }
        let root = self.canonical_root(dir)?;

        if !self.modules.contains_key(&root) {
            self.tree.register_root(&root)?;
            self.modules.insert(root.clone(), WatchedModule::default());
        }

        info!(?root, deployment = %deployment.name, "module deployed; watching");
        if let Some(module) = self.modules.get_mut(&root) {
            module.deployments.insert(deployment.name.clone(), deployment);
        }
        Ok(Some(root))
    }

    /// Stop tracking `name` under `dir`.
    ///
    /// Returns `true` if this was the last deployment for the root and its
    /// watches were torn down. Deployments with a redeploy in flight stay:
    /// the redeploy owns them until it finishes.
    pub fn module_undeployed(&mut self, dir: &Path, name: &str) -> bool {
        let root = self.canonical_root(dir).unwrap_or_else(|_| dir.to_path_buf());
        let Some(module) = self.modules.get_mut(&root) else {
            debug!(?root, deployment = %name, "undeployed module was not watched");
            return false;
        };

        if module.in_flight.contains(name) {
            debug!(?root, deployment = %name, "undeploy is part of a running redeploy; keeping");
            return false;
        }

        module.deployments.remove(name);
        module.deferred.remove(name);
        if !module.is_idle() {
            return false;
        }

        self.modules.remove(&root);
        self.gate.forget(&root);
        self.tree.unregister_root(&root);
        info!(?root, "last deployment gone; module no longer watched");
        true
    }

    /// One synchronous tick: drain notifications, update the debounce gate
    /// and decide which deployments to redeploy.
    ///
    /// A watch-index inconsistency aborts the tick with an error. Roots
    /// drained before it still reach the debounce gate.
    pub fn plan_tick(&mut self, now: Instant, grace: Duration) -> Result<Vec<PlannedRedeploy>> {
        let mut changed = BTreeSet::new();
        let drained = drain_changes(&mut self.tree, &self.ignore, &mut changed);
        if !changed.is_empty() {
            debug!(?changed, "module roots changed this tick");
        }
        self.gate.observe(changed, now);
        drained?;

        let mut planned = Vec::new();
        for root in self.gate.stable_roots(now, grace) {
            info!(?root, "module quiet for the grace period; redeploying");
            match self.reload(&root) {
                Ok(mut batch) => planned.append(&mut batch),
                Err(err) => error!(?root, error = %err, "cannot reload module root"),
            }
        }
        self.plan_deferred(&mut planned);
        Ok(planned)
    }

    /// Pick up deferred deployments whose earlier redeploy has finished.
    /// Roots with a burst still settling are left to their own reload.
    fn plan_deferred(&mut self, planned: &mut Vec<PlannedRedeploy>) {
        for (root, module) in &mut self.modules {
            if module.deferred.is_empty() || self.gate.is_pending(root) {
                continue;
            }
            let ready: Vec<String> = module
                .deferred
                .iter()
                .filter(|name| {
                    module.deployments.contains_key(*name) && !module.in_flight.contains(*name)
                })
                .cloned()
                .collect();
            for name in ready {
                module.deferred.remove(&name);
                let Some(deployment) = module.deployments.get(&name) else {
                    continue;
                };
                info!(?root, deployment = %name, "redeploying deferred change");
                module.in_flight.insert(name.clone());
                planned.push(PlannedRedeploy {
                    root: root.clone(),
                    deployment: deployment.clone(),
                });
            }
        }
    }

    /// Plan a redeploy of every tracked deployment rooted at `root`.
    ///
    /// Deployments still being redeployed from an earlier tick are not
    /// started twice. They are marked deferred and redeployed, alone, once
    /// the current attempt is over; their siblings are not touched again.
    pub fn reload(&mut self, root: &Path) -> Result<Vec<PlannedRedeploy>> {
        let module = self
            .modules
            .get_mut(root)
            .ok_or_else(|| RedeployError::UnknownModuleRoot(root.to_path_buf()))?;

        let mut planned = Vec::new();
        for (name, deployment) in &module.deployments {
            if module.in_flight.contains(name) {
                debug!(?root, deployment = %name, "redeploy already in flight; deferring");
                module.deferred.insert(name.clone());
                continue;
            }
            module.deferred.remove(name);
            module.in_flight.insert(name.clone());
            planned.push(PlannedRedeploy {
                root: root.to_path_buf(),
                deployment: deployment.clone(),
            });
        }

        if module.deployments.is_empty() {
            debug!(?root, "no tracked deployments under changed root");
        }
        Ok(planned)
    }

    /// Record the end of a redeploy started by [`reload`].
    ///
    /// Only a successful redeploy stops tracking the old deployment; after a
    /// failure it stays tracked so the next change retries it. A deferral
    /// follows the deployment to its replacement.
    ///
    /// [`reload`]: ControllerState::reload
    pub fn finish_redeploy(&mut self, root: &Path, name: &str, outcome: &RedeployOutcome) {
        let Some(module) = self.modules.get_mut(root) else {
            warn!(?root, deployment = %name, "redeploy finished for unwatched root");
            return;
        };
        module.in_flight.remove(name);
        if let RedeployOutcome::Redeployed { deployment_id } = outcome {
            module.deployments.remove(name);
            debug!(?root, deployment = %name, "old deployment no longer tracked");
            if module.deferred.remove(name) {
                module.deferred.insert(deployment_id.clone());
            }
        }
    }

    pub fn tracked_deployments(&self, root: &Path) -> Vec<String> {
        self.modules
            .get(root)
            .map(WatchedModule::deployment_names)
            .unwrap_or_default()
    }

    pub fn watched_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.modules.keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn is_pending(&self, root: &Path) -> bool {
        self.gate.is_pending(root)
    }

    fn canonical_root(&self, dir: &Path) -> Result<PathBuf> {
        self.tree
            .fs()
            .canonicalize(dir)
            .map_err(|err| RedeployError::Register {
                dir: dir.to_path_buf(),
                reason: err.to_string(),
            })
    }
}
