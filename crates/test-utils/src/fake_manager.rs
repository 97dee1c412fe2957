use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use hot_redeploy::deploy::{DeployRequest, Deployment, DeploymentManager, ManagerFuture};
use hot_redeploy::errors::{RedeployError, Result};

/// One call made against the fake manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Undeploy(String),
    Deploy { module: String, instances: usize },
}

impl Call {
    pub fn deploy(module: &str, instances: usize) -> Self {
        Call::Deploy {
            module: module.to_string(),
            instances,
        }
    }

    pub fn undeploy(name: &str) -> Self {
        Call::Undeploy(name.to_string())
    }
}

#[derive(Debug, Default)]
struct Inner {
    active: BTreeMap<String, Deployment>,
    calls: Vec<Call>,
    issued: HashMap<String, usize>,
    module_dirs: HashMap<String, PathBuf>,
    failing_deploys: usize,
    failing_undeploys: usize,
}

/// A fake deployment manager that:
/// - records every undeploy/deploy call in order
/// - keeps an active set so `has_deployment` reflects earlier calls
/// - names new deployments `<module>-<n>`
/// - fails the next N deploys on request
/// - optionally holds deploys until the test releases them.
#[derive(Debug, Clone, Default)]
pub struct FakeDeploymentManager {
    inner: Arc<Mutex<Inner>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeDeploymentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys wait for [`release_deploys`](Self::release_deploys) before
    /// completing.
    pub fn gated() -> Self {
        Self {
            inner: Arc::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    pub fn release_deploys(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Mark `deployment` as active, as if the host had started it.
    pub fn add_deployment(&self, deployment: Deployment) {
        let mut inner = self.inner.lock().unwrap();
        *inner.issued.entry(deployment.module_name.clone()).or_default() += 1;
        if let Some(dir) = &deployment.module_dir {
            inner
                .module_dirs
                .insert(deployment.module_name.clone(), dir.clone());
        }
        inner.active.insert(deployment.name.clone(), deployment);
    }

    pub fn fail_next_deploys(&self, n: usize) {
        self.inner.lock().unwrap().failing_deploys = n;
    }

    pub fn fail_next_undeploys(&self, n: usize) {
        self.inner.lock().unwrap().failing_undeploys = n;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn deploy_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Deploy { .. }))
            .count()
    }

    pub fn active_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().active.keys().cloned().collect()
    }

    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        self.inner.lock().unwrap().active.get(name).cloned()
    }
}

impl DeploymentManager for FakeDeploymentManager {
    fn list_deployments(&self) -> BTreeMap<String, Deployment> {
        self.inner.lock().unwrap().active.clone()
    }

    fn has_deployment(&self, name: &str) -> bool {
        self.inner.lock().unwrap().active.contains_key(name)
    }

    fn undeploy(&self, name: &str) -> ManagerFuture<'_, Result<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(Call::Undeploy(name.clone()));
            if inner.failing_undeploys > 0 {
                inner.failing_undeploys -= 1;
                return Err(RedeployError::Undeploy(format!("{name} refused to stop")));
            }
            inner.active.remove(&name);
            Ok(())
        })
    }

    fn deploy_module(&self, request: DeployRequest) -> ManagerFuture<'_, Result<String>> {
        Box::pin(async move {
            self.inner.lock().unwrap().calls.push(Call::Deploy {
                module: request.module_name.clone(),
                instances: request.instances,
            });

            if let Some(gate) = &self.gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| RedeployError::Deploy(e.to_string()))?;
                permit.forget();
            }

            let mut inner = self.inner.lock().unwrap();
            if inner.failing_deploys > 0 {
                inner.failing_deploys -= 1;
                return Err(RedeployError::Deploy(format!(
                    "{} failed to start",
                    request.module_name
                )));
            }

            let seq = inner.issued.entry(request.module_name.clone()).or_default();
            *seq += 1;
            let name = format!("{}-{}", request.module_name, seq);
            let deployment = Deployment {
                name: name.clone(),
                module_name: request.module_name.clone(),
                module_dir: inner.module_dirs.get(&request.module_name).cloned(),
                config: request.config,
                instances: request.instances,
                parent: request.parent,
            };
            inner.active.insert(name.clone(), deployment);
            Ok(name)
        })
    }
}
