#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hot_redeploy::config::RedeployConfig;
use hot_redeploy::deploy::Deployment;
use hot_redeploy::engine::{HotRedeployer, RedeployOutcome};
use hot_redeploy::fs::mock::MockFileSystem;
use hot_redeploy::watch::MockWatchBackend;
use hot_redeploy_test_utils::builders::DeploymentBuilder;
use hot_redeploy_test_utils::fake_manager::FakeDeploymentManager;
use hot_redeploy_test_utils::{init_tracing, with_timeout};

/// A redeployer wired to in-memory collaborators, driven with explicit
/// timestamps instead of a timer.
pub struct Harness {
    pub redeployer: HotRedeployer,
    pub backend: MockWatchBackend,
    pub fs: MockFileSystem,
    pub manager: FakeDeploymentManager,
    pub t0: Instant,
}

impl Harness {
    pub fn new(config: &RedeployConfig) -> Self {
        Self::with_manager(config, FakeDeploymentManager::new())
    }

    pub fn with_manager(config: &RedeployConfig, manager: FakeDeploymentManager) -> Self {
        init_tracing();
        let fs = MockFileSystem::new();
        let backend = MockWatchBackend::new();
        let redeployer = HotRedeployer::new(
            config,
            Arc::new(manager.clone()),
            Box::new(backend.clone()),
            Arc::new(fs.clone()),
        )
        .expect("valid redeployer config");
        Self {
            redeployer,
            backend,
            fs,
            manager,
            t0: Instant::now(),
        }
    }

    pub fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    /// Start `name` from `dir` the way the host would: the manager knows
    /// it, then the redeployer is told.
    pub fn deploy(&self, name: &str, module: &str, dir: &str) -> Deployment {
        let deployment = DeploymentBuilder::new(name, module)
            .module_dir(dir)
            .config(serde_json::json!({ "module": module }))
            .build();
        self.manager.add_deployment(deployment.clone());
        self.redeployer
            .module_deployed(Path::new(dir), deployment.clone())
            .expect("module root registers");
        deployment
    }

    /// Report a deployment started by a redeploy back to the redeployer.
    pub fn report_started(&self, name: &str) {
        let deployment = self
            .manager
            .deployment(name)
            .expect("manager knows the new deployment");
        let dir = deployment.module_dir.clone().expect("file-backed deployment");
        self.redeployer
            .module_deployed(&dir, deployment)
            .expect("module root registers");
    }

    /// Run one tick at `ms` and wait for every redeploy it started.
    pub async fn tick(&self, ms: u64) -> Vec<RedeployOutcome> {
        let handles = self.redeployer.tick_at(self.at(ms)).expect("tick succeeds");
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(with_timeout(handle).await.expect("redeploy task panicked"));
        }
        outcomes
    }
}
