// src/lib.rs

pub mod config;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RedeployConfig;
use crate::deploy::DeploymentManager;
use crate::engine::{HotRedeployer, MarkerPoller};
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::types::DetectionStrategy;

/// A running redeployer, as returned by [`start`].
#[derive(Debug)]
pub struct RedeployerHandle {
    task: JoinHandle<()>,
    redeployer: Option<HotRedeployer>,
}

impl RedeployerHandle {
    /// The watch-strategy redeployer the host reports deployments to.
    /// `None` under the marker strategy, which reads deployments from the
    /// manager instead.
    pub fn redeployer(&self) -> Option<&HotRedeployer> {
        self.redeployer.as_ref()
    }

    /// Stop the driver. Redeploys already started run to completion.
    pub fn shutdown(self) {
        info!("stopping redeployer");
        self.task.abort();
    }
}

/// High-level entry point used by the host.
///
/// Installs logging at the configured level unless the host already did,
/// picks the detection strategy from `config`, builds the matching driver
/// over the real filesystem and starts its timer.
///
/// Must be called from within a tokio runtime.
pub fn start(config: &RedeployConfig, manager: Arc<dyn DeploymentManager>) -> Result<RedeployerHandle> {
    if let Err(err) = logging::init_logging(config.log_level) {
        debug!(error = %err, "keeping existing tracing subscriber");
    }
    info!(strategy = ?config.strategy, "starting redeployer");
    match config.strategy {
        DetectionStrategy::Watch => {
            let redeployer = HotRedeployer::with_notify(config, manager)?;
            let task = redeployer.spawn();
            Ok(RedeployerHandle {
                task,
                redeployer: Some(redeployer),
            })
        }
        DetectionStrategy::Marker => {
            let poller = MarkerPoller::new(config, manager, Arc::new(RealFileSystem));
            Ok(RedeployerHandle {
                task: poller.spawn(),
                redeployer: None,
            })
        }
    }
}
