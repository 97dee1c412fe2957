// src/deploy/manager.rs

//! The deployment manager seam.
//!
//! The redeployer never starts or stops units itself. It talks to a
//! `DeploymentManager` owned by the host, which knows how to run a module.
//! Tests provide their own implementation that records calls and completes
//! them on demand.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::deploy::model::{DeployRequest, Deployment};
use crate::errors::Result;

/// Boxed future returned by manager operations.
pub type ManagerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations the redeployer needs from the host's deployment manager.
pub trait DeploymentManager: Send + Sync {
    /// Every deployment currently known, keyed by deployment id.
    ///
    /// Only the marker strategy needs this.
    fn list_deployments(&self) -> BTreeMap<String, Deployment>;

    /// Whether `name` is currently active.
    fn has_deployment(&self, name: &str) -> bool;

    /// Stop `name`. Resolves once the unit has fully stopped.
    fn undeploy(&self, name: &str) -> ManagerFuture<'_, Result<()>>;

    /// Start a module. Resolves with the new deployment id, or the error
    /// that prevented it from starting.
    fn deploy_module(&self, request: DeployRequest) -> ManagerFuture<'_, Result<String>>;
}
