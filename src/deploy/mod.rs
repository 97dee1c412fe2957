// src/deploy/mod.rs

//! Deployment records and the deployment manager interface.
//!
//! - [`model`] holds the `Deployment` record and deploy request.
//! - [`manager`] defines the `DeploymentManager` trait the host implements.

pub mod manager;
pub mod model;

pub use manager::{DeploymentManager, ManagerFuture};
pub use model::{DeployRequest, Deployment, ModuleConfig};
