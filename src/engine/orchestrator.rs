// src/engine/orchestrator.rs

//! Undeploy → redeploy sequencing for a single deployment.
//!
//! Each deployment is redeployed by its own task, so one unit failing to
//! start never holds up its siblings. The sequence is an explicit two-phase
//! state machine driven by the manager's completion futures.

use tracing::{info, warn};

use crate::deploy::{DeploymentManager, Deployment};

/// Where a redeploy attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeployPhase {
    PendingUndeploy,
    PendingDeploy,
}

/// How a redeploy attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeployOutcome {
    /// The module is running again under `deployment_id`.
    Redeployed { deployment_id: String },
    /// The old instance could not be stopped; nothing was deployed.
    UndeployFailed { error: String },
    /// The old instance is gone but the new one failed to start.
    DeployFailed { error: String },
}

impl RedeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RedeployOutcome::Redeployed { .. })
    }
}

/// Run one redeploy of `deployment` to completion.
///
/// If the manager no longer has the deployment active (its previous
/// redeploy failed to start), the undeploy phase is skipped and the module
/// is deployed straight away.
pub async fn redeploy(manager: &dyn DeploymentManager, deployment: &Deployment) -> RedeployOutcome {
    let mut phase = if manager.has_deployment(&deployment.name) {
        RedeployPhase::PendingUndeploy
    } else {
        info!(
            deployment = %deployment.name,
            "deployment not active (previous attempt failed?); deploying directly"
        );
        RedeployPhase::PendingDeploy
    };

    loop {
        match phase {
            RedeployPhase::PendingUndeploy => {
                info!(deployment = %deployment.name, "undeploying");
                match manager.undeploy(&deployment.name).await {
                    Ok(()) => {
                        info!(deployment = %deployment.name, "undeployed");
                        phase = RedeployPhase::PendingDeploy;
                    }
                    Err(err) => {
                        warn!(deployment = %deployment.name, error = %err, "undeploy failed");
                        return RedeployOutcome::UndeployFailed {
                            error: err.to_string(),
                        };
                    }
                }
            }
            RedeployPhase::PendingDeploy => {
                info!(
                    deployment = %deployment.name,
                    module = %deployment.module_name,
                    instances = deployment.instances,
                    "deploying module"
                );
                return match manager.deploy_module(deployment.redeploy_request()).await {
                    Ok(deployment_id) => {
                        info!(
                            deployment = %deployment.name,
                            new_deployment = %deployment_id,
                            "redeployed"
                        );
                        RedeployOutcome::Redeployed { deployment_id }
                    }
                    Err(err) => {
                        warn!(
                            deployment = %deployment.name,
                            module = %deployment.module_name,
                            error = %err,
                            "redeploy failed; will retry on next change"
                        );
                        RedeployOutcome::DeployFailed {
                            error: err.to_string(),
                        }
                    }
                };
            }
        }
    }
}
