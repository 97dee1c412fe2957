// src/engine/mod.rs

//! Redeploy engine.
//!
//! This module ties together:
//! - the debounce gate that waits for a module root to go quiet
//! - the undeploy → deploy sequence run for each deployment
//! - the shared controller state touched by ticks and host notifications
//! - the two drivers:
//!   - [`HotRedeployer`] (watch strategy, periodic tick)
//!   - [`MarkerPoller`] (marker-file strategy, gated by a completion counter)
//!
//! The synchronous decisions live in [`state`]; the async shells are
//! [`runtime`] and [`marker`].

pub mod counter;
pub mod debounce;
pub mod marker;
pub mod orchestrator;
pub mod runtime;
pub mod state;

pub use counter::CompletionCounter;
pub use debounce::DebounceGate;
pub use marker::{MarkerPoller, MarkerSweep};
pub use orchestrator::{RedeployOutcome, RedeployPhase, redeploy};
pub use runtime::HotRedeployer;
pub use state::{ControllerState, PlannedRedeploy, WatchedModule};
