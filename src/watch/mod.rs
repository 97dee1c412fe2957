// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Abstracting the OS watch facility behind [`WatchBackend`] (with a
//!   `notify` implementation and an in-memory mock).
//! - Keeping one watch per directory under every module root, extending and
//!   pruning coverage as directories come and go ([`WatchTree`]).
//! - Draining pending notifications each tick into the set of module roots
//!   that changed ([`drain_changes`]).
//!
//! It does **not** know about deployments or timing; it only turns
//! filesystem changes into "this module root was touched".

pub mod aggregator;
pub mod backend;
pub mod mock;
pub mod notify_backend;
pub mod path_utils;
pub mod patterns;
pub mod tree;

pub use aggregator::drain_changes;
pub use backend::{Change, ChangeKind, WatchBackend, WatchBatch, WatchHandle};
pub use mock::MockWatchBackend;
pub use notify_backend::NotifyBackend;
pub use patterns::IgnoreSet;
pub use tree::{Resolution, WatchTree};
