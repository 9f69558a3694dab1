//! Materialized entity hierarchy and the updater that keeps it current.
//!
//! ## Submodules
//!
//! - [`model`]: the node index and parent/child adjacency.
//! - [`updater`]: per-kind event handlers and the updater lifecycle.

pub mod model;
pub mod updater;

pub use model::{Attachment, HierarchyError, HierarchyModel, OrphanPolicy, Removal};
pub use updater::{HierarchyUpdater, Outcome, StartedUpdater, apply_event, handler_for};
