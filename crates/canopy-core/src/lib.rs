//! canopy-core library.
//!
//! Two halves share the [`model`] types:
//!
//! - [`hierarchy`] keeps a materialized tree of entities current by
//!   applying typed [`event`]s delivered through an [`event::EventSource`].
//! - [`change`] turns edit requests into ordered, atomic change sets, which
//!   a [`document::DocumentSink`] applies and reports back as events.
//!
//! # Conventions
//!
//! - **Errors**: per-module `thiserror` enums, each mapping to an
//!   [`error::ErrorCode`]. `anyhow::Result` only at the config boundary.
//! - **Logging**: `tracing` macros; subscribers are the binary's business.

pub mod change;
pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod event;
pub mod hierarchy;
pub mod model;
