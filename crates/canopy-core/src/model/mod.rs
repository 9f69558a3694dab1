//! Value types shared by the hierarchy view and change generation.

pub mod entity;

pub use entity::{EntityId, EntityKind, EntityNode, UserId, Watch, WatchType};
