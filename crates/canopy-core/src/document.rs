//! Applying change sets to a document.
//!
//! [`DocumentSink`] is the seam to whatever stores the real document. A sink
//! applies a [`ChangeSet`] all-or-nothing and reports the hierarchy events
//! the application implies, which callers feed back into the event bus.
//!
//! [`InMemoryDocument`] is the reference sink: it validates and applies the
//! whole set against a scratch copy of its state and only swaps the copy in
//! once every change has succeeded.

use std::collections::HashSet;

use crate::change::{ChangeSet, DocumentChange, DocumentSnapshot};
use crate::error::ErrorCode;
use crate::event::HierarchyEvent;
use crate::model::{EntityId, EntityNode};

/// Why a sink refused a change set. The document is untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("entity {entity} is already declared")]
    AlreadyDeclared { entity: EntityId },

    #[error("change references unknown entity {entity}")]
    UnknownReference { entity: EntityId },

    #[error("placement {child} under {parent} is not present")]
    MissingPlacement { child: EntityId, parent: EntityId },

    #[error("placing {child} under {parent} would create a cycle in the document")]
    CyclicPlacement { child: EntityId, parent: EntityId },
}

impl SinkError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyDeclared { .. }
            | Self::MissingPlacement { .. }
            | Self::CyclicPlacement { .. } => ErrorCode::ChangeSetConflict,
            Self::UnknownReference { .. } => ErrorCode::ChangeSetUnknownReference,
        }
    }
}

/// Result of a successful application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChangeSet {
    /// Digest of the applied change set.
    pub digest: String,
    /// Document revision after application.
    pub revision: u64,
    /// Hierarchy notifications implied by the applied changes, in order.
    pub events: Vec<HierarchyEvent>,
}

/// Something that can apply change sets atomically.
pub trait DocumentSink {
    /// Point-in-time copy of the current document state.
    fn snapshot(&self) -> DocumentSnapshot;

    /// Apply every change in `changes` or none of them.
    ///
    /// # Errors
    ///
    /// A [`SinkError`] describing the first change that could not apply.
    fn apply(&mut self, changes: &ChangeSet) -> Result<AppliedChangeSet, SinkError>;
}

/// Document held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    state: DocumentSnapshot,
    revision: u64,
}

/// An event whose node payload is built from the final state.
enum Draft {
    Added(Option<EntityId>, EntityId),
    Removed(Option<EntityId>, EntityId),
    Relabeled(EntityId, String),
}

impl InMemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn from_snapshot(state: DocumentSnapshot) -> Self {
        Self { state, revision: 0 }
    }

    #[must_use]
    pub const fn state(&self) -> &DocumentSnapshot {
        &self.state
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Events that materialize the whole document from scratch: every
    /// unplaced entity at the root, then every placement.
    #[must_use]
    pub fn replay_events(&self) -> Vec<HierarchyEvent> {
        let mut events = Vec::new();
        for (entity, _) in self.state.entities() {
            let parents = self.state.parents_of(entity);
            if parents.is_empty() {
                events.push(HierarchyEvent::ChildAdded {
                    parent: None,
                    child: node_for(&self.state, entity),
                });
            }
            for parent in parents {
                events.push(HierarchyEvent::ChildAdded {
                    parent: Some(parent.clone()),
                    child: node_for(&self.state, entity),
                });
            }
        }
        events
    }
}

fn node_for(state: &DocumentSnapshot, entity: &EntityId) -> EntityNode {
    let label = state.label_of(entity).unwrap_or(entity.as_str());
    EntityNode::fresh(entity.clone(), label)
}

fn require(state: &DocumentSnapshot, entity: &EntityId) -> Result<(), SinkError> {
    if state.contains(entity) {
        Ok(())
    } else {
        Err(SinkError::UnknownReference {
            entity: entity.clone(),
        })
    }
}

impl DocumentSink for InMemoryDocument {
    fn snapshot(&self) -> DocumentSnapshot {
        self.state.clone()
    }

    fn apply(&mut self, changes: &ChangeSet) -> Result<AppliedChangeSet, SinkError> {
        let mut next = self.state.clone();
        let mut declared: HashSet<&EntityId> = HashSet::new();
        let mut drafts = Vec::new();

        for change in changes {
            match change {
                DocumentChange::DeclareEntity { entity, kind } => {
                    if !next.declare(entity.clone(), *kind) {
                        return Err(SinkError::AlreadyDeclared {
                            entity: entity.clone(),
                        });
                    }
                    declared.insert(entity);
                }
                DocumentChange::AssertPlacement { child, parent, .. } => {
                    require(&next, child)?;
                    require(&next, parent)?;
                    if next.is_within(parent, child) {
                        return Err(SinkError::CyclicPlacement {
                            child: child.clone(),
                            parent: parent.clone(),
                        });
                    }
                    let was_root = next.parents_of(child).is_empty() && !declared.contains(child);
                    if next.place(child.clone(), parent.clone()) {
                        drafts.push(Draft::Added(Some(parent.clone()), child.clone()));
                        if was_root {
                            drafts.push(Draft::Removed(None, child.clone()));
                        }
                    }
                }
                DocumentChange::RetractPlacement { child, parent, .. } => {
                    require(&next, child)?;
                    require(&next, parent)?;
                    if !next.unplace(child, parent) {
                        return Err(SinkError::MissingPlacement {
                            child: child.clone(),
                            parent: parent.clone(),
                        });
                    }
                    if next.parents_of(child).is_empty() {
                        drafts.push(Draft::Added(None, child.clone()));
                    }
                    drafts.push(Draft::Removed(Some(parent.clone()), child.clone()));
                }
                DocumentChange::AssertLabel { entity, label } => {
                    require(&next, entity)?;
                    next.set_label(entity.clone(), label.clone());
                    if !declared.contains(entity) {
                        drafts.push(Draft::Relabeled(entity.clone(), label.clone()));
                    }
                }
            }
        }

        // Newly declared entities that were never placed sit at the root.
        let rooted: Vec<Draft> = changes
            .iter()
            .filter_map(|change| match change {
                DocumentChange::DeclareEntity { entity, .. }
                    if next.parents_of(entity).is_empty() =>
                {
                    Some(Draft::Added(None, entity.clone()))
                }
                _ => None,
            })
            .collect();

        let events = rooted
            .into_iter()
            .chain(drafts)
            .map(|draft| match draft {
                Draft::Added(parent, child) => HierarchyEvent::ChildAdded {
                    parent,
                    child: node_for(&next, &child),
                },
                Draft::Removed(parent, child) => HierarchyEvent::ChildRemoved { parent, child },
                Draft::Relabeled(entity, new_text) => {
                    HierarchyEvent::BrowserTextChanged { entity, new_text }
                }
            })
            .collect();

        self.state = next;
        self.revision += 1;
        let digest = changes.digest();
        tracing::info!(revision = self.revision, digest = %digest, changes = changes.len(), "applied change set");
        Ok(AppliedChangeSet {
            digest,
            revision: self.revision,
            events,
        })
    }
}
