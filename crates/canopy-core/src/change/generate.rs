//! Edit requests → change sets.
//!
//! One [`EditRequest`] variant exists per request kind, and [`generate`]
//! dispatches on it:
//!
//! | Request | Changes |
//! |---|---|
//! | `create_class` | declare, optional `sub_class_of`, label |
//! | `create_*_property` | declare, optional `sub_property_of`, label |
//! | `create_individual` | declare, optional `class_assertion`, label |
//! | `move_entity` | optional retract, assert |
//!
//! Generation either returns the whole change set or an error; nothing is
//! half-built. Placement is never defaulted: a create request without a
//! parent produces no placement change.

use serde::{Deserialize, Serialize};

use super::context::ChangeGenerationContext;
use super::{ChangeSet, ChangeSetBuilder, DocumentChange, PlacementRelation};
use crate::error::ErrorCode;
use crate::model::{EntityId, EntityKind};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Reason a change set could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("no collision-free name for '{source_text}' within {attempts} attempts")]
    AllocationFailure { source_text: String, attempts: u32 },

    #[error("parent {parent} does not exist in the document")]
    InvalidParent { parent: EntityId },

    #[error("parent {parent} is a {actual}, expected a {expected}")]
    IncompatibleParent {
        parent: EntityId,
        expected: EntityKind,
        actual: EntityKind,
    },

    #[error("entity {entity} does not exist in the document")]
    UnknownEntity { entity: EntityId },

    #[error(
        "{entity} is not placed under {}",
        .parent.as_ref().map_or("the root", EntityId::as_str)
    )]
    NotPlacedUnder {
        entity: EntityId,
        /// `None` means the move claimed the entity sits at the root.
        parent: Option<EntityId>,
    },

    #[error("placing {entity} under {parent} would create a cycle")]
    CyclicPlacement { entity: EntityId, parent: EntityId },

    #[error("change references {entity} before it is declared")]
    OrderingViolation { entity: EntityId },
}

impl GenerationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AllocationFailure { .. } => ErrorCode::AllocationFailure,
            Self::InvalidParent { .. } => ErrorCode::InvalidParent,
            Self::IncompatibleParent { .. } => ErrorCode::IncompatibleParent,
            Self::UnknownEntity { .. } => ErrorCode::UnknownEntity,
            Self::NotPlacedUnder { .. } => ErrorCode::NotPlaced,
            Self::CyclicPlacement { .. } => ErrorCode::CycleDetected,
            Self::OrderingViolation { .. } => ErrorCode::OrderingViolation,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Which change categories a request can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub declarations: bool,
    pub placements: bool,
}

/// A high-level structural edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum EditRequest {
    CreateClass {
        source_text: String,
        #[serde(default)]
        parent: Option<EntityId>,
    },
    CreateObjectProperty {
        source_text: String,
        #[serde(default)]
        parent: Option<EntityId>,
    },
    CreateDataProperty {
        source_text: String,
        #[serde(default)]
        parent: Option<EntityId>,
    },
    CreateAnnotationProperty {
        source_text: String,
        #[serde(default)]
        parent: Option<EntityId>,
    },
    /// `parent` is the class the individual is asserted into.
    CreateIndividual {
        source_text: String,
        #[serde(default)]
        parent: Option<EntityId>,
    },
    /// Move `entity` from `from` (or the root) to `to`. `from` must be a
    /// current parent; `None` requires `entity` to be a root.
    MoveEntity {
        entity: EntityId,
        #[serde(default)]
        from: Option<EntityId>,
        to: EntityId,
    },
}

impl EditRequest {
    /// Create request for an entity of `kind`.
    #[must_use]
    pub fn create(kind: EntityKind, source_text: impl Into<String>, parent: Option<EntityId>) -> Self {
        let source_text = source_text.into();
        match kind {
            EntityKind::Class => Self::CreateClass { source_text, parent },
            EntityKind::ObjectProperty => Self::CreateObjectProperty { source_text, parent },
            EntityKind::DataProperty => Self::CreateDataProperty { source_text, parent },
            EntityKind::AnnotationProperty => {
                Self::CreateAnnotationProperty { source_text, parent }
            }
            EntityKind::NamedIndividual => Self::CreateIndividual { source_text, parent },
        }
    }

    /// Kind of the entity this request creates, if it creates one.
    #[must_use]
    pub const fn created_kind(&self) -> Option<EntityKind> {
        match self {
            Self::CreateClass { .. } => Some(EntityKind::Class),
            Self::CreateObjectProperty { .. } => Some(EntityKind::ObjectProperty),
            Self::CreateDataProperty { .. } => Some(EntityKind::DataProperty),
            Self::CreateAnnotationProperty { .. } => Some(EntityKind::AnnotationProperty),
            Self::CreateIndividual { .. } => Some(EntityKind::NamedIndividual),
            Self::MoveEntity { .. } => None,
        }
    }

    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            Self::MoveEntity { .. } => Capabilities {
                declarations: false,
                placements: true,
            },
            _ => Capabilities {
                declarations: true,
                placements: true,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Produce the change set for `request`, consuming `context`.
///
/// # Errors
///
/// Any [`GenerationError`]; see the variants for when each occurs.
pub fn generate(
    request: &EditRequest,
    mut context: ChangeGenerationContext<'_>,
) -> Result<ChangeSet, GenerationError> {
    let changes = match request {
        EditRequest::CreateClass {
            source_text,
            parent,
        } => create_entity(&mut context, EntityKind::Class, source_text, parent.as_ref())?,
        EditRequest::CreateObjectProperty {
            source_text,
            parent,
        } => create_entity(
            &mut context,
            EntityKind::ObjectProperty,
            source_text,
            parent.as_ref(),
        )?,
        EditRequest::CreateDataProperty {
            source_text,
            parent,
        } => create_entity(
            &mut context,
            EntityKind::DataProperty,
            source_text,
            parent.as_ref(),
        )?,
        EditRequest::CreateAnnotationProperty {
            source_text,
            parent,
        } => create_entity(
            &mut context,
            EntityKind::AnnotationProperty,
            source_text,
            parent.as_ref(),
        )?,
        EditRequest::CreateIndividual {
            source_text,
            parent,
        } => create_entity(
            &mut context,
            EntityKind::NamedIndividual,
            source_text,
            parent.as_ref(),
        )?,
        EditRequest::MoveEntity { entity, from, to } => {
            move_entity(&context, entity, from.as_ref(), to)?
        }
    };
    tracing::debug!(
        changes = changes.len(),
        digest = %changes.digest(),
        "generated change set"
    );
    Ok(changes)
}

/// The kind a parent must have to hold an entity of `kind`.
const fn expected_parent_kind(kind: EntityKind) -> EntityKind {
    match kind {
        EntityKind::NamedIndividual => EntityKind::Class,
        other => other,
    }
}

fn check_parent(
    context: &ChangeGenerationContext<'_>,
    kind: EntityKind,
    parent: &EntityId,
) -> Result<(), GenerationError> {
    let actual = context
        .snapshot()
        .kind_of(parent)
        .ok_or_else(|| GenerationError::InvalidParent {
            parent: parent.clone(),
        })?;
    let expected = expected_parent_kind(kind);
    if actual != expected {
        return Err(GenerationError::IncompatibleParent {
            parent: parent.clone(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn create_entity(
    context: &mut ChangeGenerationContext<'_>,
    kind: EntityKind,
    source_text: &str,
    parent: Option<&EntityId>,
) -> Result<ChangeSet, GenerationError> {
    if let Some(parent) = parent {
        check_parent(context, kind, parent)?;
    }
    let fresh = context.allocate_fresh(source_text)?;

    let mut builder = ChangeSetBuilder::new(context.snapshot());
    builder.push(DocumentChange::DeclareEntity {
        entity: fresh.clone(),
        kind,
    })?;
    if let Some(parent) = parent {
        builder.push(DocumentChange::AssertPlacement {
            child: fresh.clone(),
            parent: parent.clone(),
            relation: PlacementRelation::for_kind(kind),
        })?;
    }
    if context.emit_labels() {
        builder.push(DocumentChange::AssertLabel {
            entity: fresh,
            label: source_text.trim().to_string(),
        })?;
    }
    Ok(builder.finish())
}

fn move_entity(
    context: &ChangeGenerationContext<'_>,
    entity: &EntityId,
    from: Option<&EntityId>,
    to: &EntityId,
) -> Result<ChangeSet, GenerationError> {
    let snapshot = context.snapshot();
    let kind = snapshot
        .kind_of(entity)
        .ok_or_else(|| GenerationError::UnknownEntity {
            entity: entity.clone(),
        })?;
    check_parent(context, kind, to)?;
    if let Some(from) = from.filter(|from| !snapshot.contains(from)) {
        return Err(GenerationError::InvalidParent {
            parent: from.clone(),
        });
    }
    let placed = match from {
        Some(from) => snapshot.has_placement(entity, from),
        None => snapshot.parents_of(entity).is_empty(),
    };
    if !placed {
        return Err(GenerationError::NotPlacedUnder {
            entity: entity.clone(),
            parent: from.cloned(),
        });
    }
    if snapshot.is_within(to, entity) {
        return Err(GenerationError::CyclicPlacement {
            entity: entity.clone(),
            parent: to.clone(),
        });
    }

    let mut builder = ChangeSetBuilder::new(snapshot);
    if from == Some(to) {
        return Ok(builder.finish());
    }
    let relation = PlacementRelation::for_kind(kind);
    if let Some(from) = from {
        builder.push(DocumentChange::RetractPlacement {
            child: entity.clone(),
            parent: from.clone(),
            relation,
        })?;
    }
    if !snapshot.has_placement(entity, to) {
        builder.push(DocumentChange::AssertPlacement {
            child: entity.clone(),
            parent: to.clone(),
            relation,
        })?;
    }
    Ok(builder.finish())
}
