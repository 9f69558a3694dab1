use std::fmt;

/// Machine-readable error codes shared by every canopy error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    DanglingEdge,
    CycleDetected,
    AllocationFailure,
    InvalidParent,
    IncompatibleParent,
    UnknownEntity,
    OrderingViolation,
    NotPlaced,
    ChangeSetConflict,
    ChangeSetUnknownReference,
}

impl ErrorCode {
    /// Every code in catalog order.
    pub const ALL: [Self; 11] = [
        Self::ConfigParseError,
        Self::DanglingEdge,
        Self::CycleDetected,
        Self::AllocationFailure,
        Self::InvalidParent,
        Self::IncompatibleParent,
        Self::UnknownEntity,
        Self::OrderingViolation,
        Self::NotPlaced,
        Self::ChangeSetConflict,
        Self::ChangeSetUnknownReference,
    ];

    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::DanglingEdge => "E2001",
            Self::CycleDetected => "E2002",
            Self::AllocationFailure => "E3001",
            Self::InvalidParent => "E3002",
            Self::IncompatibleParent => "E3003",
            Self::UnknownEntity => "E3004",
            Self::OrderingViolation => "E3005",
            Self::NotPlaced => "E3006",
            Self::ChangeSetConflict => "E4001",
            Self::ChangeSetUnknownReference => "E4002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::DanglingEdge => "Edge endpoint is not in the hierarchy",
            Self::CycleDetected => "Edge would create a cycle",
            Self::AllocationFailure => "No collision-free entity name available",
            Self::InvalidParent => "Parent entity does not exist",
            Self::IncompatibleParent => "Parent entity has the wrong kind",
            Self::UnknownEntity => "Entity does not exist",
            Self::OrderingViolation => "Change references an undeclared entity",
            Self::NotPlaced => "Entity is not placed where the move starts",
            Self::ChangeSetConflict => "Change set conflicts with the document",
            Self::ChangeSetUnknownReference => "Change set references an unknown entity",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .canopy/config.toml and retry."),
            Self::DanglingEdge | Self::UnknownEntity => None,
            Self::CycleDetected => Some("Choose a parent outside the entity's own subtree."),
            Self::AllocationFailure => {
                Some("Use different source text or raise changes.max_attempts.")
            }
            Self::InvalidParent => Some("Refresh the document snapshot and pick an existing parent."),
            Self::IncompatibleParent => {
                Some("Classes take class parents; properties take properties of the same kind.")
            }
            Self::OrderingViolation => Some("Report a bug: generators must declare before use."),
            Self::NotPlaced => {
                Some("Pass one of the entity's current parents as --from, or omit it for a root.")
            }
            Self::ChangeSetConflict | Self::ChangeSetUnknownReference => {
                Some("Regenerate the change set against a fresh snapshot.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
