//! Small shared vocabulary the planner/trigger/backfill modules all need
//! but that doesn't belong to any one of them.

/// What kind of secondary a `SecondaryTarget` maintains (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Enforces uniqueness on insert; conflicts surface as `UniqueConstraint`.
    AltKey,
    /// Ordinary non-unique secondary; conflicts are impossible by construction.
    PlainSecondary,
}
