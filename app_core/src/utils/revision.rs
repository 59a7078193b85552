//! Optimistic-lock revision tokens for slug-keyed entities.

use serde::{Deserialize, Serialize};

/// Persistence revision of an entity. Saving a `Persisted` revision
/// requires the stored version to match and bumps it by one; a mismatch is
/// surfaced as a stale error and callers reload and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Revision {
    /// not yet persisted
    #[default]
    New,
    /// persisted with the given version
    Persisted(i64),
}

impl Revision {
    pub fn version(&self) -> Option<i64> {
        match self {
            Revision::New => None,
            Revision::Persisted(v) => Some(*v),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Revision::New)
    }

    /// The revision the entity will carry after a successful save.
    pub fn bumped(&self) -> Revision {
        match self {
            Revision::New => Revision::Persisted(0),
            Revision::Persisted(v) => Revision::Persisted(v + 1),
        }
    }
}

/// Accessors shared by all revisioned entities.
pub trait ObjectRevision {
    fn revision(&self) -> Revision;
    fn set_revision(&mut self, revision: Revision);
}
