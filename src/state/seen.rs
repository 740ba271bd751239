use crate::url::{canonicalize, ResourceId};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Outcome of offering an identifier to the [`Deduplicator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitResult {
    /// First time this identifier was seen in the session
    Accepted(ResourceId),
    /// The identifier (or an equivalent one) was admitted earlier
    AlreadySeen,
}

impl AdmitResult {
    /// Returns true if the identifier was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Session-scoped set of admitted identifiers
///
/// The check-and-insert in [`admit_id`](Self::admit_id) happens under a single
/// lock, so two concurrent admissions of the same identifier produce exactly
/// one `Accepted`. Nothing is ever removed.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<ResourceId>>,
}

impl Deduplicator {
    /// Creates an empty deduplicator
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalizes a raw identifier and admits it
    pub fn admit(&self, raw: &str) -> AdmitResult {
        self.admit_id(canonicalize(raw))
    }

    /// Admits an already canonical identifier
    pub fn admit_id(&self, id: ResourceId) -> AdmitResult {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(&id) {
            AdmitResult::AlreadySeen
        } else {
            seen.insert(id.clone());
            AdmitResult::Accepted(id)
        }
    }

    /// Returns true if the identifier has been admitted
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Number of unique identifiers admitted so far
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been admitted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
