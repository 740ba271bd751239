//! Resource identifiers for Skimmer
//!
//! This module turns raw identifier strings into canonical [`ResourceId`]s so
//! that equivalent URLs compare equal, and extracts hosts for reporting.

mod domain;
mod normalize;

pub use domain::extract_domain;
pub use normalize::{canonical_url, canonicalize, ResourceId};
