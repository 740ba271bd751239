//! State module for tracking crawl progress
//!
//! This module provides the session-scoped state shared by the crawler.
//!
//! # Components
//!
//! - `TaskState`: Lifecycle of an individual crawl task
//! - `Deduplicator`: Seen-set guaranteeing each resource is admitted at most once

mod seen;
mod task_state;

pub use seen::{AdmitResult, Deduplicator};
pub use task_state::TaskState;
