use crate::storage::traits::{ArtifactSink, StorageResult};
use crate::storage::Artifact;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Keeps every stored artifact in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Arc<Mutex<Vec<Artifact>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the artifacts stored so far, in store order
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn store(&self, artifact: Artifact) -> StorageResult<()> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(artifact);
        Ok(())
    }
}

/// Stores each artifact into several sinks in order
///
/// The first failing sink ends the store; later sinks are skipped.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ArtifactSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ArtifactSink for FanoutSink {
    async fn store(&self, artifact: Artifact) -> StorageResult<()> {
        let Some((last, rest)) = self.sinks.split_last() else {
            return Ok(());
        };

        for sink in rest {
            sink.store(artifact.clone()).await?;
        }
        last.store(artifact).await
    }
}
