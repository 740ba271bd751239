use crate::state::TaskState;
use crate::url::ResourceId;
use crate::SkimmerError;

/// One unit of crawl work: an admitted identifier and where it sits in the crawl
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub id: ResourceId,

    /// Seeds are depth 0; discoveries are one deeper than their parent
    pub depth: u32,

    /// Fetch attempts started so far
    pub attempts: u32,

    pub parent: Option<ResourceId>,
    state: TaskState,
}

impl CrawlTask {
    /// Creates a task for a seed
    pub fn seed(id: ResourceId) -> Self {
        Self {
            id,
            depth: 0,
            attempts: 0,
            parent: None,
            state: TaskState::Pending,
        }
    }

    /// Creates a task for an identifier discovered inside `parent`
    pub fn discovered(id: ResourceId, parent: &CrawlTask) -> Self {
        Self {
            id,
            depth: parent.depth + 1,
            attempts: 0,
            parent: Some(parent.id.clone()),
            state: TaskState::Pending,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Moves the task to `next`, rejecting transitions the lifecycle forbids
    pub fn advance(&mut self, next: TaskState) -> Result<(), SkimmerError> {
        if !self.state.can_transition_to(next) {
            return Err(SkimmerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Marks the start of a fetch attempt
    pub fn begin_attempt(&mut self) -> Result<(), SkimmerError> {
        self.advance(TaskState::InFlight)?;
        self.attempts += 1;
        Ok(())
    }
}
