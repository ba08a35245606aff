//! Pipeline: background jobs, typed events and orchestration

pub mod events;
pub mod orchestrator;
pub mod pool;

pub use events::{EventKind, EventSink, PipelineEvent};
pub use orchestrator::{StoryRequest, Studio, VoiceMode, VoiceRequest, REFUSAL_SENTINEL};
pub use pool::{JobHandle, JobTable, WorkerPool};
