//! vidstories: story prompt → narrated, illustrated video, plus tunable voice dialogue.

pub mod audio;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod services;
pub mod text;
pub mod utils;

pub use config::AppConfig;
pub use errors::{AppError, AppResult, ErrorKind};
pub use pipeline::{EventKind, PipelineEvent, StoryRequest, Studio, VoiceMode, VoiceRequest};
pub use services::Services;
