pub mod job;
pub mod voice;

pub use job::{GenerationJob, JobStage};
pub use voice::{VoiceParam, VoiceProfile, VoiceSlot};
