pub mod files;
pub mod settings;

pub use files::{sort_key, DialogFile, FileRegistry};
pub use settings::{ScratchPad, VoiceStore};
