//! Audio processing: PCM buffers, voice effects, encoding and track assembly

pub mod assembler;
pub mod buffer;
pub mod effects;
pub mod format;

pub use assembler::{AssembledAudio, AssemblyProgress, AudioAssembler};
pub use buffer::AudioBuffer;
pub use effects::apply_voice_profile;
pub use format::{decode_audio, encoder_for, AudioEncoder, Mp3Encoder, WavEncoder};
