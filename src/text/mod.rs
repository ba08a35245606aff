pub mod fragments;
pub mod segmenter;

pub use fragments::{image_fragments, project_name, prompt_url_path};
pub use segmenter::{split_text, TextChunk, DEFAULT_MAX_CHUNK_LENGTH};
