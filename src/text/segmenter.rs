//! Разбиение текста повествования на фрагменты для синтеза речи.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Максимальная длина фрагмента по умолчанию (в символах)
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 500;

/// Конец предложения: знак препинания и пробельные символы за ним
static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence break pattern is valid"));

/// Фрагмент текста для одного запроса к TTS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Предложения в исходном порядке, без пустых
pub fn sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // знак препинания остаётся в предложении
        let end = m.start() + 1;
        push_sentence(&mut result, &text[start..end]);
        start = m.end();
    }
    push_sentence(&mut result, &text[start..]);
    result
}

fn push_sentence<'a>(result: &mut Vec<&'a str>, sentence: &'a str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        result.push(sentence);
    }
}

/// Жадно собирает предложения во фрагменты длиной не больше `max_length`.
///
/// Предложения соединяются одним пробелом, и он учитывается в длине.
/// Предложение длиннее `max_length` становится отдельным фрагментом целиком.
pub fn split_text(text: &str, max_length: usize) -> Vec<TextChunk> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences(text) {
        let len = sentence.chars().count();
        if current.is_empty() {
            current.push_str(sentence);
            current_len = len;
        } else if current_len + 1 + len <= max_length {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk { index, text })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence_of(len: usize, letter: char) -> String {
        let mut s: String = std::iter::repeat(letter).take(len - 1).collect();
        s.push('.');
        s
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello world. This is a test.", 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world. This is a test.");
    }

    #[test]
    fn test_no_sentence_break_is_trimmed_input() {
        let chunks = split_text("   just one long thought without a stop   ", 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just one long thought without a stop");
    }

    #[test]
    fn test_empty_input() {
        assert!(split_text("", 500).is_empty());
        assert!(split_text("   \n ", 500).is_empty());
    }

    #[test]
    fn test_three_long_sentences_never_split() {
        let sentences: Vec<String> = ['a', 'b', 'c'].iter().map(|&c| sentence_of(300, c)).collect();
        let text = sentences.join(" ");

        let chunks = split_text(&text, 500);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 500);
            for part in chunk.text.split(' ') {
                assert!(sentences.contains(&part.to_string()), "sentence was split: {}", part);
            }
        }
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = sentence_of(700, 'x');
        let text = format!("Short one. {} Another short one.", long);

        let chunks = split_text(&text, 500);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Short one.", long.as_str(), "Another short one."]);
    }

    #[test]
    fn test_chunks_reconstruct_sentence_sequence() {
        let text = "First! Second? Third.\n\nFourth sentence here.  Fifth.";
        let chunks = split_text(text, 20);

        let rebuilt: Vec<&str> = chunks.iter().flat_map(|c| sentences(&c.text)).collect();
        assert_eq!(rebuilt, sentences(text));
        assert!(chunks.iter().all(|c| c.char_len() <= 21));
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunk_length_counts_characters() {
        let text = "Ééééé. Ééééé.";
        let chunks = split_text(text, 13);
        assert_eq!(chunks.len(), 1);
    }
}
