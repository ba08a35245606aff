//! Синтез речи через публичный endpoint Google Translate TTS.
//!
//! Голос задаётся региональным доменом (`co.uk`, `com`), язык фиксирован.
//! Endpoint принимает не больше 100 символов за запрос, поэтому фрагмент
//! режется по словам, а MP3-ответы склеиваются перед декодированием.

use std::time::Duration;

use log::{debug, error, info};
use reqwest::Client;

use crate::audio::buffer::AudioBuffer;
use crate::audio::format::decode_audio;
use crate::errors::{AppError, AppResult};
use crate::models::VoiceSlot;
use crate::services::SpeechSynthesizer;

/// Лимит длины одного запроса к endpoint
pub const MAX_REQUEST_CHARS: usize = 100;

pub struct GoogleTtsClient {
    client: Client,
    host_base: String,
    language: String,
}

impl GoogleTtsClient {
    pub fn new(host_base: &str, language: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host_base: host_base.trim_end_matches('/').to_string(),
            language: language.to_string(),
        })
    }

    fn endpoint(&self, voice: VoiceSlot) -> String {
        format!("{}.{}/translate_tts", self.host_base, voice.tld())
    }

    async fn fetch_piece(
        &self,
        endpoint: &str,
        piece: &str,
        idx: usize,
        total: usize,
    ) -> AppResult<Vec<u8>> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = piece.chars().count().to_string();

        let response = self
            .client
            .get(endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("ttsspeed", "1"),
                ("q", piece),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("TTS request failed: HTTP {}", status);
            return Err(AppError::Service(format!("TTS service returned {}", status)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::Service("TTS service returned empty audio".into()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for GoogleTtsClient {
    async fn synthesize(&self, text: &str, voice: VoiceSlot) -> AppResult<AudioBuffer> {
        let pieces = split_for_request(text, MAX_REQUEST_CHARS);
        if pieces.is_empty() {
            return Err(AppError::Validation("Nothing to synthesize".into()));
        }

        let endpoint = self.endpoint(voice);
        info!("Синтез речи ({}, {} запросов)", voice, pieces.len());

        let mut mp3 = Vec::new();
        for (idx, piece) in pieces.iter().enumerate() {
            debug!("TTS запрос {}/{}: {} символов", idx + 1, pieces.len(), piece.chars().count());
            let bytes = self.fetch_piece(&endpoint, piece, idx, pieces.len()).await?;
            mp3.extend_from_slice(&bytes);
        }

        tokio::task::spawn_blocking(move || decode_audio(&mp3, "mp3")).await?
    }
}

/// Режет текст на куски не длиннее `limit` символов по границам слов.
///
/// Слово длиннее лимита режется посимвольно.
pub fn split_for_request(text: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for part in chars.chunks(limit) {
                pieces.push(part.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > limit {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
