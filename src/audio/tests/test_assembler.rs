use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::tempdir;
use tokio::sync::mpsc;

use crate::audio::assembler::{AssemblyProgress, AudioAssembler};
use crate::audio::buffer::AudioBuffer;
use crate::audio::format::{decode_audio, WavEncoder};
use crate::errors::{AppError, AppResult};
use crate::models::{VoiceProfile, VoiceSlot};
use crate::services::SpeechSynthesizer;
use crate::text::split_text;

/// Синтезатор, выдающий по 100 семплов на символ; значение семпла = номер вызова
struct CountingSynth {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    fail_on: Option<usize>,
}

impl CountingSynth {
    fn new(fail_on: Option<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            fail_on,
        }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for CountingSynth {
    async fn synthesize(&self, text: &str, _voice: VoiceSlot) -> AppResult<AudioBuffer> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(AppError::Service("tts unavailable".into()));
        }
        self.seen.lock().unwrap().push(text.to_string());
        AudioBuffer::new(vec![call as i16; text.len() * 100], 24000, 1)
    }
}

#[tokio::test]
async fn test_chunks_assembled_in_order_with_progress() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("Voice 1_story.wav");
    let chunks = split_text("First sentence here. Second one! Third?", 15);
    assert_eq!(chunks.len(), 3);

    let synth = Arc::new(CountingSynth::new(None));
    let assembler = AudioAssembler::new(synth.clone(), Arc::new(WavEncoder));
    let (tx, mut rx) = mpsc::channel(16);

    let assembled = assembler
        .assemble(&chunks, VoiceSlot::Voice1, VoiceProfile::default(), &output, Some(tx))
        .await
        .unwrap();

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    assert_eq!(
        updates,
        (1..=3).map(|completed| AssemblyProgress { completed, total: 3 }).collect::<Vec<_>>()
    );

    let seen = synth.seen.lock().unwrap().clone();
    let expected: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    assert_eq!(seen, expected);

    let expected_secs: f64 = chunks.iter().map(|c| (c.text.len() * 100) as f64 / 24000.0).sum();
    assert!((assembled.duration_secs - expected_secs).abs() < 1e-9);
    assert_eq!(assembled.chunk_count, 3);

    let decoded = decode_audio(&std::fs::read(&output).unwrap(), "wav").unwrap();
    let first_len = chunks[0].text.len() * 100;
    assert_eq!(decoded.samples()[0], 1);
    assert_eq!(decoded.samples()[first_len], 2);
    assert_eq!(*decoded.samples().last().unwrap(), 3);
}

#[tokio::test]
async fn test_failed_chunk_leaves_no_artifact() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("Voice 2_story.wav");
    let chunks = split_text("One. Two. Three.", 4);

    let assembler = AudioAssembler::new(Arc::new(CountingSynth::new(Some(2))), Arc::new(WavEncoder));
    let result = assembler
        .assemble(&chunks, VoiceSlot::Voice2, VoiceProfile::default(), &output, None)
        .await;

    assert!(matches!(result, Err(AppError::Service(_))));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_empty_chunk_list_rejected() {
    let dir = tempdir().unwrap();
    let assembler = AudioAssembler::new(Arc::new(CountingSynth::new(None)), Arc::new(WavEncoder));

    let result = assembler
        .assemble(&[], VoiceSlot::Voice1, VoiceProfile::default(), &dir.path().join("x.wav"), None)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}
