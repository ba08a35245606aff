use crate::audio::buffer::AudioBuffer;
use crate::audio::effects::{
    apply_gain, apply_voice_profile, formant_shift, high_pass_filter, low_pass_filter, overlay,
};
use crate::models::{VoiceParam, VoiceProfile};
use std::f64::consts::PI;

/// Синусоида с заданной амплитудой
fn sine(freq: f64, duration_sec: f64, sample_rate: u32, amplitude: f64) -> AudioBuffer {
    let frames = (duration_sec * sample_rate as f64) as usize;
    let samples = (0..frames)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            ((2.0 * PI * freq * t).sin() * amplitude) as i16
        })
        .collect();
    AudioBuffer::new(samples, sample_rate, 1).unwrap()
}

fn peak(buffer: &AudioBuffer) -> i32 {
    buffer.samples().iter().map(|&s| (s as i32).abs()).max().unwrap_or(0)
}

#[test]
fn test_neutral_profile_is_identity() {
    let input = sine(440.0, 0.5, 24000, 12000.0);
    let output = apply_voice_profile(&input, &VoiceProfile::default()).unwrap();

    assert_eq!(output, input);
}

#[test]
fn test_neutral_profile_keeps_stereo() {
    let input = AudioBuffer::new(vec![100, -100, 200, -200, 300, -300], 22050, 2).unwrap();
    let output = apply_voice_profile(&input, &VoiceProfile::default()).unwrap();

    assert_eq!(output.samples(), input.samples());
    assert_eq!(output.channels(), 2);
    assert_eq!(output.sample_rate(), 22050);
}

#[test]
fn test_formant_shift_keeps_rate_and_duration() {
    let input = sine(220.0, 1.0, 24000, 8000.0);
    for semitones in [-5.0, -0.1, 0.1, 2.5, 5.0] {
        let output = formant_shift(&input, semitones).unwrap();
        assert_eq!(output.sample_rate(), input.sample_rate());
        assert!((output.duration_secs() - input.duration_secs()).abs() < 1e-12);
        assert_eq!(output.samples(), input.samples());
    }

    let profile = VoiceProfile::default().with(VoiceParam::FormantShift, 3.7);
    let output = apply_voice_profile(&input, &profile).unwrap();
    assert_eq!(output, input);
}

#[test]
fn test_speed_reinterprets_rate() {
    let input = sine(440.0, 1.0, 24000, 8000.0);
    let profile = VoiceProfile::default().with(VoiceParam::Speed, 1.25);
    let output = apply_voice_profile(&input, &profile).unwrap();

    assert_eq!(output.sample_rate(), 30000);
    assert_eq!(output.samples(), input.samples());
    assert!((output.duration_secs() - 0.8).abs() < 1e-9);
}

#[test]
fn test_pitch_after_speed_truncates() {
    let input = sine(440.0, 0.1, 24000, 8000.0);
    let profile = VoiceProfile::default()
        .with(VoiceParam::Speed, 0.9)
        .with(VoiceParam::Pitch, 1.0);
    let output = apply_voice_profile(&input, &profile).unwrap();

    let after_speed = (24000.0_f64 * 0.9) as u32;
    let expected = (after_speed as f64 * 2f64.powf(1.0 / 12.0)) as u32;
    assert_eq!(output.sample_rate(), expected);
}

#[test]
fn test_low_pass_attenuates_high_frequency() {
    let input = sine(8000.0, 0.2, 24000, 10000.0);
    let output = low_pass_filter(&input, 300.0).unwrap();

    assert_eq!(output.samples()[0], input.samples()[0]);
    assert!(peak(&output) < peak(&input) / 4);
}

#[test]
fn test_high_pass_attenuates_low_frequency() {
    let input = sine(50.0, 0.5, 24000, 10000.0);
    let output = high_pass_filter(&input, 1000.0).unwrap();

    assert!(peak(&output) < peak(&input) / 4);
}

#[test]
fn test_zero_cutoff_means_no_filter() {
    let input = sine(8000.0, 0.1, 24000, 10000.0);
    let profile = VoiceProfile::default()
        .with(VoiceParam::LowPass, 0.0)
        .with(VoiceParam::HighPass, 0.0);

    assert_eq!(apply_voice_profile(&input, &profile).unwrap(), input);
}

#[test]
fn test_gain_clips_at_ceiling() {
    let input = AudioBuffer::new(vec![20000, -20000, 100], 8000, 1).unwrap();
    let output = apply_gain(&input, 6.0).unwrap();

    assert_eq!(output.samples()[0], i16::MAX);
    assert_eq!(output.samples()[1], i16::MIN);
    assert_eq!(output.samples()[2], 199);
}

#[test]
fn test_overlay_saturates() {
    let base = AudioBuffer::new(vec![30000, -30000, 10], 8000, 1).unwrap();
    let top = AudioBuffer::new(vec![10000, -10000, 5], 8000, 1).unwrap();
    let mixed = overlay(&base, &top).unwrap();

    assert_eq!(mixed.samples(), &[i16::MAX, i16::MIN, 15]);
}

#[test]
fn test_bass_boost_raises_low_frequencies() {
    let input = sine(60.0, 0.5, 24000, 4000.0);
    let profile = VoiceProfile::default().with(VoiceParam::BassBoost, 6.0);
    let output = apply_voice_profile(&input, &profile).unwrap();

    assert_eq!(output.frame_count(), input.frame_count());
    assert!(peak(&output) > peak(&input));
}

#[test]
fn test_effects_are_deterministic() {
    let input = sine(330.0, 0.3, 24000, 9000.0);
    let profile = VoiceProfile {
        pitch: -2.0,
        speed: 1.1,
        low_pass: Some(3000.0),
        high_pass: Some(100.0),
        bass_boost: 4.0,
        formant_shift: 1.5,
    };

    let first = apply_voice_profile(&input, &profile).unwrap();
    let second = apply_voice_profile(&input, &profile).unwrap();
    assert_eq!(first, second);
}
