//! End-to-end behaviour of the speaker subsystem against a mock sink

use std::sync::Arc;

use a2speaker::config::CYCLE_SCALE;
use a2speaker::{
    AudioSink, PlaybackState, Result, SampleFormat, Speaker, SpeakerConfig, SpeakerSettings,
};
use approx::assert_relative_eq;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct SinkLog {
    received: Vec<f32>,
    enqueue_calls: usize,
}

/// Sink that records everything it is offered
struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl AudioSink for RecordingSink {
    fn open(&mut self, _sample_rate: u32, _channels: u16, _format: SampleFormat) -> Result<()> {
        Ok(())
    }

    fn enqueue(&mut self, samples: &[f32]) -> Result<usize> {
        let mut log = self.log.lock();
        log.enqueue_calls += 1;
        log.received.extend_from_slice(samples);
        Ok(samples.len())
    }

    fn queued_depth(&self) -> usize {
        0
    }

    fn flush(&mut self) {}

    fn close(&mut self) {}
}

fn small_config() -> SpeakerConfig {
    SpeakerConfig {
        sample_rate: 44_100,
        block_size: 8,
        ring_buffer_size: 64,
        cycles_per_sample: 10 * CYCLE_SCALE,
    }
}

fn speaker_with_log() -> (Speaker, Arc<Mutex<SinkLog>>) {
    let log = Arc::new(Mutex::new(SinkLog::default()));
    let mut speaker = Speaker::new(small_config());
    speaker
        .initialize(Box::new(RecordingSink {
            log: Arc::clone(&log),
        }))
        .expect("initialize should succeed");
    (speaker, log)
}

#[test]
fn square_wave_reaches_the_sink_in_order() {
    let (mut speaker, log) = speaker_with_log();
    speaker.begin_play();
    let primed = log.lock().received.len();
    assert_eq!(primed, 24, "three blocks of priming silence");

    // One toggle per ten-cycle window: a full-scale square wave at half
    // the output rate
    for i in 0..160 {
        speaker.on_cycle(i % 10 == 0);
    }
    speaker.pump();

    let log = log.lock();
    let live = &log.received[primed..];
    assert_eq!(live.len(), 16);
    for (i, &sample) in live.iter().enumerate() {
        let expected = if i % 2 == 0 { 1.0 } else { -1.0 };
        assert_relative_eq!(sample, expected, max_relative = 1e-6);
    }
}

#[test]
fn disabled_speaker_makes_no_sink_calls() {
    let (mut speaker, log) = speaker_with_log();
    speaker.disable();
    speaker.begin_play();

    for i in 0..10_000 {
        speaker.on_cycle(i % 4 == 0);
    }
    speaker.pump();
    speaker.pump();

    assert_eq!(log.lock().enqueue_calls, 0);
    assert!(speaker.is_playing(), "mute does not change the lifecycle");
    assert_eq!(speaker.state(), PlaybackState::Playing);
}

#[test]
fn flooding_never_grows_past_the_high_water_mark() {
    let (mut speaker, _log) = speaker_with_log();
    speaker.begin_play();

    // Far more cycles than the ring can represent, with no pump at all
    for i in 0..200_000 {
        speaker.on_cycle(i % 6 == 0);
        let occupancy = speaker.stats().buffer_occupancy;
        debug_assert!(occupancy <= 16, "occupancy {occupancy} past high water");
    }

    let stats = speaker.stats();
    assert!(stats.buffer_occupancy <= 16);
    assert!(stats.samples_dropped > 0, "overflow must engage the drop policy");
}

#[test]
fn settings_survive_an_external_json_round_trip() {
    let (mut speaker, _log) = speaker_with_log();
    speaker.disable();

    // The surrounding application owns the encoding; the crate only fills
    // and consumes the flat record
    let encoded = serde_json::to_string(&speaker.settings()).expect("settings should encode");
    let decoded: SpeakerSettings =
        serde_json::from_str(&encoded).expect("settings should decode");

    let mut fresh = Speaker::new(small_config());
    fresh.apply_settings(decoded);

    assert_eq!(fresh.settings().enabled, speaker.settings().enabled);
    assert_eq!(
        fresh.settings().cycles_per_sample,
        speaker.settings().cycles_per_sample
    );
}

#[test]
fn partial_settings_record_defaults_the_missing_fields() {
    let decoded: SpeakerSettings =
        serde_json::from_str("{\"cycles_per_sample\": 98000}").expect("partial record decodes");
    assert!(decoded.enabled, "missing field falls back to its default");

    let mut speaker = Speaker::new(small_config());
    speaker.apply_settings(decoded);
    // 98_000 sits inside the small config's clamp band around 100_000
    assert_eq!(speaker.settings().cycles_per_sample, 98_000);
}

#[test]
fn stop_and_resume_keep_the_stream_well_formed() {
    let (mut speaker, log) = speaker_with_log();
    speaker.begin_play();

    for i in 0..80 {
        speaker.on_cycle(i % 10 == 0);
    }
    speaker.pump();
    speaker.stop_play();

    // Synthesis keeps running while stopped; the pump discards it
    for i in 0..80 {
        speaker.on_cycle(i % 10 == 0);
    }
    speaker.pump();
    let during_stop = log.lock().received.len();

    speaker.begin_play();
    for i in 0..80 {
        speaker.on_cycle(i % 10 == 0);
    }
    speaker.pump();

    let log = log.lock();
    assert!(log.received.len() > during_stop, "resume forwards again");
    assert!(log.received.iter().all(|&s| (-1.0..=1.0).contains(&s)));
}
