//! Plays two seconds of a 440 Hz square wave through the default audio
//! device, driving the speaker exactly the way an emulated bus would:
//! one call per machine cycle, with a toggle every half period.
//!
//! Run with: `cargo run --example speaker_demo --features streaming`

use std::time::Duration;

use a2speaker::{streaming::RodioSink, Speaker, SpeakerConfig};

/// NTSC Apple II bus clock in Hz
const BUS_HZ: u32 = 1_020_484;

/// Emulated cycles per 60 Hz host frame
const FRAME_CYCLES: u32 = BUS_HZ / 60;

fn main() -> a2speaker::Result<()> {
    let mut speaker = Speaker::new(SpeakerConfig::default());
    speaker.initialize(Box::new(RodioSink::new()))?;
    speaker.begin_play();

    // 440 Hz square wave: toggle every half period of the bus clock
    let cycles_per_toggle = BUS_HZ / (2 * 440);
    let mut until_toggle = cycles_per_toggle;

    for _frame in 0..120 {
        for _ in 0..FRAME_CYCLES {
            until_toggle -= 1;
            let toggle = until_toggle == 0;
            if toggle {
                until_toggle = cycles_per_toggle;
            }
            speaker.on_cycle(toggle);
        }
        speaker.pump();
        std::thread::sleep(Duration::from_millis(16));
    }

    speaker.stop_play();
    let stats = speaker.stats();
    println!(
        "done: {} samples enqueued, {} dropped",
        stats.samples_enqueued, stats.samples_dropped
    );
    Ok(())
}
