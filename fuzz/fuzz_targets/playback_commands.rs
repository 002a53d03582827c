#![no_main]

use libfuzzer_sys::fuzz_target;
use lull::PlaybackSession;
use lull::audio::NullAudioBackend;
use lull::cursor::PlaylistCursor;
use lull::lifecycle::ResourceEvent;
use lull::model::Track;

fuzz_target!(|data: &[u8]| {
    let backend = NullAudioBackend::new();
    let probe = backend.probe();
    probe.set_auto_ready(data.first().is_some_and(|byte| byte % 2 == 0));
    let seed = data.iter().fold(0_u64, |acc, byte| acc.rotate_left(5) ^ u64::from(*byte));
    let mut session =
        PlaybackSession::with_cursor(Box::new(backend), PlaylistCursor::with_seed(seed));

    let len = (data.len() % 32).max(1);
    session.set_playlist(
        (0..len)
            .map(|idx| Track::new(format!("t{idx}"), format!("track {idx}"), format!("{idx}.mp3")))
            .collect(),
    );

    for byte in data {
        match byte % 12 {
            0 => {
                let _ = session.play();
            }
            1 => session.pause(),
            2 => {
                let _ = session.next();
            }
            3 => {
                let _ = session.previous();
            }
            4 => {
                let _ = session.seek(f64::from(*byte));
            }
            5 => session.set_volume(f32::from(*byte) / 128.0),
            6 => {
                session.cycle_loop_mode();
            }
            7 => session.toggle_shuffle(),
            8 => {
                let _ = session.load_index(usize::from(*byte) % (len + 1), true);
            }
            9 => {
                if let Some(generation) = session.generation() {
                    probe.emit(generation, ResourceEvent::CanPlayThrough);
                }
            }
            10 => {
                if let Some(generation) = session.generation() {
                    probe.emit(generation, ResourceEvent::Ended);
                }
            }
            _ => session.close(),
        }
        session.pump();
        assert!(probe.live_resources() <= 1);
    }
});
