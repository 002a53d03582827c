use super::{AudioBackend, AudioResource, EventSink, Generation};
use crate::error::{PlaybackError, Result};
use crate::lifecycle::ResourceEvent;
use crate::model::Track;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

/// Deviceless backend. Keeps a logical clock so a session driven by `tick()` still
/// progresses and finishes tracks whose duration is known up front.
///
/// Everything it does is observable, and partly scriptable, through a [`NullProbe`].
#[derive(Debug, Default)]
pub struct NullAudioBackend {
    probe: NullProbe,
}

impl NullAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> NullProbe {
        self.probe.clone()
    }
}

impl AudioBackend for NullAudioBackend {
    fn open(&mut self, track: &Track, events: EventSink) -> Result<Box<dyn AudioResource>> {
        {
            let mut state = self.probe.0.borrow_mut();
            state.live += 1;
            state.opened.push(OpenedResource {
                generation: events.generation(),
                source: track.source.clone(),
                sink: events.clone(),
            });
        }

        Ok(Box::new(NullResource {
            probe: self.probe.clone(),
            events,
            source: track.source.clone(),
            known_duration: track.duration.filter(|duration| *duration > 0.0),
            started_at: None,
            position_offset: 0.0,
            paused: true,
            repeat: false,
        }))
    }

    fn name(&self) -> String {
        String::from("Null audio backend")
    }
}

#[derive(Debug, Clone)]
pub struct OpenedResource {
    pub generation: Generation,
    pub source: String,
    sink: EventSink,
}

#[derive(Debug)]
struct ProbeState {
    live: usize,
    opened: Vec<OpenedResource>,
    auto_ready: bool,
    reject_play: bool,
    failing_sources: HashSet<String>,
    volume: Option<f32>,
    repeat: bool,
    playing: bool,
    last_seek: Option<f64>,
    starts: usize,
}

impl Default for ProbeState {
    fn default() -> Self {
        Self {
            live: 0,
            opened: Vec::new(),
            auto_ready: true,
            reject_play: false,
            failing_sources: HashSet::new(),
            volume: None,
            repeat: false,
            playing: false,
            last_seek: None,
            starts: 0,
        }
    }
}

/// Shared view into a [`NullAudioBackend`].
#[derive(Debug, Clone, Default)]
pub struct NullProbe(Rc<RefCell<ProbeState>>);

impl NullProbe {
    /// Resources opened and not yet dropped.
    pub fn live_resources(&self) -> usize {
        self.0.borrow().live
    }

    pub fn opened(&self) -> Vec<OpenedResource> {
        self.0.borrow().opened.clone()
    }

    /// Delivers `event` as if the resource opened for `generation` produced it.
    /// Returns `false` when that resource has been retired.
    pub fn emit(&self, generation: Generation, event: ResourceEvent) -> bool {
        let sink = self
            .0
            .borrow()
            .opened
            .iter()
            .find(|opened| opened.generation == generation)
            .map(|opened| opened.sink.clone());
        sink.is_some_and(|sink| sink.emit(event))
    }

    /// When off, resources stay loading until events are emitted through the probe.
    pub fn set_auto_ready(&self, auto_ready: bool) {
        self.0.borrow_mut().auto_ready = auto_ready;
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.0.borrow_mut().reject_play = reject;
    }

    pub fn fail_source(&self, source: impl Into<String>) {
        self.0.borrow_mut().failing_sources.insert(source.into());
    }

    pub fn volume(&self) -> Option<f32> {
        self.0.borrow().volume
    }

    pub fn repeat(&self) -> bool {
        self.0.borrow().repeat
    }

    pub fn playing(&self) -> bool {
        self.0.borrow().playing
    }

    pub fn last_seek(&self) -> Option<f64> {
        self.0.borrow().last_seek
    }

    pub fn starts(&self) -> usize {
        self.0.borrow().starts
    }
}

struct NullResource {
    probe: NullProbe,
    events: EventSink,
    source: String,
    known_duration: Option<f64>,
    started_at: Option<Instant>,
    position_offset: f64,
    paused: bool,
    repeat: bool,
}

impl NullResource {
    fn current_position(&self) -> f64 {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position += started_at.elapsed().as_secs_f64();
        }
        match self.known_duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn set_probe_playing(&self, playing: bool) {
        self.probe.0.borrow_mut().playing = playing;
    }
}

impl AudioResource for NullResource {
    fn load(&mut self) {
        let (failing, auto_ready) = {
            let state = self.probe.0.borrow();
            (state.failing_sources.contains(&self.source), state.auto_ready)
        };

        if failing {
            self.events.emit(ResourceEvent::Failed {
                reason: format!("source unavailable: {}", self.source),
            });
            return;
        }
        if !auto_ready {
            return;
        }
        if let Some(duration) = self.known_duration {
            self.events.emit(ResourceEvent::Metadata { duration });
        }
        self.events.emit(ResourceEvent::CanPlayThrough);
    }

    fn start(&mut self) -> Result<()> {
        if self.probe.0.borrow().reject_play {
            return Err(PlaybackError::PlayRejected(String::from(
                "host refused to start audio",
            )));
        }
        if self.paused {
            self.started_at = Some(Instant::now());
            self.paused = false;
        }
        let mut state = self.probe.0.borrow_mut();
        state.playing = true;
        state.starts += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
        self.set_probe_playing(false);
    }

    fn seek(&mut self, position: f64) {
        self.position_offset = position;
        self.started_at = (!self.paused).then(Instant::now);
        self.probe.0.borrow_mut().last_seek = Some(position);
    }

    fn set_volume(&mut self, level: f32) {
        self.probe.0.borrow_mut().volume = Some(level);
    }

    fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
        self.probe.0.borrow_mut().repeat = repeat;
    }

    fn tick(&mut self) {
        if self.paused {
            return;
        }

        let position = self.current_position();
        let Some(duration) = self.known_duration.filter(|duration| position >= *duration) else {
            self.events.emit(ResourceEvent::Progress { position });
            return;
        };

        if self.repeat {
            self.position_offset = 0.0;
            self.started_at = Some(Instant::now());
            self.events.emit(ResourceEvent::Progress { position: 0.0 });
            return;
        }

        self.position_offset = duration;
        self.started_at = None;
        self.paused = true;
        self.set_probe_playing(false);
        self.events.emit(ResourceEvent::Progress { position: duration });
        self.events.emit(ResourceEvent::Ended);
    }

    fn stop(&mut self) {
        self.started_at = None;
        self.paused = true;
        self.set_probe_playing(false);
    }
}

impl Drop for NullResource {
    fn drop(&mut self) {
        let mut state = self.probe.0.borrow_mut();
        state.live = state.live.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ResourceMessage;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn open(
        backend: &mut NullAudioBackend,
        track: Track,
    ) -> (Box<dyn AudioResource>, mpsc::Receiver<ResourceMessage>) {
        let (tx, rx) = mpsc::channel();
        let resource = backend
            .open(&track, EventSink::new(Generation(1), tx))
            .expect("open");
        (resource, rx)
    }

    #[test]
    fn load_reports_metadata_then_ready() {
        let mut backend = NullAudioBackend::new();
        let (mut resource, rx) = open(&mut backend, Track::new("a", "a", "a.mp3").with_duration(12.0));
        assert!(rx.try_recv().is_err(), "nothing before load");

        resource.load();
        let events: Vec<_> = rx.try_iter().map(|message| message.event).collect();
        assert_eq!(
            events,
            vec![
                ResourceEvent::Metadata { duration: 12.0 },
                ResourceEvent::CanPlayThrough
            ]
        );
    }

    #[test]
    fn failing_source_reports_failure() {
        let mut backend = NullAudioBackend::new();
        backend.probe().fail_source("broken.mp3");
        let (mut resource, rx) = open(&mut backend, Track::new("a", "a", "broken.mp3"));
        resource.load();
        assert!(matches!(
            rx.try_recv().map(|message| message.event),
            Ok(ResourceEvent::Failed { .. })
        ));
    }

    #[test]
    fn live_count_follows_drop() {
        let mut backend = NullAudioBackend::new();
        let probe = backend.probe();
        let (resource, _rx) = open(&mut backend, Track::new("a", "a", "a.mp3"));
        assert_eq!(probe.live_resources(), 1);
        drop(resource);
        assert_eq!(probe.live_resources(), 0);
    }

    #[test]
    fn clock_advances_only_while_started() {
        let mut backend = NullAudioBackend::new();
        let (mut resource, rx) = open(&mut backend, Track::new("a", "a", "a.mp3"));
        resource.tick();
        assert!(rx.try_recv().is_err(), "paused resources stay quiet");

        resource.start().expect("start");
        thread::sleep(Duration::from_millis(20));
        resource.tick();
        let Ok(ResourceEvent::Progress { position }) = rx.try_recv().map(|message| message.event) else {
            panic!("expected progress");
        };
        assert!(position > 0.0);
    }

    #[test]
    fn known_duration_finishes() {
        let mut backend = NullAudioBackend::new();
        let (mut resource, rx) = open(&mut backend, Track::new("a", "a", "a.mp3").with_duration(0.01));
        resource.start().expect("start");
        thread::sleep(Duration::from_millis(30));
        resource.tick();
        let events: Vec<_> = rx.try_iter().map(|message| message.event).collect();
        assert_eq!(events.last(), Some(&ResourceEvent::Ended));
    }

    #[test]
    fn repeat_rewinds_instead_of_ending() {
        let mut backend = NullAudioBackend::new();
        let (mut resource, rx) = open(&mut backend, Track::new("a", "a", "a.mp3").with_duration(0.01));
        resource.set_repeat(true);
        resource.start().expect("start");
        thread::sleep(Duration::from_millis(30));
        resource.tick();
        let events: Vec<_> = rx.try_iter().map(|message| message.event).collect();
        assert_eq!(events, vec![ResourceEvent::Progress { position: 0.0 }]);
    }

    #[test]
    fn rejected_start_reports_error() {
        let mut backend = NullAudioBackend::new();
        backend.probe().set_reject_play(true);
        let (mut resource, _rx) = open(&mut backend, Track::new("a", "a", "a.mp3"));
        assert!(matches!(resource.start(), Err(PlaybackError::PlayRejected(_))));
        assert!(!backend.probe().playing());
    }
}
