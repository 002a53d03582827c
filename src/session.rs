use crate::audio::{AudioBackend, AudioResource, EventSink, Generation, ResourceMessage};
use crate::cursor::PlaylistCursor;
use crate::error::{PlaybackError, Result};
use crate::lifecycle::{self, ResourceEvent, ResourceState};
use crate::model::{LoopMode, Settings, Track};
use crate::transition::{self, Step};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};

/// Change notifications for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    PlaylistChanged { len: usize },
    TrackChanged { index: usize, track_id: String },
    StateChanged { playing: bool, loading: bool },
    Position { current_time: f64, duration: f64 },
    VolumeChanged { volume: f32, muted: bool },
    LoopModeChanged { loop_mode: LoopMode },
    ShuffleChanged { enabled: bool },
    /// Reached the end of the list without looping.
    EndOfPlaylist,
    Error { message: String },
    Closed,
}

/// Read model for a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    pub playing: bool,
    pub loading: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub effective_volume: f32,
    pub loop_mode: LoopMode,
    pub shuffle: bool,
    pub last_error: Option<String>,
}

struct LiveResource {
    generation: Generation,
    handle: Box<dyn AudioResource>,
    events: EventSink,
    state: ResourceState,
}

/// One playback session: a playlist cursor, transport state, and at most one live
/// audio resource.
///
/// Nothing here blocks. Resource events are queued by the backend and applied when
/// the host calls [`PlaybackSession::pump`] or [`PlaybackSession::tick`].
pub struct PlaybackSession {
    backend: Box<dyn AudioBackend>,
    cursor: PlaylistCursor,
    resource: Option<LiveResource>,
    last_generation: u64,
    pending_autoplay: Option<Generation>,
    events_tx: Sender<ResourceMessage>,
    events_rx: Receiver<ResourceMessage>,
    subscribers: Vec<Sender<SessionEvent>>,
    playing: bool,
    loading: bool,
    current_time: f64,
    duration: f64,
    volume: f32,
    muted: bool,
    loop_mode: LoopMode,
    last_error: Option<PlaybackError>,
    pub dirty: bool,
}

impl PlaybackSession {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self::with_cursor(backend, PlaylistCursor::new())
    }

    pub fn with_cursor(backend: Box<dyn AudioBackend>, cursor: PlaylistCursor) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            backend,
            cursor,
            resource: None,
            last_generation: 0,
            pending_autoplay: None,
            events_tx,
            events_rx,
            subscribers: Vec::new(),
            playing: false,
            loading: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            loop_mode: LoopMode::None,
            last_error: None,
            dirty: true,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    /// Replaces the playlist. Playback continues if the current track is still in it;
    /// otherwise its resource is retired and the session goes idle.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        let had_current = self.cursor.current_index().is_some();
        if !self.cursor.set_playlist(tracks) && had_current {
            log::info!("current track left the playlist, going idle");
            self.retire();
            self.reset_transport();
            self.emit_state();
        }
        self.emit(SessionEvent::PlaylistChanged {
            len: self.cursor.len(),
        });
        self.emit(SessionEvent::ShuffleChanged { enabled: false });
    }

    pub fn playlist(&self) -> &[Track] {
        self.cursor.tracks()
    }

    pub fn index_of(&self, track_id: &str) -> Option<usize> {
        self.cursor.index_of(track_id)
    }

    /// Plays `track_id`, first replacing the playlist with `tracks` when given.
    pub fn play_track(&mut self, track_id: &str, tracks: Option<Vec<Track>>) -> Result<()> {
        if let Some(tracks) = tracks {
            self.set_playlist(tracks);
        }
        let index = self
            .cursor
            .index_of(track_id)
            .ok_or_else(|| PlaybackError::TrackNotFound(track_id.to_string()))?;
        self.load_index(index, true)
    }

    /// Makes the track at `index` current and starts loading it.
    pub fn load_index(&mut self, index: usize, autoplay: bool) -> Result<()> {
        if !self.cursor.set_current(index) {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.begin_load(autoplay)
    }

    pub fn enable_shuffle(&mut self) {
        self.cursor.enable_shuffle();
        self.emit(SessionEvent::ShuffleChanged { enabled: true });
    }

    pub fn disable_shuffle(&mut self) {
        self.cursor.disable_shuffle();
        self.emit(SessionEvent::ShuffleChanged { enabled: false });
    }

    pub fn toggle_shuffle(&mut self) {
        if self.cursor.shuffle_enabled() {
            self.disable_shuffle();
        } else {
            self.enable_shuffle();
        }
    }

    /// Advances per the loop mode and shuffle order. Loading the target always
    /// carries autoplay intent.
    pub fn next(&mut self) -> Result<Step> {
        let step = transition::compute_next(&mut self.cursor, self.loop_mode);
        self.apply_step(step)?;
        Ok(step)
    }

    /// Restarts the current track when more than three seconds in, otherwise moves back.
    pub fn previous(&mut self) -> Result<Step> {
        let step = transition::compute_previous(&self.cursor, self.loop_mode, self.current_time);
        self.apply_step(step)?;
        Ok(step)
    }

    fn apply_step(&mut self, step: Step) -> Result<()> {
        log::debug!("navigation step {step:?}");
        match step {
            Step::Load(index) => self.load_index(index, true),
            Step::Restart => self.restart(),
            Step::Stop => {
                self.stop_at_boundary();
                Ok(())
            }
            Step::Empty => {
                self.pending_autoplay = None;
                if self.playing {
                    self.playing = false;
                    self.emit_state();
                }
                Ok(())
            }
        }
    }

    fn stop_at_boundary(&mut self) {
        self.pending_autoplay = None;
        if let Some(live) = &mut self.resource {
            live.handle.pause();
        }
        self.playing = false;
        log::info!("end of playlist");
        self.emit(SessionEvent::EndOfPlaylist);
        self.emit_state();
    }

    pub fn play(&mut self) -> Result<()> {
        if self.cursor.current_track().is_none() || self.playing {
            return Ok(());
        }

        let Some(live) = &mut self.resource else {
            return self.begin_load(true);
        };

        match live.state {
            ResourceState::Loading => {
                self.pending_autoplay = Some(live.generation);
                Ok(())
            }
            ResourceState::Ended => {
                live.handle.seek(0.0);
                live.state = live.state.rewound();
                self.current_time = 0.0;
                self.start_live()
            }
            ResourceState::Ready => self.start_live(),
            ResourceState::Idle | ResourceState::Errored => self.begin_load(true),
        }
    }

    pub fn pause(&mut self) {
        self.pending_autoplay = None;
        if !self.playing {
            return;
        }
        if let Some(live) = &mut self.resource {
            live.handle.pause();
        }
        self.playing = false;
        self.emit_state();
    }

    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.playing || self.pending_autoplay.is_some() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Moves the playhead, clamped to `[0, duration]` once the duration is known.
    /// An infinite target is ignored until then.
    pub fn seek(&mut self, time: f64) -> Result<()> {
        let Some(live) = &mut self.resource else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        let mut target = if time.is_nan() { 0.0 } else { time.max(0.0) };
        if self.duration > 0.0 {
            target = target.min(self.duration);
        }
        if !target.is_finite() {
            log::debug!("ignoring seek to {time}: duration unknown");
            return Ok(());
        }
        live.handle.seek(target);
        live.state = live.state.rewound();
        self.current_time = target;
        self.emit_position();
        Ok(())
    }

    pub fn restart(&mut self) -> Result<()> {
        self.seek(0.0)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.apply_volume();
    }

    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn apply_volume(&mut self) {
        let level = self.effective_volume();
        if let Some(live) = &mut self.resource {
            live.handle.set_volume(level);
        }
        self.emit(SessionEvent::VolumeChanged {
            volume: self.volume,
            muted: self.muted,
        });
    }

    /// Advances `all -> one -> none -> all` and reconfigures native repeat on the
    /// current resource.
    pub fn cycle_loop_mode(&mut self) -> LoopMode {
        self.set_loop_mode(self.loop_mode.next());
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
        if let Some(live) = &mut self.resource {
            live.handle.set_repeat(loop_mode.repeats_track());
        }
        self.emit(SessionEvent::LoopModeChanged { loop_mode });
    }

    /// Retires the resource and returns to the idle baseline. Volume and mute are
    /// kept; loop mode and shuffle are reset.
    pub fn close(&mut self) {
        self.retire();
        self.cursor.reset();
        self.reset_transport();
        self.loop_mode = LoopMode::None;
        self.last_error = None;
        self.events_rx.try_iter().for_each(drop);
        log::info!("session closed");
        self.emit(SessionEvent::Closed);
    }

    pub fn settings(&self) -> Settings {
        Settings {
            volume: self.volume,
            muted: self.muted,
            loop_mode: self.loop_mode,
            shuffle: self.cursor.shuffle_enabled(),
        }
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.muted = settings.muted;
        self.set_volume(settings.volume);
        self.set_loop_mode(settings.loop_mode);
        if settings.shuffle != self.cursor.shuffle_enabled() {
            self.toggle_shuffle();
        }
    }

    fn begin_load(&mut self, autoplay: bool) -> Result<()> {
        let Some(track) = self.cursor.current_track().cloned() else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        self.retire();
        self.last_generation += 1;
        let generation = Generation(self.last_generation);
        let events = EventSink::new(generation, self.events_tx.clone());

        self.playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.last_error = None;
        self.pending_autoplay = None;
        if let Some(index) = self.cursor.current_index() {
            self.emit(SessionEvent::TrackChanged {
                index,
                track_id: track.id.clone(),
            });
        }

        let mut handle = match self.backend.open(&track, events.clone()) {
            Ok(handle) => handle,
            Err(err) => {
                let err = PlaybackError::LoadFailed {
                    track_id: track.id,
                    reason: err.to_string(),
                };
                self.loading = false;
                self.fail(err.clone());
                self.emit_state();
                return Err(err);
            }
        };

        handle.set_volume(self.effective_volume());
        handle.set_repeat(self.loop_mode.repeats_track());
        self.loading = true;
        self.pending_autoplay = autoplay.then_some(generation);
        log::info!("loading {} ({}) as {generation}", track.title, track.source);

        self.resource = Some(LiveResource {
            generation,
            handle,
            events,
            state: ResourceState::Loading,
        });
        self.emit_state();
        self.emit_position();

        if let Some(live) = &mut self.resource {
            live.handle.load();
        }
        Ok(())
    }

    /// Detaches the live resource's events, then stops and drops it.
    fn retire(&mut self) {
        if let Some(mut live) = self.resource.take() {
            live.events.detach();
            live.handle.stop();
            log::debug!("retired resource {}", live.generation);
        }
    }

    fn start_live(&mut self) -> Result<()> {
        let Some(live) = &mut self.resource else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        let outcome = live.handle.start();
        match outcome {
            Ok(()) => {
                self.playing = true;
                self.emit_state();
                Ok(())
            }
            Err(err) => {
                let err = match err {
                    PlaybackError::PlayRejected(_) => err,
                    other => PlaybackError::PlayRejected(other.to_string()),
                };
                self.playing = false;
                self.fail(err.clone());
                self.emit_state();
                Err(err)
            }
        }
    }

    /// Applies every queued resource event. Returns how many were received.
    pub fn pump(&mut self) -> usize {
        let mut received = 0;
        while let Ok(message) = self.events_rx.try_recv() {
            received += 1;
            self.handle_message(message);
        }
        received
    }

    /// Lets the live resource poll its backend, then applies what it reported.
    pub fn tick(&mut self) -> usize {
        if let Some(live) = &mut self.resource {
            live.handle.tick();
        }
        self.pump()
    }

    /// The single entry point for resource events. Events from any generation but
    /// the live one, and events the resource state does not allow, are dropped.
    pub fn handle_message(&mut self, message: ResourceMessage) {
        let ResourceMessage { generation, event } = message;
        let Some(live) = &mut self.resource else {
            log::debug!("dropping {event:?} from {generation}: no live resource");
            return;
        };
        if live.generation != generation {
            log::debug!("dropping stale {event:?} from {generation}, live is {}", live.generation);
            return;
        }
        let Some(next_state) = lifecycle::transition(live.state, &event) else {
            log::debug!("dropping {event:?} for {generation} in state {:?}", live.state);
            return;
        };
        live.state = next_state;

        match event {
            ResourceEvent::Metadata { duration } => {
                self.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
                self.current_time = self.current_time.min(self.duration);
                self.emit_position();
            }
            ResourceEvent::CanPlayThrough => {
                self.loading = false;
                if self.pending_autoplay == Some(generation) {
                    self.pending_autoplay = None;
                    if let Err(err) = self.start_live() {
                        log::warn!("autoplay failed: {err}");
                    }
                    return;
                }
                self.emit_state();
            }
            ResourceEvent::Progress { position } => {
                let mut position = position.max(0.0);
                if self.duration > 0.0 {
                    position = position.min(self.duration);
                }
                self.current_time = position;
                self.emit_position();
            }
            ResourceEvent::Ended => self.on_track_end(),
            ResourceEvent::Failed { reason } => {
                let track_id = self
                    .cursor
                    .current_track()
                    .map(|track| track.id.clone())
                    .unwrap_or_default();
                self.loading = false;
                self.playing = false;
                self.pending_autoplay = None;
                self.fail(PlaybackError::LoadFailed { track_id, reason });
                self.emit_state();
            }
        }
    }

    fn on_track_end(&mut self) {
        if self.loop_mode.repeats_track()
            && let Some(live) = &mut self.resource
        {
            log::debug!("restarting {} for single-track repeat", live.generation);
            live.handle.seek(0.0);
            live.state = live.state.rewound();
            self.current_time = 0.0;
            self.emit_position();
            if let Err(err) = self.start_live() {
                log::warn!("could not repeat track: {err}");
            }
            return;
        }

        self.playing = false;
        self.current_time = self.duration;
        log::debug!("track ended");
        if let Err(err) = self.next() {
            log::warn!("could not continue after track end: {err}");
        }
    }

    fn fail(&mut self, err: PlaybackError) {
        log::warn!("{err}");
        self.emit(SessionEvent::Error {
            message: err.to_string(),
        });
        self.last_error = Some(err);
    }

    fn reset_transport(&mut self) {
        self.playing = false;
        self.loading = false;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.pending_autoplay = None;
    }

    fn emit_state(&mut self) {
        self.emit(SessionEvent::StateChanged {
            playing: self.playing,
            loading: self.loading,
        });
    }

    fn emit_position(&mut self) {
        self.emit(SessionEvent::Position {
            current_time: self.current_time,
            duration: self.duration,
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.dirty = true;
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.cursor.current_track()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor.current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.cursor.shuffle_enabled()
    }

    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.cursor.shuffle_order()
    }

    pub fn autoplay_pending(&self) -> bool {
        self.pending_autoplay.is_some()
    }

    pub fn last_error(&self) -> Option<&PlaybackError> {
        self.last_error.as_ref()
    }

    /// Generation of the live resource, if any.
    pub fn generation(&self) -> Option<Generation> {
        self.resource.as_ref().map(|live| live.generation)
    }

    pub fn resource_state(&self) -> ResourceState {
        self.resource
            .as_ref()
            .map_or(ResourceState::Idle, |live| live.state)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_track: self.cursor.current_track().cloned(),
            current_index: self.cursor.current_index(),
            playing: self.playing,
            loading: self.loading,
            current_time: self.current_time,
            duration: self.duration,
            volume: self.volume,
            muted: self.muted,
            effective_volume: self.effective_volume(),
            loop_mode: self.loop_mode,
            shuffle: self.cursor.shuffle_enabled(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.retire();
    }
}
