use super::{AudioBackend, AudioResource, EventSink};
use crate::error::{PlaybackError, Result};
use crate::lifecycle::ResourceEvent;
use crate::model::Track;
use anyhow::Context;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

type TrackDecoder = Decoder<BufReader<File>>;

struct Decoded {
    source: TrackDecoder,
    duration: Option<Duration>,
}

/// Plays file sources on the default output device.
pub struct RodioBackend {
    stream: OutputStream,
}

impl RodioBackend {
    pub fn new() -> anyhow::Result<Self> {
        let mut stream = with_silenced_stderr(|| {
            OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")?
                .with_error_callback(|err| log::warn!("output stream error: {err}"))
                .open_stream_or_fallback()
                .context("failed to start default output stream")
        })?;
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, track: &Track, events: EventSink) -> Result<Box<dyn AudioResource>> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        Ok(Box::new(RodioResource {
            sink,
            path: PathBuf::from(&track.source),
            events,
            pending: None,
            pending_seek: None,
            ready: false,
            started: false,
            repeat: false,
        }))
    }

    fn name(&self) -> String {
        String::from("System default output")
    }
}

struct RodioResource {
    sink: Sink,
    path: PathBuf,
    events: EventSink,
    pending: Option<Receiver<std::result::Result<Decoded, String>>>,
    /// Seek requested while the decoder was still loading.
    pending_seek: Option<f64>,
    ready: bool,
    started: bool,
    repeat: bool,
}

impl RodioResource {
    fn poll_loader(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };

        let outcome = match pending.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(String::from("decoder thread exited")),
        };
        self.pending = None;

        match outcome {
            Ok(decoded) => {
                self.sink.append(decoded.source);
                self.ready = true;
                if let Some(position) = self.pending_seek.take() {
                    self.seek_sink(position);
                }
                if let Some(duration) = decoded.duration {
                    self.events.emit(ResourceEvent::Metadata {
                        duration: duration.as_secs_f64(),
                    });
                }
                self.events.emit(ResourceEvent::CanPlayThrough);
            }
            Err(reason) => {
                self.events.emit(ResourceEvent::Failed { reason });
            }
        }
    }

    fn seek_sink(&self, position: f64) {
        let Ok(target) = Duration::try_from_secs_f64(position.max(0.0)) else {
            log::warn!("ignoring seek to {position} on {}", self.path.display());
            return;
        };
        if let Err(err) = self.sink.try_seek(target) {
            log::warn!("seek failed on {}: {err:?}", self.path.display());
        }
    }

    fn rewind_for_repeat(&mut self) {
        match decode(&self.path) {
            Ok(decoded) => self.sink.append(decoded.source),
            Err(reason) => {
                self.started = false;
                self.events.emit(ResourceEvent::Failed { reason });
            }
        }
    }
}

impl AudioResource for RodioResource {
    fn load(&mut self) {
        let (tx, rx) = mpsc::channel();
        let path = self.path.clone();
        thread::spawn(move || {
            let _ = tx.send(decode(&path));
        });
        self.pending = Some(rx);
    }

    fn start(&mut self) -> Result<()> {
        if !self.ready {
            return Err(PlaybackError::PlayRejected(String::from(
                "resource is not ready",
            )));
        }
        self.sink.play();
        self.started = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position: f64) {
        if !self.ready {
            self.pending_seek = Some(position);
            return;
        }
        if self.sink.empty() {
            self.rewind_for_repeat();
        }
        self.seek_sink(position);
    }

    fn set_volume(&mut self, level: f32) {
        self.sink.set_volume(level);
    }

    fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    fn tick(&mut self) {
        self.poll_loader();
        if !self.started || self.sink.is_paused() {
            return;
        }

        if !self.sink.empty() {
            self.events.emit(ResourceEvent::Progress {
                position: self.sink.get_pos().as_secs_f64(),
            });
            return;
        }

        if self.repeat {
            self.rewind_for_repeat();
            return;
        }

        self.started = false;
        self.sink.pause();
        self.events.emit(ResourceEvent::Ended);
    }

    fn stop(&mut self) {
        self.pending = None;
        self.pending_seek = None;
        self.sink.stop();
    }
}

fn decode(path: &Path) -> std::result::Result<Decoded, String> {
    let file = File::open(path).map_err(|err| format!("failed to open {}: {err}", path.display()))?;
    let source = Decoder::try_from(file)
        .map_err(|err| format!("failed to decode {}: {err}", path.display()))?;
    let duration = source.total_duration().filter(|duration| !duration.is_zero());
    Ok(Decoded { source, duration })
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Generation;
    use tempfile::tempdir;

    fn detached_resource() -> (RodioResource, mpsc::Receiver<crate::audio::ResourceMessage>) {
        let (sink, _queue) = Sink::new();
        let (tx, rx) = mpsc::channel();
        let resource = RodioResource {
            sink,
            path: PathBuf::from("missing.ogg"),
            events: EventSink::new(Generation(1), tx),
            pending: None,
            pending_seek: None,
            ready: false,
            started: false,
            repeat: false,
        };
        (resource, rx)
    }

    #[test]
    fn seek_while_loading_is_kept_for_later() {
        let (mut resource, _rx) = detached_resource();
        resource.seek(12.5);
        assert_eq!(resource.pending_seek, Some(12.5));
        resource.seek(4.0);
        assert_eq!(resource.pending_seek, Some(4.0));

        resource.stop();
        assert_eq!(resource.pending_seek, None);
    }

    #[test]
    fn loader_failure_is_reported_once() {
        let (mut resource, rx) = detached_resource();
        let (tx, loader) = mpsc::channel();
        tx.send(Err(String::from("failed to open missing.ogg"))).expect("send");
        resource.pending = Some(loader);

        resource.tick();
        resource.tick();
        let events: Vec<_> = rx.try_iter().map(|message| message.event).collect();
        assert_eq!(
            events,
            vec![ResourceEvent::Failed {
                reason: String::from("failed to open missing.ogg"),
            }]
        );
        assert!(!resource.ready);
    }

    #[test]
    fn decoding_missing_file_fails_with_path() {
        let Err(reason) = decode(Path::new("definitely-missing.flac")) else {
            panic!("missing file must not decode");
        };
        assert!(reason.contains("definitely-missing.flac"));
    }

    #[test]
    fn decoding_garbage_fails() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"not audio at all").expect("write fixture");
        assert!(decode(&path).is_err());
    }
}
