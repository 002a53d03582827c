//! The seam between the session and whatever actually decodes and plays audio.
//!
//! A backend opens one [`AudioResource`] per load. Resources never call into the
//! session; they report through the [`EventSink`] they were opened with, and the
//! session drains those reports on its own thread.

mod device;
mod null;

pub use self::device::RodioBackend;
pub use self::null::{NullAudioBackend, NullProbe, OpenedResource};

use crate::error::Result;
use crate::lifecycle::ResourceEvent;
use crate::model::Track;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

/// Identifies one load. Strictly increasing over a session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMessage {
    pub generation: Generation,
    pub event: ResourceEvent,
}

/// Generation-stamped event channel handed to a resource.
///
/// Once detached, nothing emitted through any clone reaches the session.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: Sender<ResourceMessage>,
    attached: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(generation: Generation, tx: Sender<ResourceMessage>) -> Self {
        Self {
            generation,
            tx,
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns `false` when the event was swallowed because the sink is detached
    /// or the session is gone.
    pub fn emit(&self, event: ResourceEvent) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.tx
            .send(ResourceMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

pub trait AudioBackend {
    /// Creates a resource bound to `track`'s source. It must not start fetching
    /// until [`AudioResource::load`] is called.
    fn open(&mut self, track: &Track, events: EventSink) -> Result<Box<dyn AudioResource>>;
    fn name(&self) -> String;
}

pub trait AudioResource {
    fn load(&mut self);
    /// Attempt to start or resume. The backend may refuse.
    fn start(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_volume(&mut self, level: f32);
    /// Native single-track repeat.
    fn set_repeat(&mut self, repeat: bool);
    /// Lets polling backends report progress and completion.
    fn tick(&mut self) {}
    fn stop(&mut self);
}
