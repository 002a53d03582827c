//! Playlist playback engine: one session, one live audio resource at a time,
//! transport controls, and sequential/shuffled/looped navigation.

pub mod app;
pub mod audio;
pub mod config;
pub mod cursor;
pub mod error;
pub mod library;
pub mod lifecycle;
pub mod model;
pub mod session;
pub mod transition;
pub mod ui;

pub use error::{PlaybackError, Result};
pub use session::{PlaybackSession, SessionEvent, SessionSnapshot};
