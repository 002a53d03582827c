use thiserror::Error;

/// Failures surfaced by the playback session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// The resource for a track could not be fetched or decoded. Terminal for that load.
    #[error("track {track_id} could not be played: {reason}")]
    LoadFailed { track_id: String, reason: String },

    /// The backend refused to start playback. The resource stays loaded.
    #[error("playback could not start: {0}")]
    PlayRejected(String),

    #[error("track not found: {0}")]
    TrackNotFound(String),

    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    #[error("no track loaded")]
    NoTrackLoaded,
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
