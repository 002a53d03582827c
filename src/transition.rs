//! Next/previous target selection over a [`PlaylistCursor`].
//!
//! These functions only decide where to go. Loading the target (always with autoplay
//! intent) is the session's job.

use crate::cursor::PlaylistCursor;
use crate::model::LoopMode;

/// Past this many seconds into a track, "previous" restarts it instead of moving back.
pub const RESTART_THRESHOLD_SECS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Load the track at this playlist index and continue playing.
    Load(usize),
    /// Seek the current track back to 0.
    Restart,
    /// Boundary reached without looping: stop, keep the current track.
    Stop,
    /// Nothing to navigate over.
    Empty,
}

/// Target for "next" and for a natural end of track. Never returns [`Step::Restart`].
///
/// A shuffled pass that runs off the end under [`LoopMode::All`] draws a fresh
/// permutation and continues from its head.
pub fn compute_next(cursor: &mut PlaylistCursor, loop_mode: LoopMode) -> Step {
    if cursor.is_empty() {
        return Step::Empty;
    }

    if cursor.shuffle_enabled() {
        let position = cursor
            .current_index()
            .and_then(|current| cursor.shuffle_position(current));
        let candidate = match position {
            Some(pos) => pos + 1,
            None => 0,
        };
        if let Some(target) = cursor.shuffle_order().and_then(|order| order.get(candidate)) {
            return Step::Load(*target);
        }
        if loop_mode != LoopMode::All {
            return Step::Stop;
        }
        cursor.reshuffle();
        return cursor
            .shuffle_order()
            .and_then(|order| order.first())
            .map_or(Step::Stop, |target| Step::Load(*target));
    }

    let target = cursor.current_index().map_or(0, |current| current + 1);
    if target < cursor.len() {
        Step::Load(target)
    } else if loop_mode == LoopMode::All {
        Step::Load(0)
    } else {
        Step::Stop
    }
}

/// Target for "previous". Never returns [`Step::Stop`]: a non-looping boundary
/// degrades to restarting the current track.
pub fn compute_previous(cursor: &PlaylistCursor, loop_mode: LoopMode, current_time: f64) -> Step {
    if cursor.is_empty() {
        return Step::Empty;
    }

    let Some(current) = cursor.current_index() else {
        let first = cursor
            .shuffle_order()
            .and_then(|order| order.first().copied())
            .unwrap_or(0);
        return Step::Load(first);
    };

    if current_time > RESTART_THRESHOLD_SECS {
        return Step::Restart;
    }

    if let Some(order) = cursor.shuffle_order() {
        return match cursor.shuffle_position(current) {
            Some(pos) if pos > 0 => Step::Load(order[pos - 1]),
            _ if loop_mode == LoopMode::All => order.last().map_or(Step::Restart, |t| Step::Load(*t)),
            _ => Step::Restart,
        };
    }

    if current > 0 {
        Step::Load(current - 1)
    } else if loop_mode == LoopMode::All {
        Step::Load(cursor.len() - 1)
    } else {
        Step::Restart
    }
}
