use crate::model::Track;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

/// Ordered playlist plus the current position and an optional shuffle permutation.
#[derive(Debug)]
pub struct PlaylistCursor {
    tracks: Vec<Track>,
    current: Option<usize>,
    shuffle_order: Option<Vec<usize>>,
    rng: SmallRng,
}

impl Default for PlaylistCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaylistCursor {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic shuffles, for tests and fuzzing.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            shuffle_order: None,
            rng,
        }
    }

    /// Replaces the track list and drops any shuffle permutation.
    ///
    /// The current position follows the current track by id. Returns `false` when the
    /// current track is not part of the new list, in which case nothing is current anymore.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) -> bool {
        let current_id = self.current_track().map(|track| track.id.clone());
        self.tracks = tracks;
        self.shuffle_order = None;

        match current_id {
            Some(id) => {
                self.current = self.index_of(&id);
                self.current.is_some()
            }
            None => true,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == track_id)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    pub fn set_current(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.current = Some(index);
        true
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_order.is_some()
    }

    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.shuffle_order.as_deref()
    }

    /// Builds a fresh permutation with the current track moved to the front,
    /// so enabling shuffle never skips what is already playing.
    pub fn enable_shuffle(&mut self) {
        let mut order = self.permutation();
        if let Some(current) = self.current
            && let Some(pos) = order.iter().position(|idx| *idx == current)
        {
            order.swap(0, pos);
        }
        self.shuffle_order = Some(order);
    }

    pub fn disable_shuffle(&mut self) {
        self.shuffle_order = None;
    }

    /// Replaces the permutation with a new one, leaving its head wherever it falls.
    /// Used when a shuffled pass wraps around.
    pub fn reshuffle(&mut self) {
        if self.shuffle_order.is_some() {
            self.shuffle_order = Some(self.permutation());
        }
    }

    /// Position of `index` within the shuffle permutation.
    pub fn shuffle_position(&self, index: usize) -> Option<usize> {
        self.shuffle_order
            .as_ref()?
            .iter()
            .position(|candidate| *candidate == index)
    }

    /// Back to the idle baseline: nothing current and shuffle off. The list is kept.
    pub fn reset(&mut self) {
        self.current = None;
        self.shuffle_order = None;
    }

    fn permutation(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(&mut self.rng);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert_eq;

    fn tracks(count: usize) -> Vec<Track> {
        (0..count)
            .map(|n| Track::new(format!("t{n}"), format!("Track {n}"), format!("{n}.mp3")))
            .collect()
    }

    #[test]
    fn unseeded_cursor_shuffles_every_track() {
        let mut cursor = PlaylistCursor::new();
        cursor.set_playlist(tracks(8));
        cursor.enable_shuffle();
        let mut order = cursor.shuffle_order().expect("shuffle").to_vec();
        order.sort_unstable();
        assert_eq!(order, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn index_of_finds_track_by_id() {
        let mut cursor = PlaylistCursor::with_seed(1);
        cursor.set_playlist(tracks(3));
        assert_eq!(cursor.index_of("t2"), Some(2));
        assert_eq!(cursor.index_of("missing"), None);
    }

    #[test]
    fn enabling_shuffle_keeps_current_track_first() {
        let mut cursor = PlaylistCursor::with_seed(7);
        cursor.set_playlist(tracks(10));
        for current in 0..10 {
            cursor.set_current(current);
            cursor.enable_shuffle();
            assert_eq!(cursor.shuffle_order().expect("shuffle")[0], current);
        }
    }

    #[test]
    fn set_playlist_drops_shuffle() {
        let mut cursor = PlaylistCursor::with_seed(3);
        cursor.set_playlist(tracks(4));
        cursor.enable_shuffle();
        cursor.set_playlist(tracks(5));
        assert!(!cursor.shuffle_enabled());
    }

    #[test]
    fn set_playlist_follows_current_track_by_id() {
        let mut cursor = PlaylistCursor::with_seed(3);
        cursor.set_playlist(tracks(4));
        cursor.set_current(2);

        let mut reordered = tracks(4);
        reordered.reverse();
        assert!(cursor.set_playlist(reordered));
        assert_eq!(cursor.current_index(), Some(1));
        assert_eq!(cursor.current_track().map(|t| t.id.as_str()), Some("t2"));

        assert!(!cursor.set_playlist(tracks(2)));
        assert_eq!(cursor.current_index(), None);
    }

    #[test]
    fn set_current_rejects_out_of_range() {
        let mut cursor = PlaylistCursor::with_seed(3);
        cursor.set_playlist(tracks(2));
        assert!(!cursor.set_current(2));
        assert_eq!(cursor.current_index(), None);
    }

    #[test]
    fn reshuffle_eventually_changes_order() {
        let mut cursor = PlaylistCursor::with_seed(11);
        cursor.set_playlist(tracks(8));
        cursor.enable_shuffle();
        let first = cursor.shuffle_order().expect("shuffle").to_vec();
        let changed = (0..20).any(|_| {
            cursor.reshuffle();
            cursor.shuffle_order().expect("shuffle") != first.as_slice()
        });
        assert!(changed);
    }

    proptest::proptest! {
        #[test]
        fn shuffle_order_is_a_permutation(len in 0usize..64, seed in proptest::num::u64::ANY) {
            let mut cursor = PlaylistCursor::with_seed(seed);
            cursor.set_playlist(tracks(len));
            cursor.enable_shuffle();
            for _ in 0..2 {
                let mut order = cursor.shuffle_order().expect("shuffle").to_vec();
                order.sort_unstable();
                prop_assert_eq!(order, (0..len).collect::<Vec<_>>());
                cursor.reshuffle();
            }
        }
    }
}
