use rand::Rng;
use remote_player_models::{PlayingItem, RepeatMode};
use tracing::instrument;

/// Ordered items of the local backend with the one currently loaded.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Tracklist {
    queue: Vec<PlayingItem>,
    current: Option<usize>,
}

impl Tracklist {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn queue(&self) -> &[PlayingItem] {
        &self.queue
    }

    pub fn total(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = PlayingItem>) {
        self.queue.extend(items);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current
    }

    /// Leaves the list without a loaded item.
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn skip_to(&mut self, position: usize) -> Option<&PlayingItem> {
        if position >= self.queue.len() {
            return None;
        }

        self.current = Some(position);
        self.queue.get(position)
    }

    /// The position a skip forward moves to, `None` at the end of a
    /// non-repeating list.
    #[instrument(skip(self))]
    pub fn next_position(&self, repeat: RepeatMode, shuffled: bool) -> Option<usize> {
        let total = self.queue.len();
        if total == 0 {
            return None;
        }

        let Some(current) = self.current else {
            return Some(0);
        };

        if shuffled && total > 1 {
            let offset = rand::rng().random_range(1..total);
            return Some((current + offset) % total);
        }

        if current + 1 < total {
            Some(current + 1)
        } else if repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    /// Where playback continues once the current item ends.
    pub fn finished_position(&self, repeat: RepeatMode, shuffled: bool) -> Option<usize> {
        match (repeat, self.current) {
            (RepeatMode::One, Some(current)) => Some(current),
            _ => self.next_position(repeat, shuffled),
        }
    }

    pub fn previous_position(&self, repeat: RepeatMode) -> Option<usize> {
        let total = self.queue.len();
        if total == 0 {
            return None;
        }

        match self.current {
            None | Some(0) if repeat == RepeatMode::All => Some(total - 1),
            None | Some(0) => Some(0),
            Some(current) => Some(current - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracklist(len: i64) -> Tracklist {
        let mut tracklist = Tracklist::new();
        tracklist.extend((0..len).map(|id| PlayingItem {
            id: Some(id),
            ..Default::default()
        }));
        tracklist
    }

    #[test]
    fn next_stops_at_end_without_repeat() {
        let mut tracklist = tracklist(3);
        assert_eq!(tracklist.next_position(RepeatMode::Off, false), Some(0));

        tracklist.skip_to(2);
        assert_eq!(tracklist.next_position(RepeatMode::Off, false), None);
        assert_eq!(tracklist.next_position(RepeatMode::All, false), Some(0));
    }

    #[test]
    fn repeat_one_replays_only_when_finished() {
        let mut tracklist = tracklist(3);
        tracklist.skip_to(1);

        assert_eq!(tracklist.finished_position(RepeatMode::One, false), Some(1));
        assert_eq!(tracklist.next_position(RepeatMode::One, false), Some(2));
    }

    #[test]
    fn shuffle_never_repeats_current() {
        let mut tracklist = tracklist(4);
        tracklist.skip_to(2);

        for _ in 0..50 {
            let next = tracklist.next_position(RepeatMode::Off, true).unwrap();
            assert!(next < 4);
            assert_ne!(next, 2);
        }
    }

    #[test]
    fn previous_wraps_with_repeat_all() {
        let mut tracklist = tracklist(3);
        tracklist.skip_to(0);

        assert_eq!(tracklist.previous_position(RepeatMode::Off), Some(0));
        assert_eq!(tracklist.previous_position(RepeatMode::All), Some(2));

        tracklist.skip_to(2);
        assert_eq!(tracklist.previous_position(RepeatMode::Off), Some(1));
    }

    #[test]
    fn skip_out_of_range_keeps_current() {
        let mut tracklist = tracklist(2);
        tracklist.skip_to(1);

        assert!(tracklist.skip_to(5).is_none());
        assert_eq!(tracklist.current_position(), Some(1));

        tracklist.clear();
        assert!(tracklist.current_position().is_none());
        assert!(tracklist.is_empty());
    }
}
