use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::models::Video;

/// Issues increasing tickets so that only the newest fetch for a piece of
/// state gets applied; older responses are dropped when they resolve.
#[derive(Debug, Default)]
pub struct FetchGeneration {
    current: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

impl FetchGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new fetch, invalidating every earlier ticket.
    pub fn begin(&self) -> FetchTicket {
        FetchTicket(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.current.load(Ordering::SeqCst) == ticket.0
    }

    /// Returns `value` only if `ticket` is still the latest.
    pub fn accept<T>(&self, ticket: FetchTicket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!("Discarding stale response for generation {}", ticket.0);
            None
        }
    }
}

/// Application-level state shared by every view.
///
/// The selected video is the one value views share. It changes only through
/// `select_video` (explicit choice) or `select_default` (first video when
/// nothing is chosen), and every change starts a new fetch generation.
#[derive(Debug, Default)]
pub struct AppState {
    selected_video: Option<i64>,
    generation: FetchGeneration,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_video(&self) -> Option<i64> {
        self.selected_video
    }

    pub fn select_video(&mut self, video_id: i64) -> FetchTicket {
        debug!("Selected video {video_id}");
        self.selected_video = Some(video_id);
        self.generation.begin()
    }

    /// Picks the first listed video if nothing is selected yet.
    pub fn select_default(&mut self, videos: &[Video]) -> Option<i64> {
        if self.selected_video.is_none() {
            if let Some(first) = videos.first() {
                self.select_video(first.video_id);
            }
        }
        self.selected_video
    }

    pub fn generation(&self) -> &FetchGeneration {
        &self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(video_id: i64) -> Video {
        Video {
            video_id,
            uuid: String::new(),
            title: format!("Video {video_id}"),
            status: 3,
            created_date: None,
        }
    }

    #[test]
    fn stale_tickets_are_rejected() {
        let generation = FetchGeneration::new();
        let first = generation.begin();
        let second = generation.begin();

        assert_eq!(generation.accept(first, "old"), None);
        assert_eq!(generation.accept(second, "new"), Some("new"));
    }

    #[test]
    fn default_selection_only_fills_empty_slot() {
        let mut state = AppState::new();
        assert_eq!(state.select_default(&[]), None);
        assert_eq!(state.select_default(&[video(4), video(9)]), Some(4));

        state.select_video(9);
        assert_eq!(state.select_default(&[video(4)]), Some(9));
    }

    #[test]
    fn changing_selection_invalidates_in_flight_fetch() {
        let mut state = AppState::new();
        let first = state.select_video(1);
        let second = state.select_video(2);
        assert!(!state.generation().is_current(first));
        assert!(state.generation().is_current(second));
    }
}
