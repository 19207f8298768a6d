//! Video chunk player state machine.
//!
//! One player exists at a time, opened for a single emergency. The app
//! module owns the 20-second poll and its generation counter; this module
//! owns the pure transitions. Media element concerns (volume, buffering,
//! current time) stay in the shell.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{EmergencyInfo, VideoChunk, VideoFeedsResponse};
use crate::{AppError, SosId};

/// Connection state, distinct from chunk presence: a live feed with no
/// chunks yet is `Ready` with an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PlayerPhase {
    #[default]
    Loading,
    Ready,
    /// No bundle ever arrived. Background failures after the first
    /// successful fetch keep the data and set `last_error` instead.
    Failed(AppError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub emergency_id: SosId,
    pub phase: PlayerPhase,
    pub emergency_info: EmergencyInfo,
    pub chunks: Vec<VideoChunk>,
    pub current_index: usize,
    pub playing: bool,
    pub fullscreen: bool,
    pub sidebar_open: bool,
    /// Poll generation this player was opened under. Completions tagged
    /// with an older generation are discarded by the app module.
    pub generation: u64,
    pub last_error: Option<AppError>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl PlayerState {
    #[must_use]
    pub fn open(emergency_id: SosId, generation: u64) -> Self {
        Self {
            emergency_id,
            phase: PlayerPhase::Loading,
            emergency_info: EmergencyInfo::default(),
            chunks: Vec::new(),
            current_index: 0,
            playing: false,
            fullscreen: false,
            sidebar_open: false,
            generation,
            last_error: None,
            synced_at: None,
        }
    }

    /// Replace the chunk list with a fresh bundle. The cursor clamps to
    /// `min(current_index, len - 1)` (0 when empty) so a shrinking list can
    /// never leave it out of bounds, and a growing one never yanks the
    /// operator back to the first chunk.
    pub fn apply_refresh(&mut self, bundle: VideoFeedsResponse) {
        self.phase = PlayerPhase::Ready;
        self.emergency_info = bundle.emergency_info;
        self.chunks = bundle.video_feeds;
        self.synced_at = bundle.last_updated;
        self.last_error = None;
        self.current_index = if self.chunks.is_empty() {
            0
        } else {
            self.current_index.min(self.chunks.len() - 1)
        };
    }

    pub fn apply_error(&mut self, error: AppError) {
        if matches!(self.phase, PlayerPhase::Ready) {
            self.last_error = Some(error);
        } else {
            self.phase = PlayerPhase::Failed(error);
        }
    }

    /// Operator hit retry on the failure screen.
    pub fn retry(&mut self) {
        self.phase = PlayerPhase::Loading;
        self.last_error = None;
    }

    pub fn next_chunk(&mut self) {
        if self.current_index + 1 < self.chunks.len() {
            self.current_index += 1;
        }
    }

    pub fn prev_chunk(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    /// Direct pick from the chunk list; picking also dismisses the list.
    pub fn select_chunk(&mut self, index: usize) {
        if index < self.chunks.len() {
            self.current_index = index;
            self.sidebar_open = false;
        }
    }

    pub fn toggle_playback(&mut self) {
        self.playing = !self.playing;
    }

    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    /// The shell reports the current chunk finished: advance when a next
    /// chunk exists, otherwise hold on the last one and stop.
    pub fn playback_ended(&mut self) {
        if self.current_index + 1 < self.chunks.len() {
            self.current_index += 1;
            self.playing = true;
        } else {
            self.playing = false;
        }
    }

    #[must_use]
    pub fn current_chunk(&self) -> Option<&VideoChunk> {
        self.chunks.get(self.current_index)
    }

    /// True once a background refresh has failed since the last good one.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}

/// mm:ss label for the scrubber. Minutes run past 59 rather than wrapping
/// into hours; anything non-finite or negative reads 00:00.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_owned();
    }
    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn chunk(sequence: u32) -> VideoChunk {
        VideoChunk {
            id: u64::from(sequence) * 10,
            video_url: Some(format!("https://cdn.example.org/{sequence}.mp4")),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
                + chrono::Duration::seconds(i64::from(sequence)),
            chunk_sequence: sequence,
            file_size: Some(1_048_576),
            file_size_formatted: Some("1.0MB".to_owned()),
            duration: Some(10.0),
        }
    }

    fn bundle(sequences: &[u32]) -> VideoFeedsResponse {
        VideoFeedsResponse {
            emergency_id: Some(SosId(9)),
            emergency_info: EmergencyInfo {
                emergency_type: "panic".to_owned(),
                user_name: "Asha".to_owned(),
                ..EmergencyInfo::default()
            },
            video_feeds: sequences.iter().copied().map(chunk).collect(),
            total_chunks: u32::try_from(sequences.len()).unwrap(),
            last_updated: Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 31, 0).unwrap()),
        }
    }

    fn ready_player(sequences: &[u32]) -> PlayerState {
        let mut player = PlayerState::open(SosId(9), 1);
        player.apply_refresh(bundle(sequences));
        player
    }

    #[test]
    fn opens_loading_with_nothing_to_play() {
        let player = PlayerState::open(SosId(9), 3);
        assert_eq!(player.phase, PlayerPhase::Loading);
        assert_eq!(player.generation, 3);
        assert!(!player.playing);
        assert!(player.current_chunk().is_none());
    }

    #[test]
    fn a_shrinking_refresh_clamps_the_cursor() {
        let mut player = ready_player(&[1, 2, 3]);
        player.current_index = 2;

        player.apply_refresh(bundle(&[1]));
        assert_eq!(player.current_index, 0);
        assert_eq!(player.current_chunk().unwrap().chunk_sequence, 1);
    }

    #[test]
    fn a_growing_refresh_keeps_the_cursor_in_place() {
        let mut player = ready_player(&[1, 2]);
        player.current_index = 1;

        player.apply_refresh(bundle(&[1, 2, 3, 4]));
        assert_eq!(player.current_index, 1);
    }

    #[test]
    fn an_empty_feed_is_ready_with_no_chunks() {
        let player = ready_player(&[]);
        assert_eq!(player.phase, PlayerPhase::Ready);
        assert_eq!(player.current_index, 0);
        assert!(player.current_chunk().is_none());
    }

    #[test]
    fn navigation_saturates_at_both_ends() {
        let mut player = ready_player(&[1, 2, 3]);
        player.prev_chunk();
        assert_eq!(player.current_index, 0);

        player.next_chunk();
        player.next_chunk();
        player.next_chunk();
        assert_eq!(player.current_index, 2);
    }

    #[test]
    fn selecting_a_chunk_dismisses_the_sidebar() {
        let mut player = ready_player(&[1, 2, 3]);
        player.toggle_sidebar();
        assert!(player.sidebar_open);

        player.select_chunk(1);
        assert_eq!(player.current_index, 1);
        assert!(!player.sidebar_open);

        player.toggle_sidebar();
        player.select_chunk(9);
        assert_eq!(player.current_index, 1);
        assert!(player.sidebar_open);
    }

    #[test]
    fn playback_auto_advances_then_holds_at_the_end() {
        let mut player = ready_player(&[1, 2]);
        player.playing = true;

        player.playback_ended();
        assert_eq!(player.current_index, 1);
        assert!(player.playing);

        player.playback_ended();
        assert_eq!(player.current_index, 1);
        assert!(!player.playing);
    }

    #[test]
    fn an_initial_failure_fails_the_player() {
        let mut player = PlayerState::open(SosId(9), 1);
        player.apply_error(AppError::new(ErrorKind::Network, "refused"));
        assert!(matches!(player.phase, PlayerPhase::Failed(_)));

        player.retry();
        assert_eq!(player.phase, PlayerPhase::Loading);
        assert!(player.last_error.is_none());
    }

    #[test]
    fn a_background_failure_keeps_the_chunks_and_marks_stale() {
        let mut player = ready_player(&[1, 2]);
        player.current_index = 1;

        player.apply_error(AppError::new(ErrorKind::Timeout, "request timed out"));
        assert_eq!(player.phase, PlayerPhase::Ready);
        assert_eq!(player.chunks.len(), 2);
        assert_eq!(player.current_index, 1);
        assert!(player.is_stale());

        player.apply_refresh(bundle(&[1, 2]));
        assert!(!player.is_stale());
    }

    #[test]
    fn clock_labels_pad_and_never_wrap() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(65.4), "01:05");
        assert_eq!(format_clock(3599.0), "59:59");
        assert_eq!(format_clock(3600.0), "60:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
        assert_eq!(format_clock(f64::INFINITY), "00:00");
        assert_eq!(format_clock(-3.0), "00:00");
    }

    proptest! {
        #[test]
        fn cursor_stays_in_bounds_under_any_op_sequence(
            ops in proptest::collection::vec(0u8..5, 0..40),
            sizes in proptest::collection::vec(0usize..6, 1..8),
        ) {
            let mut player = PlayerState::open(SosId(1), 1);
            let mut size_iter = sizes.iter().cycle();

            for op in ops {
                match op {
                    0 => {
                        let len = *size_iter.next().unwrap();
                        let sequences: Vec<u32> =
                            (1..=u32::try_from(len).unwrap()).collect();
                        player.apply_refresh(bundle(&sequences));
                    }
                    1 => player.next_chunk(),
                    2 => player.prev_chunk(),
                    3 => player.select_chunk(3),
                    _ => player.playback_ended(),
                }
                prop_assert!(player.current_index < player.chunks.len().max(1));
            }
        }
    }
}
