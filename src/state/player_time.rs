//! On-field interval accounting for players.
//!
//! A segment exists once per player. `total_time` only grows when an interval
//! is folded in (stop, or a periodic refresh); the open interval is always
//! accounted for with [`PlayerTimeSegment::displayed_total`].

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::{
    clock::Millis,
    events::{Period, PlayerSlot, PlayerTimeSegment},
    ids::IdGenerator,
};

/// Result of a start/stop/toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTimeOutcome {
    /// A new segment was created with an open interval.
    Started,
    /// An existing, stopped segment was reopened.
    Resumed,
    /// The player was already on the field; nothing changed.
    AlreadyPlaying,
    /// The open interval was closed.
    Stopped {
        /// Seconds added to the total by this stop.
        elapsed: u64,
    },
    /// The player was not on the field; nothing changed.
    NotPlaying,
    /// No segment exists for the player; nothing changed.
    UnknownPlayer,
}

impl PlayerTimeOutcome {
    /// Whether the request modified the segment.
    pub fn changed(self) -> bool {
        matches!(
            self,
            PlayerTimeOutcome::Started
                | PlayerTimeOutcome::Resumed
                | PlayerTimeOutcome::Stopped { .. }
        )
    }
}

impl fmt::Display for PlayerTimeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerTimeOutcome::Started => f.write_str("started"),
            PlayerTimeOutcome::Resumed => f.write_str("resumed"),
            PlayerTimeOutcome::AlreadyPlaying => f.write_str("already_playing"),
            PlayerTimeOutcome::Stopped { .. } => f.write_str("stopped"),
            PlayerTimeOutcome::NotPlaying => f.write_str("not_playing"),
            PlayerTimeOutcome::UnknownPlayer => f.write_str("unknown_player"),
        }
    }
}

/// How much of a foreign segment has been merged already.
#[derive(Debug, Clone, Copy, Default)]
struct MergedShare {
    revision: u32,
    total_time: u64,
    periods: usize,
    /// The local open interval was taken from the foreign segment.
    drives_interval: bool,
}

/// Per-player segments keyed by player id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PlayerTimeTracker {
    segments: IndexMap<String, PlayerTimeSegment>,
    merged: HashMap<Uuid, MergedShare>,
}

impl PlayerTimeTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an interval for the player, creating the segment on first use.
    pub fn start(&mut self, slot: PlayerSlot, now: Millis, ids: &IdGenerator) -> PlayerTimeOutcome {
        if let Some(segment) = self.segments.get_mut(&slot.player_id) {
            if segment.is_playing {
                warn!(player_id = %slot.player_id, "player is already playing; start ignored");
                return PlayerTimeOutcome::AlreadyPlaying;
            }

            segment.is_playing = true;
            segment.start_time = Some(now);
            touch(segment);
            return PlayerTimeOutcome::Resumed;
        }

        let segment = PlayerTimeSegment {
            id: ids.next_id(),
            player_id: slot.player_id.clone(),
            player_name: slot.player_name,
            team_id: slot.team_id,
            team_name: slot.team_name,
            side: slot.side,
            total_time: 0,
            is_playing: true,
            start_time: Some(now),
            periods: Vec::new(),
            synced: false,
            revision: 0,
        };
        self.segments.insert(slot.player_id, segment);
        PlayerTimeOutcome::Started
    }

    /// Close the player's open interval.
    pub fn stop(&mut self, player_id: &str, now: Millis) -> PlayerTimeOutcome {
        let Some(segment) = self.segments.get_mut(player_id) else {
            warn!(player_id, "no time segment for player; stop ignored");
            return PlayerTimeOutcome::UnknownPlayer;
        };

        let (true, Some(start)) = (segment.is_playing, segment.start_time) else {
            warn!(player_id, "player is not playing; stop ignored");
            return PlayerTimeOutcome::NotPlaying;
        };

        let elapsed = now.saturating_sub(start) / 1_000;
        segment.periods.push(Period {
            start,
            end: now,
            duration: elapsed,
        });
        segment.total_time += elapsed;
        segment.is_playing = false;
        segment.start_time = None;
        touch(segment);

        PlayerTimeOutcome::Stopped { elapsed }
    }

    /// Stop a playing player or reopen a stopped one.
    pub fn toggle(&mut self, player_id: &str, now: Millis) -> PlayerTimeOutcome {
        let Some(segment) = self.segments.get_mut(player_id) else {
            warn!(player_id, "no time segment for player; toggle ignored");
            return PlayerTimeOutcome::UnknownPlayer;
        };

        if segment.is_playing {
            return self.stop(player_id, now);
        }

        segment.is_playing = true;
        segment.start_time = Some(now);
        touch(segment);
        PlayerTimeOutcome::Resumed
    }

    /// Fold the open interval of every playing segment into its total.
    ///
    /// The start is advanced by the folded whole seconds, so the interval stays
    /// open and no sub-second remainder is lost. Returns the refreshed player ids.
    pub fn fold_running(&mut self, now: Millis) -> Vec<String> {
        let mut refreshed = Vec::new();
        for segment in self.segments.values_mut().filter(|s| s.is_playing) {
            let Some(start) = segment.start_time else {
                continue;
            };
            let elapsed = now.saturating_sub(start) / 1_000;
            if elapsed == 0 {
                continue;
            }
            segment.total_time += elapsed;
            segment.start_time = Some(start + elapsed * 1_000);
            touch(segment);
            refreshed.push(segment.player_id.clone());
        }
        refreshed
    }

    /// Stop every playing segment. Returns the stopped player ids.
    pub fn stop_all(&mut self, now: Millis) -> Vec<String> {
        let playing = self
            .segments
            .values()
            .filter(|s| s.is_playing)
            .map(|s| s.player_id.clone())
            .collect::<Vec<_>>();
        for player_id in &playing {
            self.stop(player_id, now);
        }
        playing
    }

    /// Segment for `player_id`.
    pub fn get(&self, player_id: &str) -> Option<&PlayerTimeSegment> {
        self.segments.get(player_id)
    }

    /// All segments in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerTimeSegment> {
        self.segments.values()
    }

    /// Number of players currently on the field.
    pub fn active_count(&self) -> usize {
        self.segments.values().filter(|s| s.is_playing).count()
    }

    /// Number of segments whose latest revision is not persisted.
    pub fn unsynced_count(&self) -> usize {
        self.segments.values().filter(|s| !s.synced).count()
    }

    /// Mark a segment as persisted if it was not modified since `revision`.
    pub fn mark_synced(&mut self, player_id: &str, revision: u32) -> bool {
        match self.segments.get_mut(player_id) {
            Some(segment) if segment.revision == revision => {
                segment.synced = true;
                true
            }
            _ => false,
        }
    }

    /// Merge a segment recorded elsewhere (a local buffer) into the player's segment.
    ///
    /// Successive states of the same foreign segment only contribute what they add
    /// since the last merge: new closed periods and newly folded seconds. The local
    /// segment keeps its identity and history. Its open interval follows the foreign
    /// one only when the local segment was not already running on its own.
    ///
    /// Returns `false` for a state already merged (same or older revision).
    pub fn merge(&mut self, incoming: PlayerTimeSegment) -> bool {
        let previous = self.merged.get(&incoming.id).copied();
        if previous.is_some_and(|share| incoming.revision <= share.revision) {
            debug!(
                player_id = %incoming.player_id,
                revision = incoming.revision,
                "segment state already merged; skipped"
            );
            return false;
        }

        let Some(segment) = self.segments.get_mut(&incoming.player_id) else {
            self.merged.insert(
                incoming.id,
                MergedShare {
                    revision: incoming.revision,
                    total_time: incoming.total_time,
                    periods: incoming.periods.len(),
                    drives_interval: incoming.is_playing,
                },
            );
            let mut segment = incoming;
            segment.synced = false;
            self.segments.insert(segment.player_id.clone(), segment);
            return true;
        };

        let share = previous.unwrap_or_default();
        segment.total_time += incoming.total_time.saturating_sub(share.total_time);
        if let Some(added) = incoming.periods.get(share.periods..) {
            segment.periods.extend_from_slice(added);
            segment.periods.sort_by_key(|period| period.start);
        }

        let drives_interval = if !segment.is_playing || share.drives_interval {
            segment.is_playing = incoming.is_playing;
            segment.start_time = incoming.start_time;
            incoming.is_playing
        } else {
            false
        };
        touch(segment);

        self.merged.insert(
            incoming.id,
            MergedShare {
                revision: incoming.revision,
                total_time: incoming.total_time.max(share.total_time),
                periods: incoming.periods.len().max(share.periods),
                drives_interval,
            },
        );
        true
    }

    /// Drop all segments.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.merged.clear();
    }

    /// Number of tracked players.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether no player is tracked.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn touch(segment: &mut PlayerTimeSegment) {
    segment.synced = false;
    segment.revision = segment.revision.wrapping_add(1);
}
