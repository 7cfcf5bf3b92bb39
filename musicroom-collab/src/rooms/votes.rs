use std::collections::BTreeSet;

use crate::{RoomUser, Track, TrackId, TrackMetadata, UserId, ValidationError};

/// Keeps the queue of a room and the suggestions that are waiting for enough votes to join it.
///
/// Every track id is in exactly one of the two, at most once.
#[derive(Debug, Clone)]
pub struct VoteLedger {
    minimum_score_to_be_played: u32,
    /// Graduated tracks, in graduation order
    queue: Vec<Track>,
    /// Suggested tracks, in suggestion order
    suggestion_pool: Vec<Track>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResult {
    /// The vote was recorded, and the track may have graduated to the queue because of it.
    Counted { graduated: bool },
    /// The user already voted for the track.
    AlreadyVoted,
    /// The track is already queued, its score no longer changes.
    Frozen,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SuggestionResult {
    pub accepted: Vec<TrackId>,
    /// Tracks that were already queued or suggested
    pub rejected: Vec<TrackId>,
    pub graduated: Vec<TrackId>,
}

impl VoteLedger {
    /// Creates a ledger with the given initial queue. Duplicate tracks are only kept once.
    pub fn new(minimum_score_to_be_played: u32, initial_queue: Vec<TrackMetadata>) -> Self {
        let mut queue: Vec<Track> = Vec::with_capacity(initial_queue.len());

        for metadata in initial_queue {
            if queue.iter().all(|t| *t.id() != metadata.id) {
                queue.push(Track::new(metadata));
            }
        }

        Self {
            minimum_score_to_be_played,
            queue,
            suggestion_pool: vec![],
        }
    }

    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    pub fn suggestion_pool(&self) -> &[Track] {
        &self.suggestion_pool
    }

    pub fn minimum_score_to_be_played(&self) -> u32 {
        self.minimum_score_to_be_played
    }

    pub fn is_queued(&self, track_id: &TrackId) -> bool {
        self.queue.iter().any(|t| t.id() == track_id)
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.is_queued(track_id) || self.suggestion_pool.iter().any(|t| t.id() == track_id)
    }

    /// Adds tracks to the suggestion pool. Each track is accepted or rejected on its own.
    ///
    /// If `counts_as_vote` is set, the suggester votes for every accepted track.
    pub fn suggest(
        &mut self,
        tracks: Vec<TrackMetadata>,
        suggester: &mut RoomUser,
        counts_as_vote: bool,
    ) -> SuggestionResult {
        let mut result = SuggestionResult::default();

        for metadata in tracks {
            if self.contains(&metadata.id) {
                result.rejected.push(metadata.id);
                continue;
            }

            let mut track = Track::new(metadata);

            if counts_as_vote && track.add_voter(&suggester.user_id) {
                suggester.tracks_voted_for.insert(track.id().clone());
            }

            result.accepted.push(track.id().clone());
            self.suggestion_pool.push(track);
        }

        result.graduated = self.graduate_eligible();
        result
    }

    /// Records a vote of the user for a suggested track.
    pub fn vote(
        &mut self,
        track_id: &TrackId,
        voter: &mut RoomUser,
    ) -> Result<VoteResult, ValidationError> {
        if self.is_queued(track_id) {
            return Ok(VoteResult::Frozen);
        }

        let track = self
            .suggestion_pool
            .iter_mut()
            .find(|t| t.id() == track_id)
            .ok_or_else(|| ValidationError::UnknownTrack(track_id.clone()))?;

        let counted = track.add_voter(&voter.user_id);
        voter.tracks_voted_for.insert(track_id.clone());

        if !counted {
            return Ok(VoteResult::AlreadyVoted);
        }

        let graduated = self.graduate_eligible();

        Ok(VoteResult::Counted {
            graduated: graduated.contains(track_id),
        })
    }

    /// Returns every queued or suggested track the user voted for, even before leaving the room.
    pub fn votes_of(&self, user_id: &UserId) -> BTreeSet<TrackId> {
        self.queue
            .iter()
            .chain(&self.suggestion_pool)
            .filter(|t| t.voters.contains(user_id))
            .map(|t| t.id().clone())
            .collect()
    }

    /// Moves every suggestion that reached the minimum score to the end of the queue,
    /// keeping suggestion order among them.
    fn graduate_eligible(&mut self) -> Vec<TrackId> {
        let minimum = self.minimum_score_to_be_played;

        let (graduating, waiting): (Vec<_>, Vec<_>) = self
            .suggestion_pool
            .drain(..)
            .partition(|t| t.score >= minimum);

        self.suggestion_pool = waiting;

        let graduated = graduating.iter().map(|t| t.id().clone()).collect();
        self.queue.extend(graduating);

        graduated
    }
}
