use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::UserId;

pub type TrackId = String;

/// What the metadata lookup knows about a track. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    pub id: TrackId,
    pub title: String,
    pub artist_name: String,
    pub duration: Duration,
}

/// A track in a room, either queued or waiting in the suggestion pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub metadata: TrackMetadata,
    /// How many users voted for the track. Frozen once the track is queued.
    pub score: u32,
    /// Everyone who voted for the track, including users that left the room since
    pub voters: BTreeSet<UserId>,
}

impl TrackMetadata {
    pub fn duration_in_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    #[cfg(test)]
    pub fn mock(id: &str, seconds: u64) -> Self {
        Self {
            id: id.to_string(),
            title: format!("{id} title"),
            artist_name: format!("{id} artist"),
            duration: Duration::from_secs(seconds),
        }
    }
}

impl Track {
    /// Creates a track nobody voted for yet.
    pub fn new(metadata: TrackMetadata) -> Self {
        Self {
            metadata,
            score: 0,
            voters: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &TrackId {
        &self.metadata.id
    }

    pub fn duration(&self) -> Duration {
        self.metadata.duration
    }

    /// Counts a vote of the user. Returns false if they already voted.
    pub fn add_voter(&mut self, user_id: &UserId) -> bool {
        if !self.voters.insert(user_id.clone()) {
            return false;
        }

        self.score += 1;
        true
    }
}
