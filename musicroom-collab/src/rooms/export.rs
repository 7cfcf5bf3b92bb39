use serde::{Deserialize, Serialize};

use crate::{
    DeviceId, PhysicalAndTimeConstraints, PlayingMode, RoomId, RoomUser, Track, TrackId, UserId,
};

/// A snapshot of a room, as presented to its users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedState {
    pub room_id: RoomId,
    pub room_creator_user_id: UserId,
    pub name: String,
    pub playing: bool,
    pub playing_mode: PlayingMode,
    pub is_open: bool,
    pub is_open_only_invited_users_can_vote: bool,
    pub has_physical_and_time_constraints: bool,
    pub physical_and_time_constraints: Option<PhysicalAndTimeConstraints>,
    pub delegation_owner_user_id: Option<UserId>,
    pub minimum_score_to_be_played: u32,
    pub users: Vec<UserId>,
    pub users_length: usize,
    /// Ids of the queued tracks, in play order
    pub tracks_ids_list: Vec<TrackId>,
    pub current_track: Option<ExposedCurrentTrack>,
    pub tracks: Vec<ExposedTrack>,
    pub suggested_tracks: Vec<ExposedTrack>,
    /// Only present when the state was asked for or caused by a user of the room
    pub user_related_information: Option<UserRelatedInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedTrack {
    pub id: TrackId,
    pub title: String,
    pub artist_name: String,
    /// In milliseconds
    pub duration: u64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedCurrentTrack {
    pub id: TrackId,
    pub title: String,
    pub artist_name: String,
    /// In milliseconds
    pub duration: u64,
    /// In milliseconds
    pub elapsed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRelatedInformation {
    pub user_id: UserId,
    pub emitting_device_id: DeviceId,
    pub tracks_voted_for: Vec<TrackId>,
    pub has_control_and_delegation_permission: bool,
    pub user_fits_position_constraint: Option<bool>,
    pub user_has_been_invited: bool,
}

/// An entry of the users list of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub is_creator: bool,
    pub is_delegation_owner: bool,
    pub has_control_and_delegation_permission: bool,
    pub user_fits_position_constraint: Option<bool>,
    pub user_has_been_invited: bool,
    pub votes_count: usize,
}

impl From<&Track> for ExposedTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.metadata.id.clone(),
            title: track.metadata.title.clone(),
            artist_name: track.metadata.artist_name.clone(),
            duration: track.metadata.duration_in_ms(),
            score: track.score,
        }
    }
}

impl From<&RoomUser> for UserRelatedInformation {
    fn from(user: &RoomUser) -> Self {
        Self {
            user_id: user.user_id.clone(),
            emitting_device_id: user.device_id.clone(),
            tracks_voted_for: user.tracks_voted_for.iter().cloned().collect(),
            has_control_and_delegation_permission: user.has_control_and_delegation_permission,
            user_fits_position_constraint: user.user_fits_position_constraint,
            user_has_been_invited: user.user_has_been_invited,
        }
    }
}

impl ExportedState {
    pub fn current_track_id(&self) -> Option<&TrackId> {
        self.current_track.as_ref().map(|t| &t.id)
    }
}
