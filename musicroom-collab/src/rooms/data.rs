use std::collections::BTreeSet;

use musicroom_core::Config;
use serde::{Deserialize, Serialize};

use crate::{ConstraintEnforcement, PhysicalAndTimeConstraints, TrackId, ValidationError};

pub type RoomId = String;
pub type UserId = String;
pub type DeviceId = String;

/// Who gets to control playback
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayingMode {
    /// Every user with control permission controls the shared playback
    #[default]
    Broadcast,
    /// Only the delegation owner controls playback
    Direct,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomLifecycle {
    #[default]
    Paused,
    Playing,
    /// The room no longer accepts any signal
    Terminated,
}

/// What is needed to create a new room
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub name: String,
    pub creator_user_id: UserId,
    pub creator_device_id: DeviceId,
    /// The queue the room starts with, before any suggestion
    pub initial_track_ids: Vec<TrackId>,
    /// Falls back to the configured default if not set
    pub minimum_score_to_be_played: Option<u32>,
    pub is_open: bool,
    pub is_open_only_invited_users_can_vote: bool,
    pub physical_and_time_constraints: Option<PhysicalAndTimeConstraints>,
    pub playing_mode: PlayingMode,
}

/// The immutable definition of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomParameters {
    pub room_id: RoomId,
    pub name: String,
    pub creator_user_id: UserId,
    pub creator_device_id: DeviceId,
    pub minimum_score_to_be_played: u32,
    pub is_open: bool,
    pub is_open_only_invited_users_can_vote: bool,
    pub physical_and_time_constraints: Option<PhysicalAndTimeConstraints>,
    pub playing_mode: PlayingMode,
}

/// Rules a room is created with, taken from the [Config] at that time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRules {
    pub suggestion_counts_as_vote: bool,
    pub constraint_enforcement: ConstraintEnforcement,
}

/// A user taking part in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUser {
    pub user_id: UserId,
    /// The device audio is emitted from for this user
    pub device_id: DeviceId,
    pub tracks_voted_for: BTreeSet<TrackId>,
    /// None until the user reports it, and always in rooms without constraints
    pub user_fits_position_constraint: Option<bool>,
    pub has_control_and_delegation_permission: bool,
    pub user_has_been_invited: bool,
}

impl NewRoom {
    /// Splits the new room into the parameters of the room and the initial track ids.
    pub fn into_parameters(
        self,
        room_id: RoomId,
        config: &Config,
    ) -> (RoomParameters, Vec<TrackId>) {
        let parameters = RoomParameters {
            room_id,
            name: self.name,
            creator_user_id: self.creator_user_id,
            creator_device_id: self.creator_device_id,
            minimum_score_to_be_played: self
                .minimum_score_to_be_played
                .unwrap_or(config.default_minimum_score_to_be_played),
            is_open: self.is_open,
            is_open_only_invited_users_can_vote: self.is_open_only_invited_users_can_vote,
            physical_and_time_constraints: self.physical_and_time_constraints,
            playing_mode: self.playing_mode,
        };

        (parameters, self.initial_track_ids)
    }
}

impl RoomParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }

        if self.minimum_score_to_be_played == 0 {
            return Err(ValidationError::InvalidMinimumScore);
        }

        if let Some(constraints) = &self.physical_and_time_constraints {
            constraints.validate()?;
        }

        Ok(())
    }

    /// Whether only invited users may vote or suggest
    pub fn restricts_voting_to_invited(&self) -> bool {
        self.is_open && self.is_open_only_invited_users_can_vote
    }
}

impl From<&Config> for RoomRules {
    fn from(config: &Config) -> Self {
        Self {
            suggestion_counts_as_vote: config.suggestion_counts_as_vote,
            constraint_enforcement: if config.enforce_position_constraints {
                ConstraintEnforcement::Strict
            } else {
                ConstraintEnforcement::Advisory
            },
        }
    }
}

impl Default for RoomRules {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl RoomUser {
    pub fn new(user_id: UserId, device_id: DeviceId, invited: bool) -> Self {
        Self {
            user_id,
            device_id,
            tracks_voted_for: Default::default(),
            user_fits_position_constraint: None,
            has_control_and_delegation_permission: false,
            user_has_been_invited: invited,
        }
    }
}
