use musicroom_core::ClockReport;
use serde::{Deserialize, Serialize};

use crate::{DeviceId, TrackId, TrackMetadata, UserId};

/// A request to change a room, delivered into the room's ordered signal stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RoomSignal {
    Play {
        user_id: UserId,
    },
    Pause {
        user_id: UserId,
    },
    GoToNextTrack {
        user_id: UserId,
    },
    Join {
        user_id: UserId,
        device_id: DeviceId,
        invited: bool,
    },
    Leave {
        user_id: UserId,
    },
    VoteForTrack {
        user_id: UserId,
        track_id: TrackId,
    },
    /// Tracks are resolved before the signal is sent, so the room never waits on lookups.
    SuggestTracks {
        user_id: UserId,
        device_id: DeviceId,
        tracks: Vec<TrackMetadata>,
        /// Ids the metadata lookup knew nothing about
        unresolved_track_ids: Vec<TrackId>,
    },
    ChangeEmittingDevice {
        user_id: UserId,
        device_id: DeviceId,
    },
    UpdateUserFitsPositionConstraint {
        user_id: UserId,
        fits: bool,
    },
    UpdateDelegationOwner {
        emitter_user_id: UserId,
        new_owner_user_id: UserId,
    },
    UpdateControlAndDelegationPermission {
        emitter_user_id: UserId,
        target_user_id: UserId,
        has_permission: bool,
    },
    Terminate,
}

/// Anything a room state machine reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RoomInput {
    Signal { signal: RoomSignal },
    /// The running clock stopped
    Clock { report: ClockReport },
    /// The clock could not be started, or stopped without reporting
    ClockFailed {
        reason: String,
        /// Whether the clock had been running before it failed
        #[serde(default)]
        started: bool,
    },
}

/// What a signal did to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalOutcome {
    /// The room changed
    Applied,
    /// The signal was valid, but there was nothing to do
    NoEffect,
    /// Nothing in the signal could be applied. The sender is still notified about it.
    Rejected,
    /// The room was terminated and ignored the signal
    Dropped,
}

impl RoomSignal {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause { .. } => "pause",
            Self::GoToNextTrack { .. } => "go-to-next-track",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::VoteForTrack { .. } => "vote-for-track",
            Self::SuggestTracks { .. } => "suggest-tracks",
            Self::ChangeEmittingDevice { .. } => "change-emitting-device",
            Self::UpdateUserFitsPositionConstraint { .. } => "update-user-fits-position-constraint",
            Self::UpdateDelegationOwner { .. } => "update-delegation-owner",
            Self::UpdateControlAndDelegationPermission { .. } => {
                "update-control-and-delegation-permission"
            }
            Self::Terminate => "terminate",
        }
    }
}

impl From<RoomSignal> for RoomInput {
    fn from(signal: RoomSignal) -> Self {
        Self::Signal { signal }
    }
}

impl From<ClockReport> for RoomInput {
    fn from(report: ClockReport) -> Self {
        Self::Clock { report }
    }
}
