use crossbeam::channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::{DeviceId, ExportedState, RoomId, UserId};

pub type NotificationSender = Sender<RoomNotification>;
pub type NotificationReceiver = Receiver<RoomNotification>;

/// The event a notification is named after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A room was created and is ready for signals
    CreationAcknowledged,
    /// A room started playing, or moved on to another track while playing
    Play,
    /// A room stopped playing
    Pause,
    UserJoined,
    UserLeft,
    VoteAcknowledged,
    SuggestionAcknowledged,
    /// Some or all suggested tracks were refused
    SuggestionFailed,
    UserLengthChanged,
    DeviceChanged,
    PositionConstraintAcknowledged,
    DelegationOwnerAcknowledged,
    PermissionAcknowledged,
}

/// A push of the latest state of a room, sent after every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNotification {
    pub kind: NotificationKind,
    pub room_id: RoomId,
    /// The user that caused the notification, if any
    pub user_id: Option<UserId>,
    pub device_id: Option<DeviceId>,
    pub state: ExportedState,
}

/// Represents a type that delivers room notifications to subscribers.
///
/// Delivery is fire-and-forget. Implementations must not block the caller,
/// and take care of retrying by themselves.
pub trait NotificationPort
where
    Self: Send + Sync + 'static,
{
    fn notify(&self, notification: RoomNotification);
}

impl NotificationKind {
    /// The path segment this kind of notification is delivered to
    pub fn route(&self) -> &'static str {
        match self {
            Self::CreationAcknowledged => "creation-acknowledged",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::UserJoined => "user-joined",
            Self::UserLeft => "user-left",
            Self::VoteAcknowledged => "vote-acknowledged",
            Self::SuggestionAcknowledged => "suggestion-acknowledged",
            Self::SuggestionFailed => "suggestion-failed",
            Self::UserLengthChanged => "user-length-changed",
            Self::DeviceChanged => "device-changed",
            Self::PositionConstraintAcknowledged => "position-constraint-acknowledged",
            Self::DelegationOwnerAcknowledged => "delegation-owner-acknowledged",
            Self::PermissionAcknowledged => "permission-acknowledged",
        }
    }
}
