use thiserror::Error;

use crate::{RoomId, TrackId, UserId};

/// Why a room refused a signal or a query. A refused signal never changes the room.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("User {user_id} is not allowed to {action}")]
    PermissionDenied {
        user_id: UserId,
        action: &'static str,
    },
    #[error("Room {0} has been terminated")]
    Terminated(RoomId),
    #[error("Room {0} doesn't exist")]
    NotFound(RoomId),
}

/// A signal or room definition that doesn't make sense for the room it targets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Room name must not be blank")]
    BlankName,
    #[error("Minimum score to be played must be at least 1")]
    InvalidMinimumScore,
    #[error("Constraint window must start before it ends")]
    InvalidConstraintWindow,
    #[error("User {0} is not in the room")]
    UnknownUser(UserId),
    #[error("Track {0} is neither queued nor suggested")]
    UnknownTrack(TrackId),
    #[error("Room has no physical and time constraints")]
    NoPositionConstraints,
    #[error("Room is not in delegated playing mode")]
    NotDelegated,
    #[error("The creator can't leave their room")]
    CreatorCannotLeave,
    #[error("No tracks to suggest")]
    NoTracksToSuggest,
}

impl RoomError {
    pub(crate) fn denied(user_id: &UserId, action: &'static str) -> Self {
        Self::PermissionDenied {
            user_id: user_id.clone(),
            action,
        }
    }
}
