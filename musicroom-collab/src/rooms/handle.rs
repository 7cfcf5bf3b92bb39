use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::{
    resolve_tracks, ExportedState, MetadataResolver, RoomError, RoomId, RoomSignal, SignalLog,
    SignalOutcome, TrackId, UserSummary,
};

use super::controller::RoomMessage;

/// A handle to a running room. All signals and queries for the room go through it.
///
/// Signals sent to a terminated room are dropped, and queries fail.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomMessage>,
    metadata: Arc<dyn MetadataResolver>,
}

impl RoomHandle {
    pub(crate) fn new(
        room_id: RoomId,
        sender: mpsc::Sender<RoomMessage>,
        metadata: Arc<dyn MetadataResolver>,
    ) -> Self {
        Self {
            room_id,
            sender,
            metadata,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.room_id
    }

    /// Whether the room stopped accepting signals
    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a signal to the room and waits until it has been applied.
    pub async fn signal(&self, signal: RoomSignal) -> Result<SignalOutcome, RoomError> {
        let (reply, receiver) = oneshot::channel();

        if self
            .sender
            .send(RoomMessage::Signal { signal, reply })
            .await
            .is_err()
        {
            return Ok(SignalOutcome::Dropped);
        }

        receiver.await.unwrap_or(Ok(SignalOutcome::Dropped))
    }

    async fn query<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, RoomError> {
        let (reply, receiver) = oneshot::channel();
        let terminated = || RoomError::Terminated(self.room_id.clone());

        self.sender
            .send(message(reply))
            .await
            .map_err(|_| terminated())?;

        receiver.await.map_err(|_| terminated())
    }

    pub async fn play(&self, user_id: &str) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::Play {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn pause(&self, user_id: &str) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::Pause {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn go_to_next_track(&self, user_id: &str) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::GoToNextTrack {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn join(
        &self,
        user_id: &str,
        device_id: &str,
        invited: bool,
    ) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::Join {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            invited,
        })
        .await
    }

    pub async fn leave(&self, user_id: &str) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::Leave {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn vote_for_track(
        &self,
        user_id: &str,
        track_id: &str,
    ) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::VoteForTrack {
            user_id: user_id.to_string(),
            track_id: track_id.to_string(),
        })
        .await
    }

    /// Resolves the tracks, then suggests them to the room.
    /// Tracks that can't be resolved are reported as failed suggestions.
    pub async fn suggest_tracks(
        &self,
        user_id: &str,
        device_id: &str,
        track_ids: &[TrackId],
    ) -> Result<SignalOutcome, RoomError> {
        let resolution = resolve_tracks(&*self.metadata, track_ids).await;

        self.signal(RoomSignal::SuggestTracks {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            tracks: resolution.resolved,
            unresolved_track_ids: resolution.unresolved,
        })
        .await
    }

    pub async fn change_emitting_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::ChangeEmittingDevice {
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
        })
        .await
    }

    pub async fn update_user_fits_position_constraint(
        &self,
        user_id: &str,
        fits: bool,
    ) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::UpdateUserFitsPositionConstraint {
            user_id: user_id.to_string(),
            fits,
        })
        .await
    }

    pub async fn update_delegation_owner(
        &self,
        emitter_user_id: &str,
        new_owner_user_id: &str,
    ) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::UpdateDelegationOwner {
            emitter_user_id: emitter_user_id.to_string(),
            new_owner_user_id: new_owner_user_id.to_string(),
        })
        .await
    }

    pub async fn update_control_and_delegation_permission(
        &self,
        emitter_user_id: &str,
        target_user_id: &str,
        has_permission: bool,
    ) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::UpdateControlAndDelegationPermission {
            emitter_user_id: emitter_user_id.to_string(),
            target_user_id: target_user_id.to_string(),
            has_permission,
        })
        .await
    }

    pub async fn terminate(&self) -> Result<SignalOutcome, RoomError> {
        self.signal(RoomSignal::Terminate).await
    }

    /// Returns the committed state of the room, with the information related to the user if given
    pub async fn get_state(&self, user_id: Option<&str>) -> Result<ExportedState, RoomError> {
        let user_id = user_id.map(str::to_string);

        self.query(|reply| RoomMessage::State { user_id, reply }).await
    }

    pub async fn get_users_list(&self) -> Result<Vec<UserSummary>, RoomError> {
        self.query(|reply| RoomMessage::Users { reply }).await
    }

    /// Returns a copy of every input the room processed so far
    pub async fn signal_log(&self) -> Result<SignalLog, RoomError> {
        self.query(|reply| RoomMessage::Log { reply }).await
    }
}
