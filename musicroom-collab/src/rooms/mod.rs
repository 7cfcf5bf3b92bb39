mod constraints;
mod controller;
mod data;
mod export;
mod handle;
mod machine;
mod permissions;
mod signal;
mod signal_log;
mod votes;

use chrono::Utc;
use log::info;
use tokio::sync::mpsc;

use crate::{resolve_tracks, util::random_string, CollabContext, RoomError};

pub use constraints::*;
pub use data::*;
pub use export::*;
pub use handle::*;
pub use machine::*;
pub use permissions::*;
pub use signal::*;
pub use signal_log::*;
pub use votes::*;

use controller::RoomController;

const ROOM_ID_LENGTH: usize = 16;

pub struct RoomManager {
    context: CollabContext,
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room and starts running it.
    ///
    /// Initial tracks that can't be resolved are left out of the queue.
    pub async fn create_room(&self, new_room: NewRoom) -> Result<RoomHandle, RoomError> {
        let config = &self.context.config;
        let (parameters, track_ids) =
            new_room.into_parameters(random_string(ROOM_ID_LENGTH), config);

        parameters.validate()?;

        let resolution = resolve_tracks(&*self.context.metadata, &track_ids).await;
        let rules = RoomRules::from(config);

        let machine = RoomMachine::new(parameters.clone(), resolution.resolved.clone(), rules)?;
        let log = SignalLog::new(Utc::now(), parameters, resolution.resolved, rules);

        let (sender, receiver) = mpsc::channel(config.signal_buffer_size.max(1));
        let handle = RoomHandle::new(
            machine.id().clone(),
            sender,
            self.context.metadata.clone(),
        );

        info!(
            "Creating room {} with {} queued tracks",
            machine.id(),
            machine.ledger().queue().len()
        );

        let controller = RoomController::new(&self.context, machine, log, receiver);

        self.context.rooms.insert(handle.id().clone(), handle.clone());
        tokio::spawn(controller.run());

        Ok(handle)
    }

    /// Returns the room with the given id, if it is running
    pub fn get(&self, room_id: &str) -> Result<RoomHandle, RoomError> {
        self.context
            .rooms
            .get(room_id)
            .map(|r| r.clone())
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))
    }

    /// Get all running rooms
    pub fn list_all(&self) -> Vec<RoomHandle> {
        self.context.rooms.iter().map(|r| r.clone()).collect()
    }
}
