mod errors;
mod events;
mod metadata;
mod notifiers;
mod rooms;
mod track;
mod util;

use std::sync::Arc;

use dashmap::DashMap;
use musicroom_core::{Config, PlaybackClock};

pub use errors::*;
pub use events::*;
pub use metadata::*;
pub use notifiers::*;
pub use rooms::*;
pub use track::*;

// Reduces verbosity
type Store<Id, T> = Arc<DashMap<Id, T>>;

/// The musicroom collab system, hosting listening rooms and wiring them to their collaborators.
pub struct Collab {
    context: CollabContext,

    pub rooms: RoomManager,
}

/// A type passed to various components of the collab system, to access state and external ports.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Config,

    pub clock: Arc<dyn PlaybackClock>,
    pub notifier: Arc<dyn NotificationPort>,
    pub metadata: Arc<dyn MetadataResolver>,

    pub rooms: Store<RoomId, RoomHandle>,
}

impl Collab {
    pub fn new(
        config: Config,
        clock: Arc<dyn PlaybackClock>,
        notifier: Arc<dyn NotificationPort>,
        metadata: Arc<dyn MetadataResolver>,
    ) -> Self {
        let context = CollabContext {
            config,
            clock,
            notifier,
            metadata,

            rooms: Default::default(),
        };

        let room_manager = RoomManager::new(&context);

        Self {
            context,
            rooms: room_manager,
        }
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }
}
