mod scripted;
mod timer;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

pub use scripted::*;
pub use timer::*;

use crate::Id;

pub type ClockHandleId = Id<ClockHandle>;

/// Represents a type that can time the playback of a single track.
///
/// A room starts the clock whenever a track begins or resumes, and suspends on the
/// returned [ClockHandle] until the track runs out or the room asks it to stop.
pub trait PlaybackClock
where
    Self: Send + Sync + 'static,
{
    /// Starts timing a track of `duration`, of which `offset` has already been played.
    fn start(&self, duration: Duration, offset: Duration) -> Result<ClockHandle, ClockError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("Playback clock is unavailable: {0}")]
    Unavailable(String),
    #[error("Playback clock stopped without reporting")]
    Dropped,
}

/// How a clock run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockStatus {
    /// The whole track was played.
    Finished,
    /// The clock was asked to stop before the track ended.
    Interrupted,
}

/// What a clock reports when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockReport {
    pub status: ClockStatus,
    /// How much of the track has been played in total, including the starting offset.
    pub elapsed: Duration,
}

impl ClockReport {
    pub fn finished(duration: Duration) -> Self {
        Self {
            status: ClockStatus::Finished,
            elapsed: duration,
        }
    }

    pub fn interrupted(elapsed: Duration) -> Self {
        Self {
            status: ClockStatus::Interrupted,
            elapsed,
        }
    }
}

/// A running clock. Dropping the handle abandons the clock without waiting for it.
#[derive(Debug)]
pub struct ClockHandle {
    pub id: ClockHandleId,
    report: oneshot::Receiver<ClockReport>,
    interrupt: Option<oneshot::Sender<()>>,
}

impl ClockHandle {
    /// Creates a handle from the channel the clock reports on,
    /// and the one it listens to for interruptions.
    pub fn new(
        report: oneshot::Receiver<ClockReport>,
        interrupt: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            id: ClockHandleId::new(),
            report,
            interrupt,
        }
    }

    /// Creates a handle that has already stopped with the given report.
    pub fn ready(report: ClockReport) -> Self {
        let (sender, receiver) = oneshot::channel();

        // The receiver is alive right here, so this can't fail
        let _ = sender.send(report);

        Self::new(receiver, None)
    }

    /// Waits for the clock to stop on its own.
    ///
    /// This is cancel safe, and must not be called again once it returned.
    pub async fn wait(&mut self) -> Result<ClockReport, ClockError> {
        (&mut self.report).await.map_err(|_| ClockError::Dropped)
    }

    /// Asks the clock to stop early and returns what it played.
    ///
    /// If the track ran out before the request arrived, the report says so.
    pub async fn interrupt(mut self) -> Result<ClockReport, ClockError> {
        if let Some(interrupt) = self.interrupt.take() {
            // An error means the clock already stopped and the report is waiting
            let _ = interrupt.send(());
        }

        self.report.await.map_err(|_| ClockError::Dropped)
    }
}
