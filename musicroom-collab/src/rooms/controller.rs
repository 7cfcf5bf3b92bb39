use std::{collections::VecDeque, sync::Arc};

use chrono::Utc;
use log::{debug, info, warn};
use musicroom_core::{ClockError, ClockHandle, ClockReport, PlaybackClock};
use tokio::sync::{mpsc, oneshot};

use crate::{
    CollabContext, Effect, ExportedState, Notice, NotificationKind, NotificationPort, RoomError,
    RoomHandle, RoomId, RoomInput, RoomMachine, RoomNotification, RoomSignal, SignalLog,
    SignalOutcome, Store, UserId, UserSummary,
};

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// A message sent to the task running a room
#[derive(Debug)]
pub(crate) enum RoomMessage {
    Signal {
        signal: RoomSignal,
        reply: Reply<Result<SignalOutcome, RoomError>>,
    },
    State {
        user_id: Option<UserId>,
        reply: Reply<ExportedState>,
    },
    Users {
        reply: Reply<Vec<UserSummary>>,
    },
    Log {
        reply: Reply<SignalLog>,
    },
}

/// Runs a single room. Owns the room's state, its running clock, and its signal log,
/// and handles one message at a time.
pub(crate) struct RoomController {
    room_id: RoomId,
    machine: RoomMachine,
    log: SignalLog,
    /// The running clock, if the room is playing
    clock: Option<ClockHandle>,
    messages: mpsc::Receiver<RoomMessage>,

    playback_clock: Arc<dyn PlaybackClock>,
    notifier: Arc<dyn NotificationPort>,
    rooms: Store<RoomId, RoomHandle>,
}

enum Wakeup {
    Clock(Result<ClockReport, ClockError>),
    Message(Option<RoomMessage>),
}

impl RoomController {
    pub fn new(
        context: &CollabContext,
        machine: RoomMachine,
        log: SignalLog,
        messages: mpsc::Receiver<RoomMessage>,
    ) -> Self {
        Self {
            room_id: machine.id().clone(),
            machine,
            log,
            clock: None,
            messages,
            playback_clock: context.clock.clone(),
            notifier: context.notifier.clone(),
            rooms: context.rooms.clone(),
        }
    }

    /// Handles messages and clock reports until the room is terminated,
    /// or every handle to it is gone.
    pub async fn run(mut self) {
        info!("Room {} is ready", self.room_id);
        self.notify(vec![self.machine.creation_notice()]);

        while !self.machine.is_terminated() {
            let wakeup = match &mut self.clock {
                Some(clock) => {
                    tokio::select! {
                        biased;
                        report = clock.wait() => Wakeup::Clock(report),
                        message = self.messages.recv() => Wakeup::Message(message),
                    }
                }
                None => Wakeup::Message(self.messages.recv().await),
            };

            match wakeup {
                Wakeup::Clock(report) => {
                    self.clock = None;

                    let input = match report {
                        Ok(report) => report.into(),
                        Err(error) => clock_failed(&self.room_id, error, true),
                    };

                    let _ = self.process(input).await;
                }
                Wakeup::Message(Some(message)) => self.handle_message(message).await,
                Wakeup::Message(None) => break,
            }
        }

        self.rooms.remove(&self.room_id);
        info!("Room {} stopped", self.room_id);
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        // A closed reply channel only means the sender stopped waiting
        match message {
            RoomMessage::Signal { signal, reply } => {
                let name = signal.name();
                let result = self.process(signal.into()).await;

                match &result {
                    Ok(outcome) => debug!("Room {}: {} -> {:?}", self.room_id, name, outcome),
                    Err(error) => debug!("Room {}: {} refused: {}", self.room_id, name, error),
                }

                let _ = reply.send(result);
            }
            RoomMessage::State { user_id, reply } => {
                let _ = reply.send(self.machine.export(Utc::now(), user_id.as_ref()));
            }
            RoomMessage::Users { reply } => {
                let _ = reply.send(self.machine.users_list());
            }
            RoomMessage::Log { reply } => {
                let _ = reply.send(self.log.clone());
            }
        }
    }

    /// Applies an input, and every input that follows from it, before notifying anyone.
    ///
    /// Returns what happened to the first input.
    async fn process(&mut self, input: RoomInput) -> Result<SignalOutcome, RoomError> {
        let mut pending = VecDeque::from([input]);
        let mut notices = vec![];
        let mut first = None;

        while let Some(input) = pending.pop_front() {
            let at = Utc::now();

            if matches!(input, RoomInput::ClockFailed { started: false, .. }) {
                // The room never got to play
                notices.retain(|n: &Notice| n.kind != NotificationKind::Play);
            }

            // Refused inputs leave the room untouched, so replay doesn't need them
            let transition = match self.machine.apply(&input, at) {
                Ok(transition) => transition,
                Err(error) => {
                    first.get_or_insert(Err(error));
                    continue;
                }
            };

            self.log.append(at, input);

            first.get_or_insert(Ok(transition.outcome));

            for effect in transition.effects {
                match effect {
                    Effect::Notify(notice) => notices.push(notice),
                    Effect::StartClock { duration, offset } => {
                        match self.playback_clock.start(duration, offset) {
                            Ok(handle) => {
                                debug!(
                                    "Room {} started clock {} at {:?} of {:?}",
                                    self.room_id, handle.id, offset, duration
                                );
                                self.clock = Some(handle);
                            }
                            Err(error) => {
                                pending.push_back(clock_failed(&self.room_id, error, false))
                            }
                        }
                    }
                    Effect::InterruptClock => {
                        if let Some(handle) = self.clock.take() {
                            let input = match handle.interrupt().await {
                                Ok(report) => report.into(),
                                Err(error) => clock_failed(&self.room_id, error, true),
                            };

                            pending.push_back(input);
                        }
                    }
                    Effect::AbandonClock => {
                        if let Some(handle) = self.clock.take() {
                            debug!("Room {} abandoned clock {}", self.room_id, handle.id);
                        }
                    }
                }
            }
        }

        if self.machine.is_terminated() {
            info!("Room {} terminated", self.room_id);
        }

        self.notify(notices);

        first.unwrap_or(Ok(SignalOutcome::NoEffect))
    }

    /// Sends a notification with the committed state for every notice
    fn notify(&self, notices: Vec<Notice>) {
        let at = Utc::now();

        for notice in notices {
            let state = self.machine.export(at, notice.user_id.as_ref());

            self.notifier.notify(RoomNotification {
                kind: notice.kind,
                room_id: self.room_id.clone(),
                user_id: notice.user_id,
                device_id: notice.device_id,
                state,
            });
        }
    }
}

fn clock_failed(room_id: &RoomId, error: ClockError, started: bool) -> RoomInput {
    warn!("Clock of room {} failed: {}", room_id, error);

    RoomInput::ClockFailed {
        reason: error.to_string(),
        started,
    }
}
