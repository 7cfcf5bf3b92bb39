use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use musicroom_core::{ClockReport, ClockStatus};

use crate::{
    DeviceId, ExportedState, ExposedCurrentTrack, ExposedTrack, NotificationKind,
    PermissionRegistry, PositionConstraintGate, RoomError, RoomId, RoomInput, RoomLifecycle,
    RoomParameters, RoomRules, RoomSignal, RoomUser, SignalOutcome, Track, TrackId, TrackMetadata,
    UserId, UserRelatedInformation, UserSummary, ValidationError, VoteLedger, VoteResult,
};

/// The state of a single room, and the rules for how signals change it.
///
/// The machine never waits on anything. Starting and stopping the playback clock is
/// requested through [Effect]s, and whatever the clock reports comes back as a [RoomInput].
/// Applying the same inputs at the same times always leads to the same state.
#[derive(Debug, Clone)]
pub struct RoomMachine {
    parameters: RoomParameters,
    rules: RoomRules,
    lifecycle: RoomLifecycle,
    ledger: VoteLedger,
    permissions: PermissionRegistry,
    gate: PositionConstraintGate,
    /// Index of the current track in the queue, set whenever the queue isn't empty
    cursor: Option<usize>,
    /// How much of the current track was played when the clock was last started or stopped
    elapsed: Duration,
    /// Set exactly while the room is playing
    clock: Option<ClockRun>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClockRun {
    started_at: DateTime<Utc>,
    /// Set once a pause has been requested and the clock was asked to stop
    paused_by: Option<UserId>,
}

/// Something the owner of a machine must do after applying an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Notice),
    /// Start the playback clock for the current track
    StartClock { duration: Duration, offset: Duration },
    /// Ask the running clock to stop, and apply what it reports
    InterruptClock,
    /// Forget about the running clock without waiting for it
    AbandonClock,
}

/// A notification to send once the input has been fully applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NotificationKind,
    pub user_id: Option<UserId>,
    pub device_id: Option<DeviceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub outcome: SignalOutcome,
    /// Effects in the order they must be carried out
    pub effects: Vec<Effect>,
}

impl Notice {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            kind,
            user_id: None,
            device_id: None,
        }
    }

    pub fn from_user(kind: NotificationKind, user_id: &UserId, device_id: &DeviceId) -> Self {
        Self {
            kind,
            user_id: Some(user_id.clone()),
            device_id: Some(device_id.clone()),
        }
    }
}

impl Transition {
    fn new(outcome: SignalOutcome) -> Self {
        Self {
            outcome,
            effects: vec![],
        }
    }

    fn applied() -> Self {
        Self::new(SignalOutcome::Applied)
    }

    fn no_effect() -> Self {
        Self::new(SignalOutcome::NoEffect)
    }

    fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn notify(&mut self, notice: Notice) {
        self.push(Effect::Notify(notice));
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Notify(notice) => Some(notice),
            _ => None,
        })
    }
}

impl RoomMachine {
    /// Creates a paused room at the start of its initial queue.
    pub fn new(
        parameters: RoomParameters,
        tracks: Vec<TrackMetadata>,
        rules: RoomRules,
    ) -> Result<Self, RoomError> {
        parameters.validate()?;

        let creator = RoomUser::new(
            parameters.creator_user_id.clone(),
            parameters.creator_device_id.clone(),
            true,
        );

        let permissions = PermissionRegistry::new(creator, parameters.playing_mode);
        let ledger = VoteLedger::new(parameters.minimum_score_to_be_played, tracks);
        let gate = PositionConstraintGate::new(
            parameters.physical_and_time_constraints,
            rules.constraint_enforcement,
        );

        Ok(Self {
            cursor: (!ledger.queue().is_empty()).then_some(0),
            elapsed: Duration::ZERO,
            lifecycle: RoomLifecycle::Paused,
            clock: None,
            parameters,
            rules,
            ledger,
            permissions,
            gate,
        })
    }

    pub fn id(&self) -> &RoomId {
        &self.parameters.room_id
    }

    pub fn parameters(&self) -> &RoomParameters {
        &self.parameters
    }

    pub fn rules(&self) -> RoomRules {
        self.rules
    }

    pub fn lifecycle(&self) -> RoomLifecycle {
        self.lifecycle
    }

    pub fn is_terminated(&self) -> bool {
        self.lifecycle == RoomLifecycle::Terminated
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The elapsed time of the current track, as of the last clock start or stop
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn permissions(&self) -> &PermissionRegistry {
        &self.permissions
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.cursor.and_then(|c| self.ledger.queue().get(c))
    }

    fn next_track(&self) -> Option<&Track> {
        self.cursor.and_then(|c| self.ledger.queue().get(c + 1))
    }

    /// The notice announcing that the room exists
    pub fn creation_notice(&self) -> Notice {
        Notice::from_user(
            NotificationKind::CreationAcknowledged,
            &self.parameters.creator_user_id,
            &self.parameters.creator_device_id,
        )
    }

    /// Applies an input that arrived at the given time.
    ///
    /// An error means the input was refused and the room is unchanged.
    pub fn apply(
        &mut self,
        input: &RoomInput,
        at: DateTime<Utc>,
    ) -> Result<Transition, RoomError> {
        if self.is_terminated() {
            debug!("Room {} is terminated, dropping input", self.id());
            return Ok(Transition::new(SignalOutcome::Dropped));
        }

        match input {
            RoomInput::Signal { signal } => self.apply_signal(signal, at),
            RoomInput::Clock { report } => Ok(self.apply_report(*report, at)),
            RoomInput::ClockFailed { reason, started } => {
                debug!("Room {} lost its clock: {}", self.id(), reason);
                Ok(self.force_pause(at, *started))
            }
        }
    }

    fn apply_signal(
        &mut self,
        signal: &RoomSignal,
        at: DateTime<Utc>,
    ) -> Result<Transition, RoomError> {
        match signal {
            RoomSignal::Play { user_id } => self.play(user_id, at),
            RoomSignal::Pause { user_id } => self.pause(user_id),
            RoomSignal::GoToNextTrack { user_id } => self.go_to_next_track(user_id, at),
            RoomSignal::Join {
                user_id,
                device_id,
                invited,
            } => Ok(self.join(user_id, device_id, *invited)),
            RoomSignal::Leave { user_id } => self.leave(user_id),
            RoomSignal::VoteForTrack { user_id, track_id } => {
                self.vote_for_track(user_id, track_id, at)
            }
            RoomSignal::SuggestTracks {
                user_id,
                device_id,
                tracks,
                unresolved_track_ids,
            } => self.suggest_tracks(user_id, device_id, tracks, unresolved_track_ids, at),
            RoomSignal::ChangeEmittingDevice { user_id, device_id } => {
                self.change_emitting_device(user_id, device_id)
            }
            RoomSignal::UpdateUserFitsPositionConstraint { user_id, fits } => {
                self.update_user_fits_position_constraint(user_id, *fits)
            }
            RoomSignal::UpdateDelegationOwner {
                emitter_user_id,
                new_owner_user_id,
            } => self.update_delegation_owner(emitter_user_id, new_owner_user_id),
            RoomSignal::UpdateControlAndDelegationPermission {
                emitter_user_id,
                target_user_id,
                has_permission,
            } => self.update_permission(emitter_user_id, target_user_id, *has_permission),
            RoomSignal::Terminate => Ok(self.terminate()),
        }
    }

    fn play(&mut self, user_id: &UserId, at: DateTime<Utc>) -> Result<Transition, RoomError> {
        self.permissions.ensure_can_control(user_id)?;

        let Some(duration) = self.current_track().map(Track::duration) else {
            return Ok(Transition::no_effect());
        };

        if self.lifecycle == RoomLifecycle::Playing {
            return Ok(Transition::no_effect());
        }

        let mut transition = Transition::applied();
        self.start_playing(&mut transition, at, duration, Some(user_id));

        Ok(transition)
    }

    fn pause(&mut self, user_id: &UserId) -> Result<Transition, RoomError> {
        self.permissions.ensure_can_control(user_id)?;

        match &mut self.clock {
            Some(run) if run.paused_by.is_none() => {
                run.paused_by = Some(user_id.clone());

                let mut transition = Transition::applied();
                transition.push(Effect::InterruptClock);

                Ok(transition)
            }
            _ => Ok(Transition::no_effect()),
        }
    }

    fn go_to_next_track(
        &mut self,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<Transition, RoomError> {
        self.permissions.ensure_can_control(user_id)?;

        let Some(duration) = self.next_track().map(Track::duration) else {
            return Ok(Transition::no_effect());
        };

        let mut transition = Transition::applied();

        if self.clock.take().is_some() {
            transition.push(Effect::AbandonClock);
        }

        self.advance_cursor();
        self.start_playing(&mut transition, at, duration, Some(user_id));

        Ok(transition)
    }

    fn terminate(&mut self) -> Transition {
        let mut transition = Transition::applied();

        if self.clock.take().is_some() {
            transition.push(Effect::AbandonClock);
        }

        self.lifecycle = RoomLifecycle::Terminated;
        transition
    }

    /// Continues after the clock stopped.
    fn apply_report(&mut self, report: ClockReport, at: DateTime<Utc>) -> Transition {
        let duration = self.current_track().map(Track::duration);

        let (Some(duration), Some(run)) = (duration, self.clock.clone()) else {
            debug!("Room {} is not playing, ignoring clock report", self.id());
            return Transition::new(SignalOutcome::Dropped);
        };

        let moves_backwards =
            report.status == ClockStatus::Interrupted && report.elapsed < self.elapsed;

        if report.elapsed > duration || moves_backwards {
            warn!("Room {} got an invalid clock report: {:?}", self.id(), report);
            return self.force_pause(at, true);
        }

        self.clock = None;

        let mut transition = Transition::applied();

        match report.status {
            ClockStatus::Interrupted => {
                self.elapsed = report.elapsed;
                self.stop_playing(&mut transition, run.paused_by.as_ref());
            }
            ClockStatus::Finished => match (self.next_track().map(Track::duration), run.paused_by) {
                (Some(next_duration), None) => {
                    self.advance_cursor();
                    self.start_playing(&mut transition, at, next_duration, None);
                }
                // The track ran out while the pause was on its way
                (Some(_), Some(paused_by)) => {
                    self.advance_cursor();
                    self.stop_playing(&mut transition, Some(&paused_by));
                }
                (None, paused_by) => {
                    self.elapsed = duration;
                    self.stop_playing(&mut transition, paused_by.as_ref());
                }
            },
        }

        transition
    }

    /// Pauses with the best known elapsed time after the clock failed.
    ///
    /// Only a clock that was running has played anything since it was started.
    fn force_pause(&mut self, at: DateTime<Utc>, started: bool) -> Transition {
        if self.clock.is_none() {
            return Transition::no_effect();
        }

        if started {
            self.elapsed = self.elapsed_at(at);
        }

        let paused_by = self.clock.take().and_then(|run| run.paused_by);
        let mut transition = Transition::applied();
        self.stop_playing(&mut transition, paused_by.as_ref());

        transition
    }

    fn start_playing(
        &mut self,
        transition: &mut Transition,
        at: DateTime<Utc>,
        duration: Duration,
        user_id: Option<&UserId>,
    ) {
        self.lifecycle = RoomLifecycle::Playing;
        self.clock = Some(ClockRun {
            started_at: at,
            paused_by: None,
        });

        transition.push(Effect::StartClock {
            duration,
            offset: self.elapsed,
        });
        transition.notify(self.notice(NotificationKind::Play, user_id));
    }

    fn stop_playing(&mut self, transition: &mut Transition, user_id: Option<&UserId>) {
        self.lifecycle = RoomLifecycle::Paused;
        self.clock = None;

        transition.notify(self.notice(NotificationKind::Pause, user_id));
    }

    fn advance_cursor(&mut self) {
        self.cursor = self.cursor.map(|c| c + 1);
        self.elapsed = Duration::ZERO;
    }

    /// Points the cursor at the first track once the queue stops being empty.
    fn sync_cursor(&mut self) {
        if self.cursor.is_none() && !self.ledger.queue().is_empty() {
            self.cursor = Some(0);
            self.elapsed = Duration::ZERO;
        }
    }

    /// How much of the current track has been played at the given time
    fn elapsed_at(&self, at: DateTime<Utc>) -> Duration {
        let Some(run) = &self.clock else {
            return self.elapsed;
        };

        let played = (at - run.started_at).to_std().unwrap_or_default();
        let duration = self
            .current_track()
            .map(Track::duration)
            .unwrap_or_default();

        (self.elapsed + played).min(duration)
    }

    fn join(&mut self, user_id: &UserId, device_id: &DeviceId, invited: bool) -> Transition {
        let mut user = RoomUser::new(user_id.clone(), device_id.clone(), invited);
        user.tracks_voted_for = self.ledger.votes_of(user_id);

        if !self.permissions.join(user) {
            return Transition::no_effect();
        }

        let mut transition = Transition::applied();
        transition.notify(Notice::from_user(NotificationKind::UserJoined, user_id, device_id));
        transition.notify(Notice::from_user(
            NotificationKind::UserLengthChanged,
            user_id,
            device_id,
        ));

        transition
    }

    fn leave(&mut self, user_id: &UserId) -> Result<Transition, RoomError> {
        let device_id = self.permissions.user(user_id)?.device_id.clone();
        let owner_changed = self.permissions.leave(user_id)?;

        let mut transition = Transition::applied();
        transition.notify(Notice::from_user(NotificationKind::UserLeft, user_id, &device_id));
        transition.notify(Notice::from_user(
            NotificationKind::UserLengthChanged,
            user_id,
            &device_id,
        ));

        if owner_changed {
            transition.notify(Notice::from_user(
                NotificationKind::DelegationOwnerAcknowledged,
                user_id,
                &device_id,
            ));
        }

        Ok(transition)
    }

    fn vote_for_track(
        &mut self,
        user_id: &UserId,
        track_id: &TrackId,
        at: DateTime<Utc>,
    ) -> Result<Transition, RoomError> {
        self.ensure_can_vote(user_id, at)?;

        let voter = self.permissions.user_mut(user_id)?;

        match self.ledger.vote(track_id, voter)? {
            VoteResult::Counted { graduated } => {
                if graduated {
                    self.sync_cursor();
                }

                let mut transition = Transition::applied();
                transition.notify(self.notice(NotificationKind::VoteAcknowledged, Some(user_id)));

                Ok(transition)
            }
            VoteResult::AlreadyVoted | VoteResult::Frozen => Ok(Transition::no_effect()),
        }
    }

    fn suggest_tracks(
        &mut self,
        user_id: &UserId,
        device_id: &DeviceId,
        tracks: &[TrackMetadata],
        unresolved_track_ids: &[TrackId],
        at: DateTime<Utc>,
    ) -> Result<Transition, RoomError> {
        if tracks.is_empty() && unresolved_track_ids.is_empty() {
            return Err(ValidationError::NoTracksToSuggest.into());
        }

        self.ensure_can_vote(user_id, at)?;

        let suggester = self.permissions.user_mut(user_id)?;
        let result = self.ledger.suggest(
            tracks.to_vec(),
            suggester,
            self.rules.suggestion_counts_as_vote,
        );

        if !result.graduated.is_empty() {
            self.sync_cursor();
        }

        let mut transition = if result.accepted.is_empty() {
            Transition::new(SignalOutcome::Rejected)
        } else {
            let mut transition = Transition::applied();
            transition.notify(Notice::from_user(
                NotificationKind::SuggestionAcknowledged,
                user_id,
                device_id,
            ));
            transition
        };

        if !result.rejected.is_empty() || !unresolved_track_ids.is_empty() {
            debug!(
                "Room {} refused suggestions {:?} and could not resolve {:?}",
                self.id(),
                result.rejected,
                unresolved_track_ids
            );

            transition.notify(Notice::from_user(
                NotificationKind::SuggestionFailed,
                user_id,
                device_id,
            ));
        }

        Ok(transition)
    }

    fn change_emitting_device(
        &mut self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Transition, RoomError> {
        let user = self.permissions.user_mut(user_id)?;

        if user.device_id == *device_id {
            return Ok(Transition::no_effect());
        }

        user.device_id = device_id.clone();

        let mut transition = Transition::applied();
        transition.notify(Notice::from_user(NotificationKind::DeviceChanged, user_id, device_id));

        Ok(transition)
    }

    fn update_user_fits_position_constraint(
        &mut self,
        user_id: &UserId,
        fits: bool,
    ) -> Result<Transition, RoomError> {
        let user = self.permissions.user_mut(user_id)?;

        if !self.gate.report_fit(user, fits)? {
            return Ok(Transition::no_effect());
        }

        let mut transition = Transition::applied();
        transition.notify(self.notice(
            NotificationKind::PositionConstraintAcknowledged,
            Some(user_id),
        ));

        Ok(transition)
    }

    fn update_delegation_owner(
        &mut self,
        emitter_user_id: &UserId,
        new_owner_user_id: &UserId,
    ) -> Result<Transition, RoomError> {
        if !self
            .permissions
            .transfer_delegation(emitter_user_id, new_owner_user_id)?
        {
            return Ok(Transition::no_effect());
        }

        let mut transition = Transition::applied();
        transition.notify(self.notice(
            NotificationKind::DelegationOwnerAcknowledged,
            Some(emitter_user_id),
        ));

        Ok(transition)
    }

    fn update_permission(
        &mut self,
        emitter_user_id: &UserId,
        target_user_id: &UserId,
        has_permission: bool,
    ) -> Result<Transition, RoomError> {
        let update =
            self.permissions
                .set_permission(emitter_user_id, target_user_id, has_permission)?;

        if !update.permission_changed {
            return Ok(Transition::no_effect());
        }

        let mut transition = Transition::applied();
        transition.notify(self.notice(
            NotificationKind::PermissionAcknowledged,
            Some(emitter_user_id),
        ));

        if update.owner_changed {
            transition.notify(self.notice(
                NotificationKind::DelegationOwnerAcknowledged,
                Some(emitter_user_id),
            ));
        }

        Ok(transition)
    }

    /// Checks that the user may vote for or suggest tracks at the given time.
    fn ensure_can_vote(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RoomError> {
        let user = self.permissions.user(user_id)?;

        if self.parameters.restricts_voting_to_invited() && !user.user_has_been_invited {
            return Err(RoomError::denied(user_id, "vote without an invitation"));
        }

        if !self.gate.allows(user, at) {
            return Err(RoomError::denied(user_id, "vote outside the position constraints"));
        }

        Ok(())
    }

    /// A notice on behalf of a user, with their current device if they are in the room
    fn notice(&self, kind: NotificationKind, user_id: Option<&UserId>) -> Notice {
        let Some(user_id) = user_id else {
            return Notice::new(kind);
        };

        Notice {
            kind,
            user_id: Some(user_id.clone()),
            device_id: self
                .permissions
                .user(user_id)
                .ok()
                .map(|u| u.device_id.clone()),
        }
    }

    /// Exports the state of the room as seen at the given time, optionally with
    /// the information related to one of its users.
    pub fn export(&self, at: DateTime<Utc>, requesting_user_id: Option<&UserId>) -> ExportedState {
        let users: Vec<_> = self.permissions.users().map(|u| u.user_id.clone()).collect();
        let queue = self.ledger.queue();

        ExportedState {
            room_id: self.parameters.room_id.clone(),
            room_creator_user_id: self.parameters.creator_user_id.clone(),
            name: self.parameters.name.clone(),
            playing: self.lifecycle == RoomLifecycle::Playing,
            playing_mode: self.parameters.playing_mode,
            is_open: self.parameters.is_open,
            is_open_only_invited_users_can_vote: self
                .parameters
                .is_open_only_invited_users_can_vote,
            has_physical_and_time_constraints: self.gate.is_active(),
            physical_and_time_constraints: self.gate.constraints().copied(),
            delegation_owner_user_id: self.permissions.delegation_owner_user_id().cloned(),
            minimum_score_to_be_played: self.ledger.minimum_score_to_be_played(),
            users_length: users.len(),
            users,
            tracks_ids_list: queue.iter().map(|t| t.id().clone()).collect(),
            current_track: self.current_track().map(|track| ExposedCurrentTrack {
                id: track.metadata.id.clone(),
                title: track.metadata.title.clone(),
                artist_name: track.metadata.artist_name.clone(),
                duration: track.metadata.duration_in_ms(),
                elapsed: self.elapsed_at(at).as_millis() as u64,
            }),
            tracks: queue.iter().map(ExposedTrack::from).collect(),
            suggested_tracks: self
                .ledger
                .suggestion_pool()
                .iter()
                .map(ExposedTrack::from)
                .collect(),
            user_related_information: requesting_user_id
                .and_then(|id| self.permissions.user(id).ok())
                .map(UserRelatedInformation::from),
        }
    }

    pub fn users_list(&self) -> Vec<UserSummary> {
        let owner = self.permissions.delegation_owner_user_id();

        self.permissions
            .users()
            .map(|user| UserSummary {
                user_id: user.user_id.clone(),
                device_id: user.device_id.clone(),
                is_creator: user.user_id == self.parameters.creator_user_id,
                is_delegation_owner: owner == Some(&user.user_id),
                has_control_and_delegation_permission: user.has_control_and_delegation_permission,
                user_fits_position_constraint: user.user_fits_position_constraint,
                user_has_been_invited: user.user_has_been_invited,
                votes_count: user.tracks_voted_for.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{ConstraintEnforcement, PhysicalAndTimeConstraints, PlayingMode};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
    }

    fn secs(seconds: u64) -> Duration {
        Duration::from_secs(seconds)
    }

    fn parameters() -> RoomParameters {
        RoomParameters {
            room_id: "room".into(),
            name: "Friday night".into(),
            creator_user_id: "creator".into(),
            creator_device_id: "creator-device".into(),
            minimum_score_to_be_played: 1,
            is_open: false,
            is_open_only_invited_users_can_vote: false,
            physical_and_time_constraints: None,
            playing_mode: PlayingMode::Broadcast,
        }
    }

    fn room_with(parameters: RoomParameters, tracks: &[(&str, u64)]) -> RoomMachine {
        let tracks = tracks
            .iter()
            .map(|(id, seconds)| TrackMetadata::mock(id, *seconds))
            .collect();

        RoomMachine::new(parameters, tracks, RoomRules::default()).unwrap()
    }

    fn room(tracks: &[(&str, u64)]) -> RoomMachine {
        room_with(parameters(), tracks)
    }

    fn send(room: &mut RoomMachine, signal: RoomSignal) -> Result<Transition, RoomError> {
        room.apply(&signal.into(), at(0))
    }

    fn report(room: &mut RoomMachine, report: ClockReport, seconds: i64) -> Transition {
        room.apply(&report.into(), at(seconds)).unwrap()
    }

    fn play(user_id: &str) -> RoomSignal {
        RoomSignal::Play {
            user_id: user_id.into(),
        }
    }

    fn pause(user_id: &str) -> RoomSignal {
        RoomSignal::Pause {
            user_id: user_id.into(),
        }
    }

    fn skip(user_id: &str) -> RoomSignal {
        RoomSignal::GoToNextTrack {
            user_id: user_id.into(),
        }
    }

    fn join(user_id: &str, invited: bool) -> RoomSignal {
        RoomSignal::Join {
            user_id: user_id.into(),
            device_id: format!("{user_id}-device"),
            invited,
        }
    }

    fn kinds(transition: &Transition) -> Vec<NotificationKind> {
        transition.notices().map(|n| n.kind).collect()
    }

    fn start_clock(duration: u64, offset: u64) -> Effect {
        Effect::StartClock {
            duration: secs(duration),
            offset: secs(offset),
        }
    }

    #[test]
    fn scenario_interrupt_then_cascade_to_the_end() {
        let mut room = room(&[("one", 30), ("two", 60)]);

        let state = room.export(at(0), None);
        assert!(!state.playing);
        assert_eq!(state.tracks_ids_list.len(), 2);
        assert_eq!(state.current_track_id().map(String::as_str), Some("one"));

        let started = send(&mut room, play("creator")).unwrap();
        assert_eq!(started.effects[0], start_clock(30, 0));
        assert_eq!(kinds(&started), vec![NotificationKind::Play]);

        let stopped = report(&mut room, ClockReport::interrupted(secs(10)), 10);
        assert_eq!(kinds(&stopped), vec![NotificationKind::Pause]);

        let state = room.export(at(10), None);
        let current = state.current_track.unwrap();
        assert!(!state.playing);
        assert_eq!(current.id, "one");
        assert_eq!(current.elapsed, 10_000);

        let resumed = send(&mut room, play("creator")).unwrap();
        assert_eq!(resumed.effects[0], start_clock(30, 10));

        let advanced = report(&mut room, ClockReport::finished(secs(30)), 30);
        assert_eq!(advanced.effects[0], start_clock(60, 0));
        assert_eq!(kinds(&advanced), vec![NotificationKind::Play]);
        assert_eq!(room.cursor(), Some(1));

        let ended = report(&mut room, ClockReport::finished(secs(60)), 90);
        assert_eq!(kinds(&ended), vec![NotificationKind::Pause]);

        let state = room.export(at(90), None);
        let current = state.current_track.unwrap();
        assert!(!state.playing);
        assert_eq!(current.id, "two");
        assert_eq!(current.elapsed, 60_000);
    }

    #[test]
    fn scenario_skip_from_paused_then_skip_at_end() {
        let mut room = room(&[("one", 30), ("two", 60)]);

        let skipped = send(&mut room, skip("creator")).unwrap();
        assert_eq!(skipped.outcome, SignalOutcome::Applied);
        assert_eq!(skipped.effects[0], start_clock(60, 0));
        assert_eq!(room.lifecycle(), RoomLifecycle::Playing);
        assert_eq!(room.cursor(), Some(1));

        report(&mut room, ClockReport::finished(secs(60)), 60);

        let state = room.export(at(60), None);
        assert!(!state.playing);
        assert_eq!(state.current_track.as_ref().unwrap().elapsed, 60_000);

        let inert = send(&mut room, skip("creator")).unwrap();
        assert_eq!(inert.outcome, SignalOutcome::NoEffect);
        assert!(inert.effects.is_empty());
        assert_eq!(room.export(at(60), None), state);
    }

    #[test]
    fn skipping_while_playing_abandons_the_clock() {
        let mut room = room(&[("one", 30), ("two", 60)]);

        send(&mut room, play("creator")).unwrap();
        let skipped = send(&mut room, skip("creator")).unwrap();

        assert_eq!(
            skipped.effects[..2],
            [Effect::AbandonClock, start_clock(60, 0)]
        );
        assert_eq!(room.elapsed(), Duration::ZERO);
    }

    #[test]
    fn join_adds_a_user() {
        let mut room = room(&[("one", 30)]);

        let joined = send(&mut room, join("u2", false)).unwrap();
        assert_eq!(
            kinds(&joined),
            vec![
                NotificationKind::UserJoined,
                NotificationKind::UserLengthChanged
            ]
        );

        let state = room.export(at(0), None);
        assert_eq!(state.users_length, 2);
        assert!(state.users.contains(&"u2".to_string()));

        let again = send(&mut room, join("u2", false)).unwrap();
        assert_eq!(again.outcome, SignalOutcome::NoEffect);
    }

    #[test]
    fn pause_and_play_are_inert_when_already_there() {
        let mut room = room(&[("one", 30)]);
        let before = room.export(at(0), None);

        let paused = send(&mut room, pause("creator")).unwrap();
        assert_eq!(paused, Transition::no_effect());
        assert_eq!(room.export(at(0), None), before);

        send(&mut room, play("creator")).unwrap();
        let playing = send(&mut room, play("creator")).unwrap();
        assert_eq!(playing, Transition::no_effect());
    }

    #[test]
    fn play_on_an_empty_queue_does_nothing() {
        let mut room = room(&[]);

        assert_eq!(room.cursor(), None);
        assert_eq!(send(&mut room, play("creator")), Ok(Transition::no_effect()));
        assert!(room.export(at(0), None).current_track.is_none());
    }

    #[test]
    fn pause_interrupts_and_waits_for_the_report() {
        let mut room = room(&[("one", 30)]);

        send(&mut room, play("creator")).unwrap();
        let pausing = send(&mut room, pause("creator")).unwrap();

        assert_eq!(pausing.effects, vec![Effect::InterruptClock]);
        assert_eq!(room.lifecycle(), RoomLifecycle::Playing);

        // A second pause doesn't interrupt again
        assert_eq!(send(&mut room, pause("creator")), Ok(Transition::no_effect()));

        let paused = report(&mut room, ClockReport::interrupted(secs(12)), 12);
        let notice = paused.notices().next().unwrap();

        assert_eq!(notice.kind, NotificationKind::Pause);
        assert_eq!(notice.user_id.as_deref(), Some("creator"));
        assert_eq!(room.elapsed(), secs(12));
    }

    #[test]
    fn pause_racing_with_the_end_of_a_track() {
        let mut room = room(&[("one", 30), ("two", 60)]);

        send(&mut room, play("creator")).unwrap();
        send(&mut room, pause("creator")).unwrap();

        let paused = report(&mut room, ClockReport::finished(secs(30)), 30);

        assert_eq!(kinds(&paused), vec![NotificationKind::Pause]);
        assert_eq!(room.lifecycle(), RoomLifecycle::Paused);
        assert_eq!(room.cursor(), Some(1));
        assert_eq!(room.elapsed(), Duration::ZERO);
    }

    #[test]
    fn elapsed_never_moves_backwards() {
        let mut room = room(&[("one", 30)]);

        room.apply(&play("creator").into(), at(0)).unwrap();
        report(&mut room, ClockReport::interrupted(secs(10)), 10);

        room.apply(&play("creator").into(), at(20)).unwrap();
        let forced = report(&mut room, ClockReport::interrupted(secs(5)), 23);

        assert_eq!(kinds(&forced), vec![NotificationKind::Pause]);
        assert_eq!(room.lifecycle(), RoomLifecycle::Paused);
        assert_eq!(room.elapsed(), secs(13));
    }

    #[test]
    fn reports_beyond_the_track_pause_the_room() {
        let mut room = room(&[("one", 30), ("two", 30)]);

        room.apply(&play("creator").into(), at(0)).unwrap();
        report(&mut room, ClockReport::interrupted(secs(45)), 45);

        assert_eq!(room.lifecycle(), RoomLifecycle::Paused);
        assert_eq!(room.cursor(), Some(0));
        assert_eq!(room.elapsed(), secs(30));
    }

    #[test]
    fn clock_failure_keeps_best_known_elapsed() {
        let mut room = room(&[("one", 30)]);

        room.apply(&play("creator").into(), at(0)).unwrap();
        report(&mut room, ClockReport::interrupted(secs(8)), 8);
        room.apply(&play("creator").into(), at(100)).unwrap();

        // The clock stopped without reporting after running for a while
        let failed = room
            .apply(
                &RoomInput::ClockFailed {
                    reason: "dropped".into(),
                    started: true,
                },
                at(104),
            )
            .unwrap();

        assert_eq!(kinds(&failed), vec![NotificationKind::Pause]);
        assert_eq!(room.lifecycle(), RoomLifecycle::Paused);
        assert_eq!(room.elapsed(), secs(12));
    }

    #[test]
    fn clock_failing_to_start_keeps_elapsed() {
        let mut room = room(&[("one", 30)]);

        room.apply(&play("creator").into(), at(0)).unwrap();
        report(&mut room, ClockReport::interrupted(secs(8)), 8);
        room.apply(&play("creator").into(), at(100)).unwrap();

        let failed = room
            .apply(
                &RoomInput::ClockFailed {
                    reason: "unavailable".into(),
                    started: false,
                },
                at(103),
            )
            .unwrap();

        assert_eq!(kinds(&failed), vec![NotificationKind::Pause]);
        assert_eq!(room.elapsed(), secs(8));
        assert_eq!(room.export(at(200), None).current_track.unwrap().elapsed, 8_000);
    }

    #[test]
    fn exported_elapsed_follows_the_running_clock() {
        let mut room = room(&[("one", 30)]);

        room.apply(&play("creator").into(), at(0)).unwrap();

        let state = room.export(at(12), None);
        assert!(state.playing);
        assert_eq!(state.current_track.unwrap().elapsed, 12_000);
        assert_eq!(room.export(at(99), None).current_track.unwrap().elapsed, 30_000);
    }

    #[test]
    fn control_requires_permission() {
        let mut room = room(&[("one", 30), ("two", 30)]);
        send(&mut room, join("bob", true)).unwrap();

        let before = room.export(at(0), None);

        for signal in [play("bob"), pause("bob"), skip("bob")] {
            assert!(matches!(
                send(&mut room, signal),
                Err(RoomError::PermissionDenied { .. })
            ));
        }

        assert_eq!(room.export(at(0), None), before);
        assert_eq!(
            send(&mut room, play("ghost")),
            Err(ValidationError::UnknownUser("ghost".into()).into())
        );
    }

    #[test]
    fn delegated_room_follows_its_owner() {
        let mut room = room_with(
            RoomParameters {
                playing_mode: PlayingMode::Direct,
                ..parameters()
            },
            &[("one", 30)],
        );

        send(&mut room, join("bob", true)).unwrap();

        let grant = RoomSignal::UpdateControlAndDelegationPermission {
            emitter_user_id: "creator".into(),
            target_user_id: "bob".into(),
            has_permission: true,
        };
        send(&mut room, grant).unwrap();

        let transfer = send(
            &mut room,
            RoomSignal::UpdateDelegationOwner {
                emitter_user_id: "creator".into(),
                new_owner_user_id: "bob".into(),
            },
        )
        .unwrap();
        assert_eq!(
            kinds(&transfer),
            vec![NotificationKind::DelegationOwnerAcknowledged]
        );

        assert!(send(&mut room, play("creator")).is_err());
        assert!(send(&mut room, play("bob")).is_ok());

        let revoke = send(
            &mut room,
            RoomSignal::UpdateControlAndDelegationPermission {
                emitter_user_id: "creator".into(),
                target_user_id: "bob".into(),
                has_permission: false,
            },
        )
        .unwrap();

        assert_eq!(
            kinds(&revoke),
            vec![
                NotificationKind::PermissionAcknowledged,
                NotificationKind::DelegationOwnerAcknowledged
            ]
        );

        let state = room.export(at(0), None);
        assert_eq!(state.delegation_owner_user_id.as_deref(), Some("creator"));

        let owner = room
            .users_list()
            .into_iter()
            .find(|u| u.is_delegation_owner)
            .unwrap();
        assert!(owner.has_control_and_delegation_permission);
    }

    #[test]
    fn suggestions_graduate_into_an_empty_queue() {
        let mut room = room(&[]);

        let suggested = send(
            &mut room,
            RoomSignal::SuggestTracks {
                user_id: "creator".into(),
                device_id: "creator-device".into(),
                tracks: vec![TrackMetadata::mock("new", 20)],
                unresolved_track_ids: vec!["lost".into()],
            },
        )
        .unwrap();

        assert_eq!(suggested.outcome, SignalOutcome::Applied);
        assert_eq!(
            kinds(&suggested),
            vec![
                NotificationKind::SuggestionAcknowledged,
                NotificationKind::SuggestionFailed
            ]
        );
        assert_eq!(room.cursor(), Some(0));
        assert_eq!(room.current_track().map(Track::id).map(String::as_str), Some("new"));
    }

    #[test]
    fn suggesting_only_known_tracks_is_rejected() {
        let mut room = room(&[("one", 30)]);

        let suggested = send(
            &mut room,
            RoomSignal::SuggestTracks {
                user_id: "creator".into(),
                device_id: "creator-device".into(),
                tracks: vec![TrackMetadata::mock("one", 30)],
                unresolved_track_ids: vec![],
            },
        )
        .unwrap();

        assert_eq!(suggested.outcome, SignalOutcome::Rejected);
        assert_eq!(kinds(&suggested), vec![NotificationKind::SuggestionFailed]);

        assert_eq!(
            send(
                &mut room,
                RoomSignal::SuggestTracks {
                    user_id: "creator".into(),
                    device_id: "creator-device".into(),
                    tracks: vec![],
                    unresolved_track_ids: vec![],
                },
            ),
            Err(ValidationError::NoTracksToSuggest.into())
        );
    }

    #[test]
    fn graduation_does_not_disturb_the_current_track() {
        let mut room = room_with(
            RoomParameters {
                minimum_score_to_be_played: 2,
                ..parameters()
            },
            &[("one", 30)],
        );

        send(&mut room, join("bob", true)).unwrap();
        room.apply(&play("creator").into(), at(0)).unwrap();

        send(
            &mut room,
            RoomSignal::SuggestTracks {
                user_id: "creator".into(),
                device_id: "creator-device".into(),
                tracks: vec![TrackMetadata::mock("new", 20)],
                unresolved_track_ids: vec![],
            },
        )
        .unwrap();

        let vote = RoomSignal::VoteForTrack {
            user_id: "bob".into(),
            track_id: "new".into(),
        };

        let voted = send(&mut room, vote.clone()).unwrap();
        assert_eq!(kinds(&voted), vec![NotificationKind::VoteAcknowledged]);
        assert_eq!(room.cursor(), Some(0));
        assert_eq!(room.ledger().queue().len(), 2);

        // Voting for a queued track changes nothing
        assert_eq!(send(&mut room, vote), Ok(Transition::no_effect()));

        let advanced = report(&mut room, ClockReport::finished(secs(30)), 30);
        assert_eq!(advanced.effects[0], start_clock(20, 0));
    }

    #[test]
    fn rejoining_does_not_allow_voting_again() {
        let mut room = room_with(
            RoomParameters {
                minimum_score_to_be_played: 3,
                ..parameters()
            },
            &[],
        );

        send(&mut room, join("alice", true)).unwrap();
        send(&mut room, join("bob", true)).unwrap();
        send(
            &mut room,
            RoomSignal::SuggestTracks {
                user_id: "alice".into(),
                device_id: "alice-device".into(),
                tracks: vec![TrackMetadata::mock("t", 10)],
                unresolved_track_ids: vec![],
            },
        )
        .unwrap();

        let vote = RoomSignal::VoteForTrack {
            user_id: "bob".into(),
            track_id: "t".into(),
        };

        assert_eq!(send(&mut room, vote.clone()).unwrap().outcome, SignalOutcome::Applied);

        let leave = RoomSignal::Leave {
            user_id: "bob".into(),
        };
        send(&mut room, leave).unwrap();
        send(&mut room, join("bob", true)).unwrap();

        let state = room.export(at(0), Some(&"bob".to_string()));
        let info = state.user_related_information.unwrap();
        assert_eq!(info.tracks_voted_for, vec!["t".to_string()]);

        assert_eq!(send(&mut room, vote), Ok(Transition::no_effect()));
        assert!(room.ledger().queue().is_empty());
        assert_eq!(room.ledger().suggestion_pool()[0].score, 2);
    }

    #[test]
    fn invited_only_rooms_refuse_uninvited_votes() {
        let mut room = room_with(
            RoomParameters {
                is_open: true,
                is_open_only_invited_users_can_vote: true,
                ..parameters()
            },
            &[],
        );

        send(&mut room, join("guest", false)).unwrap();

        let suggest = RoomSignal::SuggestTracks {
            user_id: "guest".into(),
            device_id: "guest-device".into(),
            tracks: vec![TrackMetadata::mock("t", 10)],
            unresolved_track_ids: vec![],
        };

        assert!(matches!(
            send(&mut room, suggest),
            Err(RoomError::PermissionDenied { .. })
        ));
        assert!(room.ledger().suggestion_pool().is_empty());
    }

    #[test]
    fn position_constraints_gate_votes() {
        let window = PhysicalAndTimeConstraints::new(at(-60), at(3600)).unwrap();
        let mut room = room_with(
            RoomParameters {
                physical_and_time_constraints: Some(window),
                minimum_score_to_be_played: 3,
                ..parameters()
            },
            &[],
        );

        assert_eq!(room.rules().constraint_enforcement, ConstraintEnforcement::Strict);

        send(&mut room, join("bob", true)).unwrap();

        let suggest = RoomSignal::SuggestTracks {
            user_id: "bob".into(),
            device_id: "bob-device".into(),
            tracks: vec![TrackMetadata::mock("t", 10)],
            unresolved_track_ids: vec![],
        };

        assert!(send(&mut room, suggest.clone()).is_err());

        let fits = RoomSignal::UpdateUserFitsPositionConstraint {
            user_id: "bob".into(),
            fits: true,
        };

        let reported = send(&mut room, fits.clone()).unwrap();
        assert_eq!(
            kinds(&reported),
            vec![NotificationKind::PositionConstraintAcknowledged]
        );
        assert_eq!(send(&mut room, fits), Ok(Transition::no_effect()));

        assert_eq!(send(&mut room, suggest.clone()).unwrap().outcome, SignalOutcome::Applied);

        // Outside the time window
        let late = room.apply(&suggest.into(), at(7200));
        assert!(matches!(late, Err(RoomError::PermissionDenied { .. })));
    }

    #[test]
    fn devices_can_change() {
        let mut room = room(&[]);

        let change = RoomSignal::ChangeEmittingDevice {
            user_id: "creator".into(),
            device_id: "speaker".into(),
        };

        let changed = send(&mut room, change.clone()).unwrap();
        let notice = changed.notices().next().unwrap();
        assert_eq!(notice.kind, NotificationKind::DeviceChanged);
        assert_eq!(notice.device_id.as_deref(), Some("speaker"));

        assert_eq!(send(&mut room, change), Ok(Transition::no_effect()));

        let info = room
            .export(at(0), Some(&"creator".to_string()))
            .user_related_information
            .unwrap();
        assert_eq!(info.emitting_device_id, "speaker");
    }

    #[test]
    fn leaving_reports_the_new_length() {
        let mut room = room(&[]);
        send(&mut room, join("bob", true)).unwrap();

        let left = send(
            &mut room,
            RoomSignal::Leave {
                user_id: "bob".into(),
            },
        )
        .unwrap();

        assert_eq!(
            kinds(&left),
            vec![NotificationKind::UserLeft, NotificationKind::UserLengthChanged]
        );
        assert_eq!(room.export(at(0), None).users_length, 1);
    }

    #[test]
    fn terminated_rooms_drop_everything() {
        let mut room = room(&[("one", 30)]);

        send(&mut room, play("creator")).unwrap();

        let terminated = send(&mut room, RoomSignal::Terminate).unwrap();
        assert_eq!(terminated.effects, vec![Effect::AbandonClock]);
        assert!(room.is_terminated());

        let dropped = send(&mut room, play("creator")).unwrap();
        assert_eq!(dropped.outcome, SignalOutcome::Dropped);
        assert!(dropped.effects.is_empty());

        let late_report = report(&mut room, ClockReport::finished(secs(30)), 30);
        assert_eq!(late_report.outcome, SignalOutcome::Dropped);
    }

    #[test]
    fn invalid_rooms_are_refused() {
        let blank = RoomParameters {
            name: "  ".into(),
            ..parameters()
        };

        assert_eq!(
            RoomMachine::new(blank, vec![], RoomRules::default()).err(),
            Some(ValidationError::BlankName.into())
        );
    }
}
