use std::collections::BTreeMap;

use crate::{PlayingMode, RoomError, RoomUser, UserId, ValidationError};

/// Keeps the users of a room, their control permission, and who owns the delegation.
///
/// The delegation owner, if any, is always a present user with permission.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    creator_user_id: UserId,
    delegation_enabled: bool,
    users: BTreeMap<UserId, RoomUser>,
    delegation_owner_user_id: Option<UserId>,
}

/// What changed after a permission update
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PermissionUpdate {
    pub permission_changed: bool,
    pub owner_changed: bool,
}

impl PermissionRegistry {
    /// Creates a registry with the creator as its only user.
    /// The creator is invited and permitted, and owns the delegation in direct mode.
    pub fn new(mut creator: RoomUser, playing_mode: PlayingMode) -> Self {
        creator.has_control_and_delegation_permission = true;
        creator.user_has_been_invited = true;

        let delegation_enabled = playing_mode == PlayingMode::Direct;
        let creator_user_id = creator.user_id.clone();

        Self {
            delegation_owner_user_id: delegation_enabled.then(|| creator_user_id.clone()),
            users: BTreeMap::from([(creator_user_id.clone(), creator)]),
            creator_user_id,
            delegation_enabled,
        }
    }

    pub fn creator_user_id(&self) -> &UserId {
        &self.creator_user_id
    }

    pub fn delegation_owner_user_id(&self) -> Option<&UserId> {
        self.delegation_owner_user_id.as_ref()
    }

    /// Users ordered by id
    pub fn users(&self) -> impl Iterator<Item = &RoomUser> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn user(&self, user_id: &UserId) -> Result<&RoomUser, ValidationError> {
        self.users
            .get(user_id)
            .ok_or_else(|| ValidationError::UnknownUser(user_id.clone()))
    }

    pub fn user_mut(&mut self, user_id: &UserId) -> Result<&mut RoomUser, ValidationError> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| ValidationError::UnknownUser(user_id.clone()))
    }

    /// Adds a user. Returns false if the user is already in the room.
    pub fn join(&mut self, user: RoomUser) -> bool {
        if self.users.contains_key(&user.user_id) {
            return false;
        }

        self.users.insert(user.user_id.clone(), user);
        true
    }

    /// Removes a user. Returns true if the delegation owner changed because of it.
    pub fn leave(&mut self, user_id: &UserId) -> Result<bool, ValidationError> {
        if *user_id == self.creator_user_id {
            return Err(ValidationError::CreatorCannotLeave);
        }

        self.users
            .remove(user_id)
            .ok_or_else(|| ValidationError::UnknownUser(user_id.clone()))?;

        Ok(self.ensure_valid_delegation_owner())
    }

    /// Checks that the user may play, pause, or skip.
    pub fn ensure_can_control(&self, user_id: &UserId) -> Result<(), RoomError> {
        let user = self.user(user_id)?;

        let allowed = if self.delegation_enabled {
            self.delegation_owner_user_id.as_ref() == Some(user_id)
        } else {
            user.has_control_and_delegation_permission
        };

        if allowed {
            Ok(())
        } else {
            Err(RoomError::denied(user_id, "control playback"))
        }
    }

    /// Grants or revokes the control and delegation permission. Only the creator may do this.
    ///
    /// Revoking the permission of the delegation owner reassigns the delegation in the same step.
    pub fn set_permission(
        &mut self,
        emitter_user_id: &UserId,
        target_user_id: &UserId,
        has_permission: bool,
    ) -> Result<PermissionUpdate, RoomError> {
        self.user(emitter_user_id)?;

        if *emitter_user_id != self.creator_user_id {
            return Err(RoomError::denied(emitter_user_id, "change permissions"));
        }

        let target = self.user_mut(target_user_id)?;

        if target.has_control_and_delegation_permission == has_permission {
            return Ok(PermissionUpdate::default());
        }

        target.has_control_and_delegation_permission = has_permission;

        Ok(PermissionUpdate {
            permission_changed: true,
            owner_changed: self.ensure_valid_delegation_owner(),
        })
    }

    /// Hands the delegation to another user. Returns false if they already own it.
    pub fn transfer_delegation(
        &mut self,
        emitter_user_id: &UserId,
        new_owner_user_id: &UserId,
    ) -> Result<bool, RoomError> {
        if !self.delegation_enabled {
            return Err(ValidationError::NotDelegated.into());
        }

        if !self.user(emitter_user_id)?.has_control_and_delegation_permission {
            return Err(RoomError::denied(emitter_user_id, "transfer the delegation"));
        }

        if !self.user(new_owner_user_id)?.has_control_and_delegation_permission {
            return Err(RoomError::denied(new_owner_user_id, "own the delegation"));
        }

        if self.delegation_owner_user_id.as_ref() == Some(new_owner_user_id) {
            return Ok(false);
        }

        self.delegation_owner_user_id = Some(new_owner_user_id.clone());
        Ok(true)
    }

    /// Reassigns the delegation if the owner left or lost permission.
    /// Returns true if the owner changed.
    fn ensure_valid_delegation_owner(&mut self) -> bool {
        if !self.delegation_enabled {
            return false;
        }

        let owner_is_valid = self
            .delegation_owner_user_id
            .as_ref()
            .and_then(|id| self.users.get(id))
            .is_some_and(|u| u.has_control_and_delegation_permission);

        if owner_is_valid {
            return false;
        }

        let previous = self.delegation_owner_user_id.take();
        self.delegation_owner_user_id = self.reassignment_target();

        previous != self.delegation_owner_user_id
    }

    /// The creator if they can take it, otherwise the first permitted user by id.
    fn reassignment_target(&self) -> Option<UserId> {
        self.users
            .get(&self.creator_user_id)
            .filter(|u| u.has_control_and_delegation_permission)
            .or_else(|| {
                self.users
                    .values()
                    .find(|u| u.has_control_and_delegation_permission)
            })
            .map(|u| u.user_id.clone())
    }
}
