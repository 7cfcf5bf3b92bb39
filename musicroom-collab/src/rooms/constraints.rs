use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RoomUser, ValidationError};

/// The time window a room with physical constraints is valid in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAndTimeConstraints {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// How strictly a room applies its position constraints
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintEnforcement {
    /// Reports are recorded, but never keep anyone from voting
    Advisory,
    /// Only users who fit the constraint may vote, and only inside the time window
    #[default]
    Strict,
}

/// Decides whether users are eligible according to where they are and when they act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionConstraintGate {
    constraints: Option<PhysicalAndTimeConstraints>,
    enforcement: ConstraintEnforcement,
}

impl PhysicalAndTimeConstraints {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        let constraints = Self { start, end };
        constraints.validate()?;

        Ok(constraints)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start < self.end {
            Ok(())
        } else {
            Err(ValidationError::InvalidConstraintWindow)
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

impl PositionConstraintGate {
    pub fn new(
        constraints: Option<PhysicalAndTimeConstraints>,
        enforcement: ConstraintEnforcement,
    ) -> Self {
        Self {
            constraints,
            enforcement,
        }
    }

    /// Whether the room has physical and time constraints at all
    pub fn is_active(&self) -> bool {
        self.constraints.is_some()
    }

    pub fn constraints(&self) -> Option<&PhysicalAndTimeConstraints> {
        self.constraints.as_ref()
    }

    /// Records whether the user fits the constraint. Returns true if it changed.
    pub fn report_fit(&self, user: &mut RoomUser, fits: bool) -> Result<bool, ValidationError> {
        if !self.is_active() {
            return Err(ValidationError::NoPositionConstraints);
        }

        let changed = user.user_fits_position_constraint != Some(fits);
        user.user_fits_position_constraint = Some(fits);

        Ok(changed)
    }

    /// Whether the user may vote at the given time.
    /// A user that never reported their position does not fit.
    pub fn allows(&self, user: &RoomUser, at: DateTime<Utc>) -> bool {
        let Some(constraints) = &self.constraints else {
            return true;
        };

        match self.enforcement {
            ConstraintEnforcement::Advisory => true,
            ConstraintEnforcement::Strict => {
                constraints.contains(at) && user.user_fits_position_constraint == Some(true)
            }
        }
    }
}
