use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RoomError, RoomInput, RoomMachine, RoomParameters, RoomRules, TrackMetadata};

/// An entry of a room's signal log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "kebab-case")]
pub enum LogEntry {
    /// Always the first entry
    Created {
        at: DateTime<Utc>,
        parameters: RoomParameters,
        /// The resolved initial queue
        tracks: Vec<TrackMetadata>,
        rules: RoomRules,
    },
    Input {
        at: DateTime<Utc>,
        input: RoomInput,
    },
}

/// Every input a room accepted, in order.
///
/// Replaying the log rebuilds the room exactly as it was. The log is kept in memory
/// until the room stops, growing by one entry per accepted signal or clock report.
/// Querying a running room copies the whole log, so it is meant for inspection and
/// persistence rather than polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalLog {
    entries: Vec<LogEntry>,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Signal log does not start with the creation of a room")]
    MissingCreation,
    #[error("Line {line} of the signal log is malformed: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Signal log could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Logged room is invalid: {0}")]
    Room(#[from] RoomError),
}

impl SignalLog {
    pub fn new(
        at: DateTime<Utc>,
        parameters: RoomParameters,
        tracks: Vec<TrackMetadata>,
        rules: RoomRules,
    ) -> Self {
        Self {
            entries: vec![LogEntry::Created {
                at,
                parameters,
                tracks,
                rules,
            }],
        }
    }

    pub fn append(&mut self, at: DateTime<Utc>, input: RoomInput) {
        self.entries.push(LogEntry::Input { at, input });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// When the last entry was logged
    pub fn last_at(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|entry| match entry {
            LogEntry::Created { at, .. } | LogEntry::Input { at, .. } => *at,
        })
    }

    /// Rebuilds the room by applying every logged input again.
    /// Inputs the room refuses are skipped, as they change nothing.
    pub fn replay(&self) -> Result<RoomMachine, LogError> {
        let Some(LogEntry::Created {
            parameters,
            tracks,
            rules,
            ..
        }) = self.entries.first()
        else {
            return Err(LogError::MissingCreation);
        };

        let mut machine = RoomMachine::new(parameters.clone(), tracks.clone(), *rules)?;

        for entry in &self.entries[1..] {
            match entry {
                LogEntry::Input { at, input } => {
                    let _ = machine.apply(input, *at);
                }
                LogEntry::Created { .. } => return Err(LogError::MissingCreation),
            }
        }

        Ok(machine)
    }

    /// Encodes the log as one JSON object per line
    pub fn to_json_lines(&self) -> Result<String, LogError> {
        let mut lines = String::new();

        for entry in &self.entries {
            lines.push_str(&serde_json::to_string(entry)?);
            lines.push('\n');
        }

        Ok(lines)
    }

    pub fn from_json_lines(text: &str) -> Result<Self, LogError> {
        let entries = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|source| LogError::Malformed {
                    line: index + 1,
                    source,
                })
            })
            .collect::<Result<Vec<LogEntry>, _>>()?;

        if !matches!(entries.first(), Some(LogEntry::Created { .. })) {
            return Err(LogError::MissingCreation);
        }

        Ok(Self { entries })
    }
}
