use std::{collections::VecDeque, time::Duration};

use parking_lot::Mutex;

use crate::{ClockError, ClockHandle, ClockReport, PlaybackClock};

/// A [PlaybackClock] that stops immediately with pre-queued results.
///
/// Each start consumes the next result, and is recorded so callers can check what was timed.
/// Once the script runs out, starting fails with [ClockError::Unavailable].
#[derive(Debug, Default)]
pub struct ScriptedClock {
    script: Mutex<VecDeque<Result<ClockReport, ClockError>>>,
    starts: Mutex<Vec<ClockStart>>,
}

/// A recorded call to [PlaybackClock::start].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockStart {
    pub duration: Duration,
    pub offset: Duration,
}

impl ScriptedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reports<R>(reports: R) -> Self
    where
        R: IntoIterator<Item = ClockReport>,
    {
        let clock = Self::new();

        for report in reports {
            clock.push(report);
        }

        clock
    }

    /// Queues the report returned by a future start.
    pub fn push(&self, report: ClockReport) {
        self.script.lock().push_back(Ok(report));
    }

    /// Queues a failure to start.
    pub fn push_failure(&self, error: ClockError) {
        self.script.lock().push_back(Err(error));
    }

    /// Returns every start so far, in order.
    pub fn starts(&self) -> Vec<ClockStart> {
        self.starts.lock().clone()
    }

    /// Returns how many scripted results are left.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl PlaybackClock for ScriptedClock {
    fn start(&self, duration: Duration, offset: Duration) -> Result<ClockHandle, ClockError> {
        self.starts.lock().push(ClockStart { duration, offset });

        let next = self.script.lock().pop_front().unwrap_or_else(|| {
            Err(ClockError::Unavailable(
                "no scripted report is left".to_string(),
            ))
        });

        next.map(ClockHandle::ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_back_the_script_in_order() {
        let clock = ScriptedClock::with_reports([
            ClockReport::interrupted(Duration::from_secs(2)),
            ClockReport::finished(Duration::from_secs(9)),
        ]);

        let mut first = clock
            .start(Duration::from_secs(9), Duration::ZERO)
            .expect("first start");
        let second = clock
            .start(Duration::from_secs(9), Duration::from_secs(2))
            .expect("second start");

        assert_eq!(
            first.wait().await,
            Ok(ClockReport::interrupted(Duration::from_secs(2)))
        );
        assert_eq!(
            second.interrupt().await,
            Ok(ClockReport::finished(Duration::from_secs(9)))
        );
        assert_eq!(clock.remaining(), 0);
        assert_eq!(
            clock.starts()[1],
            ClockStart {
                duration: Duration::from_secs(9),
                offset: Duration::from_secs(2),
            }
        );
    }

    #[test]
    fn fails_once_exhausted() {
        let clock = ScriptedClock::new();
        clock.push_failure(ClockError::Dropped);

        assert_eq!(
            clock.start(Duration::from_secs(1), Duration::ZERO).err(),
            Some(ClockError::Dropped)
        );
        assert!(matches!(
            clock.start(Duration::from_secs(1), Duration::ZERO),
            Err(ClockError::Unavailable(_))
        ));
        assert_eq!(clock.starts().len(), 2);
    }
}
