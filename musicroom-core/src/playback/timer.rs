use std::time::Duration;

use log::debug;
use tokio::{
    sync::oneshot,
    time::{sleep, Instant},
};

use crate::{current_handle, ClockError, ClockHandle, ClockReport, PlaybackClock};

/// A [PlaybackClock] backed by a tokio timer on the current runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerClock;

impl PlaybackClock for TimerClock {
    fn start(&self, duration: Duration, offset: Duration) -> Result<ClockHandle, ClockError> {
        let handle = current_handle()
            .ok_or_else(|| ClockError::Unavailable("no tokio runtime is running".to_string()))?;

        let (report_sender, report_receiver) = oneshot::channel();
        let (interrupt_sender, interrupt_receiver) = oneshot::channel();

        let clock = ClockHandle::new(report_receiver, Some(interrupt_sender));
        let clock_id = clock.id;
        let remaining = duration.saturating_sub(offset);

        handle.spawn(async move {
            let started = Instant::now();

            // A dropped handle also resolves the interrupt receiver, which ends the timer
            let report = tokio::select! {
                _ = sleep(remaining) => ClockReport::finished(duration),
                _ = interrupt_receiver => {
                    ClockReport::interrupted((offset + started.elapsed()).min(duration))
                }
            };

            if report_sender.send(report).is_err() {
                debug!("Clock {} was abandoned", clock_id);
            }
        });

        Ok(clock)
    }
}
