use crossbeam::channel::unbounded;
use log::debug;

use crate::{NotificationPort, NotificationReceiver, NotificationSender, RoomNotification};

/// Delivers notifications into an in-process channel, for subscribers living in the same process.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: NotificationSender,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiving end of its channel
    pub fn new() -> (Self, NotificationReceiver) {
        let (sender, receiver) = unbounded();

        (Self { sender }, receiver)
    }
}

impl NotificationPort for ChannelNotifier {
    fn notify(&self, notification: RoomNotification) {
        if self.sender.send(notification).is_err() {
            debug!("No one is listening for room notifications");
        }
    }
}
