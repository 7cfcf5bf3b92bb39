use log::warn;
use musicroom_core::{current_handle, Config};
use reqwest::Client;
use url::Url;

use crate::{NotificationKind, NotificationPort, RoomNotification};

/// Posts every notification as JSON to `<endpoint>/<kind>`, retrying with a growing delay.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    endpoint: Url,
    config: Config,
}

impl HttpNotifier {
    pub fn new(endpoint: &str, config: &Config) -> Result<Self, url::ParseError> {
        let mut endpoint = Url::parse(endpoint)?;

        // Without it, joining a route would replace the last segment
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            endpoint,
            config: config.clone(),
        })
    }

    /// Returns where notifications of the given kind are posted to
    pub fn url_for(&self, kind: NotificationKind) -> Result<Url, url::ParseError> {
        self.endpoint.join(kind.route())
    }

    async fn deliver(&self, url: Url, notification: RoomNotification) {
        let attempts = self.config.notification_attempts.max(1);

        for attempt in 1..=attempts {
            let result = self
                .client
                .post(url.clone())
                .json(&notification)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(_) => return,
                Err(error) => {
                    warn!(
                        "Notifying {} for room {} failed (attempt {}/{}): {}",
                        url, notification.room_id, attempt, attempts, error
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.notification_retry_delay(attempt)).await;
            }
        }

        warn!(
            "Giving up on {} notification for room {}",
            notification.kind.route(),
            notification.room_id
        );
    }
}

impl NotificationPort for HttpNotifier {
    fn notify(&self, notification: RoomNotification) {
        let url = match self.url_for(notification.kind) {
            Ok(url) => url,
            Err(error) => {
                warn!("Invalid notification url: {}", error);
                return;
            }
        };

        let Some(handle) = current_handle() else {
            warn!("Cannot send notifications without a tokio runtime");
            return;
        };

        let notifier = self.clone();
        handle.spawn(async move { notifier.deliver(url, notification).await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_are_appended_to_the_endpoint() {
        let notifier =
            HttpNotifier::new("http://localhost:4000/rooms", &Config::default()).unwrap();

        assert_eq!(
            notifier
                .url_for(NotificationKind::VoteAcknowledged)
                .unwrap()
                .as_str(),
            "http://localhost:4000/rooms/vote-acknowledged"
        );

        let rooted = HttpNotifier::new("http://localhost:4000/", &Config::default()).unwrap();

        assert_eq!(
            rooted.url_for(NotificationKind::Play).unwrap().as_str(),
            "http://localhost:4000/play"
        );
    }

    #[test]
    fn invalid_endpoints_are_refused() {
        assert!(HttpNotifier::new("not a url", &Config::default()).is_err());
    }
}
