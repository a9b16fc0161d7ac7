use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::users;
use crate::api::ApiClient;
use crate::error::{ApiError, ErrorKind};
use crate::models::Notification;
use crate::session::SessionState;

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

/// Flips one notification to read. Returns true when the unread count dropped.
pub fn mark_read_locally(notifications: &mut [Notification], id: &str) -> bool {
    match notifications.iter_mut().find(|n| n.id == id) {
        Some(notification) if !notification.read => {
            notification.read = true;
            true
        }
        _ => false,
    }
}

/// Periodic notification fetch bound to the signed-in session.
///
/// The task ends on its own when the session signs out or the backend
/// answers 401. Dropping the poller aborts it.
pub struct NotificationPoller {
    feed: watch::Receiver<Vec<Notification>>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl NotificationPoller {
    pub fn spawn(
        client: Arc<ApiClient>,
        session: watch::Receiver<SessionState>,
        period: Duration,
    ) -> Self {
        let (feed_tx, feed) = watch::channel(Vec::new());
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_notifications(client, session, period, feed_tx, stop_rx));
        Self { feed, stop, handle }
    }

    /// Receiver that sees every list the poller publishes.
    pub fn feed(&self) -> watch::Receiver<Vec<Notification>> {
        self.feed.clone()
    }

    pub fn latest(&self) -> Vec<Notification> {
        self.feed.borrow().clone()
    }

    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll_notifications(
    client: Arc<ApiClient>,
    mut session: watch::Receiver<SessionState>,
    period: Duration,
    feed: watch::Sender<Vec<Notification>>,
    mut stop: watch::Receiver<bool>,
) {
    if !session.borrow_and_update().is_authenticated {
        debug!("Not signed in; notification polling not started");
        return;
    }
    info!("Polling notifications every {:?}", period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = session.changed() => {
                if changed.is_err() || !session.borrow_and_update().is_authenticated {
                    debug!("Session ended; notification polling stopped");
                    return;
                }
                continue;
            }
            _ = stop.changed() => {
                debug!("Notification polling stopped");
                return;
            }
        }

        let result = tokio::select! {
            result = users::notifications(&client) => result,
            _ = stop.changed() => {
                debug!("Notification polling stopped during fetch");
                return;
            }
        };
        // A sign-out while the request was in flight makes its result stale.
        if !session.borrow().is_authenticated {
            debug!("Session ended during fetch; notification polling stopped");
            return;
        }

        match result {
            Ok(list) => {
                consecutive_failures = 0;
                debug!("Fetched {} notifications ({} unread)", list.len(), unread_count(&list));
                feed.send_replace(list);
            }
            Err(ApiError::Unauthorized) => {
                debug!("Session rejected; notification polling stopped");
                return;
            }
            Err(e) if e.kind() == ErrorKind::Network => {
                consecutive_failures += 1;
                warn!(
                    "Error fetching notifications: {} ({} consecutive failures)",
                    e, consecutive_failures
                );
            }
            Err(e) => {
                consecutive_failures += 1;
                error!("Unexpected notifications response: {}", e);
            }
        }
    }
}
