use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrawl_types::{DomainError, Intent, PlayerId, TurnId};
use std::sync::Mutex;

/// Interactive controls attached to an offer prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OfferAction {
    Claim,
    Decline,
}

/// Abstract sink for everything the engine wants players to see.
///
/// Every call is advisory: the engine logs and drops failures, performs no
/// retries, and never lets delivery affect committed state. Rendering the
/// intent into platform messages is the implementor's concern.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn dm(&self, player: &PlayerId, notice: &Intent) -> Result<(), DomainError>;

    async fn channel_announce(&self, channel_id: &str, notice: &Intent)
    -> Result<(), DomainError>;

    async fn offer(
        &self,
        player: &PlayerId,
        turn: &TurnId,
        deadline: DateTime<Utc>,
        actions: &[OfferAction],
    ) -> Result<(), DomainError>;
}

/// A delivery failure surfaced on the error bus.
#[derive(Clone, Debug)]
pub struct NotificationFailure {
    pub intent: &'static str,
    pub reason: String,
}

/// Broadcast channel for notification failures. Hosts may subscribe to
/// forward failures to their own alerting; with no subscribers the sends are
/// silently dropped.
pub type ErrorBus = tokio::sync::broadcast::Sender<NotificationFailure>;

/// Records every delivery instead of sending it, optionally failing all
/// calls. Useful to hosts as a dry-run sink and to tests as a probe.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Intent>>,
    fail_all: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery report failure.
    pub fn fail_all(&self) {
        self.fail_all
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Intent> {
        self.deliveries
            .lock()
            .expect("notifier lock poisoned")
            .clone()
    }

    /// Names of delivered intents, in order.
    pub fn delivered_names(&self) -> Vec<&'static str> {
        self.deliveries().iter().map(|i| i.name()).collect()
    }

    fn record(&self, notice: &Intent) -> Result<(), DomainError> {
        if self.fail_all.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DomainError::Notification {
                reason: "recording notifier set to fail".to_string(),
            });
        }
        self.deliveries
            .lock()
            .expect("notifier lock poisoned")
            .push(notice.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn dm(&self, _player: &PlayerId, notice: &Intent) -> Result<(), DomainError> {
        self.record(notice)
    }

    async fn channel_announce(
        &self,
        _channel_id: &str,
        notice: &Intent,
    ) -> Result<(), DomainError> {
        self.record(notice)
    }

    async fn offer(
        &self,
        player: &PlayerId,
        turn: &TurnId,
        deadline: DateTime<Utc>,
        _actions: &[OfferAction],
    ) -> Result<(), DomainError> {
        self.record(&Intent::TurnOffered {
            player_id: player.clone(),
            turn_id: turn.clone(),
            deadline,
        })
    }
}
