use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use study_core::model::{HostPhase, ItemId, ParticipantId, SessionId};

const CHANNEL_CAPACITY: usize = 64;

/// Change notifications pushed to subscribers of a quiz session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    ParticipantJoined {
        session_id: SessionId,
        participant_id: ParticipantId,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    AnswerRecorded {
        session_id: SessionId,
        participant_id: ParticipantId,
        question_id: ItemId,
        correct: bool,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    PhaseChanged {
        session_id: SessionId,
        phase: HostPhase,
    },
}

impl SessionEvent {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::ParticipantJoined { session_id, .. }
            | Self::AnswerRecorded { session_id, .. }
            | Self::PhaseChanged { session_id, .. } => *session_id,
        }
    }
}

/// Receiving end of one session's event stream.
#[derive(Debug)]
pub struct SessionSubscription {
    session_id: SessionId,
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Waits for the next event. Returns `None` once the hub is gone.
    /// Events missed by a lagging subscriber are skipped.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session_id = %self.session_id, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Per-session broadcast channels, created on first subscription.
#[derive(Clone, Default)]
pub struct SessionEvents {
    channels: Arc<Mutex<HashMap<SessionId, broadcast::Sender<SessionEvent>>>>,
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self, session_id: SessionId) -> SessionSubscription {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let receiver = channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        SessionSubscription {
            session_id,
            receiver,
        }
    }

    /// Delivers `event` to current subscribers. Channels nobody listens to
    /// any more are dropped.
    pub fn publish(&self, event: SessionEvent) {
        let session_id = event.session_id();
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let delivered = channels
            .get(&session_id)
            .is_some_and(|sender| sender.send(event).is_ok());
        if !delivered {
            channels.remove(&session_id);
        }
    }
}
