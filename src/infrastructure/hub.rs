//! Encounter hub - subscriber registry and ordered delta fan-out
//!
//! One channel per encounter: a monotonic sequence counter plus the set
//! of connected clients. Every accepted mutation reserves the next
//! sequence number, is persisted, and only then dispatched to all
//! subscribers in order. Clients that observe a sequence gap request a
//! full snapshot instead of applying the partial delta.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

use crate::domain::events::DeltaEvent;
use crate::domain::value_objects::EncounterId;
use crate::infrastructure::websocket::{ParticipantRole, ServerMessage};

/// Unique identifier for a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client subscribed to an encounter's delta stream.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub client_id: ClientId,
    pub user_id: String,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
    /// Channel to this client's WebSocket send task.
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Per-encounter channel state.
struct EncounterChannel {
    sequence: u64,
    subscribers: HashMap<ClientId, Subscriber>,
    director_user_id: Option<String>,
}

impl EncounterChannel {
    fn new() -> Self {
        Self {
            sequence: 0,
            subscribers: HashMap::new(),
            director_user_id: None,
        }
    }

    fn broadcast(&self, message: &ServerMessage) {
        for subscriber in self.subscribers.values() {
            if let Err(e) = subscriber.sender.send(message.clone()) {
                tracing::warn!(
                    "Failed to send message to client {}: {}",
                    subscriber.client_id,
                    e
                );
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("no channel open for encounter {0}")]
    ChannelNotFound(EncounterId),
    #[error("encounter already has a director")]
    DirectorAlreadyPresent,
}

struct HubInner {
    channels: HashMap<EncounterId, EncounterChannel>,
    clients: HashMap<ClientId, EncounterId>,
}

/// Registry of encounter channels and their subscribers.
pub struct EncounterHub {
    inner: RwLock<HubInner>,
}

impl EncounterHub {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HubInner {
                channels: HashMap::new(),
                clients: HashMap::new(),
            }),
        }
    }

    /// Open a channel for a newly created encounter.
    pub async fn open_channel(&self, encounter_id: EncounterId) {
        let mut inner = self.inner.write().await;
        inner
            .channels
            .entry(encounter_id)
            .or_insert_with(EncounterChannel::new);
        tracing::info!("Opened delta channel for encounter {}", encounter_id);
    }

    /// Remove a channel; remaining subscribers are dropped from the
    /// index (they already received the terminal delta).
    pub async fn close_channel(&self, encounter_id: EncounterId) {
        let mut inner = self.inner.write().await;
        if let Some(channel) = inner.channels.remove(&encounter_id) {
            for client_id in channel.subscribers.keys() {
                inner.clients.remove(client_id);
            }
            tracing::info!("Closed delta channel for encounter {}", encounter_id);
        }
    }

    /// Subscribe a client and return the channel's current sequence
    /// number, from which the client resumes delta application.
    ///
    /// A second director with a different user id is rejected; the same
    /// user may hold several director connections (multiple tabs).
    pub async fn subscribe(
        &self,
        encounter_id: EncounterId,
        client_id: ClientId,
        user_id: String,
        role: ParticipantRole,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<u64, HubError> {
        let mut inner = self.inner.write().await;
        let channel = inner
            .channels
            .get_mut(&encounter_id)
            .ok_or(HubError::ChannelNotFound(encounter_id))?;

        if role == ParticipantRole::Director {
            match &channel.director_user_id {
                Some(existing) if *existing != user_id => {
                    return Err(HubError::DirectorAlreadyPresent);
                }
                _ => channel.director_user_id = Some(user_id.clone()),
            }
        }

        channel.subscribers.insert(
            client_id,
            Subscriber {
                client_id,
                user_id: user_id.clone(),
                role,
                joined_at: Utc::now(),
                sender,
            },
        );
        let sequence = channel.sequence;
        inner.clients.insert(client_id, encounter_id);

        tracing::info!(
            "Client {} (user: {}) subscribed to encounter {} as {:?}",
            client_id,
            user_id,
            encounter_id,
            role
        );
        Ok(sequence)
    }

    /// Drop a client's subscription.
    pub async fn unsubscribe(&self, client_id: ClientId) -> Option<EncounterId> {
        let mut inner = self.inner.write().await;
        let encounter_id = inner.clients.remove(&client_id)?;
        if let Some(channel) = inner.channels.get_mut(&encounter_id) {
            if let Some(subscriber) = channel.subscribers.remove(&client_id) {
                if channel.director_user_id.as_deref() == Some(subscriber.user_id.as_str())
                    && !channel
                        .subscribers
                        .values()
                        .any(|s| s.role == ParticipantRole::Director)
                {
                    channel.director_user_id = None;
                }
            }
        }
        tracing::info!(
            "Client {} unsubscribed from encounter {}",
            client_id,
            encounter_id
        );
        Some(encounter_id)
    }

    /// Reserve the next sequence number for an accepted mutation.
    pub async fn reserve_sequence(&self, encounter_id: EncounterId) -> Result<u64, HubError> {
        let mut inner = self.inner.write().await;
        let channel = inner
            .channels
            .get_mut(&encounter_id)
            .ok_or(HubError::ChannelNotFound(encounter_id))?;
        channel.sequence += 1;
        Ok(channel.sequence)
    }

    /// Roll back a reserved sequence after a failed persist, so the
    /// stream stays gapless. Safe because writers are serialized per
    /// encounter.
    pub async fn release_sequence(&self, encounter_id: EncounterId, sequence: u64) {
        let mut inner = self.inner.write().await;
        if let Some(channel) = inner.channels.get_mut(&encounter_id) {
            if channel.sequence == sequence {
                channel.sequence -= 1;
            }
        }
    }

    /// Fan a persisted delta out to every subscriber, the issuing client
    /// included.
    pub async fn dispatch(&self, event: &DeltaEvent) {
        let inner = self.inner.read().await;
        if let Some(channel) = inner.channels.get(&event.encounter_id) {
            channel.broadcast(&ServerMessage::Delta {
                event: event.clone(),
            });
        }
    }

    pub async fn current_sequence(&self, encounter_id: EncounterId) -> Option<u64> {
        let inner = self.inner.read().await;
        inner.channels.get(&encounter_id).map(|c| c.sequence)
    }

    /// The encounter a client is subscribed to.
    pub async fn client_encounter(&self, client_id: ClientId) -> Option<EncounterId> {
        let inner = self.inner.read().await;
        inner.clients.get(&client_id).copied()
    }

    /// Whether a client holds the director role on its encounter.
    pub async fn is_director(&self, client_id: ClientId) -> bool {
        let inner = self.inner.read().await;
        let Some(encounter_id) = inner.clients.get(&client_id) else {
            return false;
        };
        inner
            .channels
            .get(encounter_id)
            .and_then(|c| c.subscribers.get(&client_id))
            .map(|s| s.role == ParticipantRole::Director)
            .unwrap_or(false)
    }

    pub async fn subscriber_count(&self, encounter_id: EncounterId) -> usize {
        let inner = self.inner.read().await;
        inner
            .channels
            .get(&encounter_id)
            .map(|c| c.subscribers.len())
            .unwrap_or(0)
    }

    /// Encounter ids with an open channel but no subscribers, candidates
    /// for sweeping.
    pub async fn idle_channels(&self) -> Vec<EncounterId> {
        let inner = self.inner.read().await;
        inner
            .channels
            .iter()
            .filter(|(_, c)| c.subscribers.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }
}

impl Default for EncounterHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DeltaKind;

    async fn hub_with_channel() -> (EncounterHub, EncounterId) {
        let hub = EncounterHub::new();
        let encounter_id = EncounterId::new();
        hub.open_channel(encounter_id).await;
        (hub, encounter_id)
    }

    #[tokio::test]
    async fn test_sequences_are_monotonic_and_gapless() {
        let (hub, encounter_id) = hub_with_channel().await;
        for expected in 1..=5u64 {
            assert_eq!(hub.reserve_sequence(encounter_id).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_release_rolls_back_failed_persist() {
        let (hub, encounter_id) = hub_with_channel().await;
        let first = hub.reserve_sequence(encounter_id).await.unwrap();
        hub.release_sequence(encounter_id, first).await;
        // The next reservation reuses the released number: no gap.
        assert_eq!(hub.reserve_sequence(encounter_id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_subscribers_receive_deltas_in_order() {
        let (hub, encounter_id) = hub_with_channel().await;
        let client_id = ClientId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.subscribe(
            encounter_id,
            client_id,
            "alice".to_string(),
            ParticipantRole::Player,
            tx,
        )
        .await
        .unwrap();

        for _ in 0..3 {
            let sequence = hub.reserve_sequence(encounter_id).await.unwrap();
            let event = DeltaEvent::new(encounter_id, sequence, DeltaKind::EncounterPaused);
            hub.dispatch(&event).await;
        }

        let mut received = Vec::new();
        while let Ok(ServerMessage::Delta { event }) = rx.try_recv() {
            received.push(event.sequence);
        }
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_second_director_with_other_user_rejected() {
        let (hub, encounter_id) = hub_with_channel().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.subscribe(
            encounter_id,
            ClientId::new(),
            "dm-one".to_string(),
            ParticipantRole::Director,
            tx,
        )
        .await
        .unwrap();

        let (tx2, _rx2) = mpsc::unbounded_channel();
        let result = hub
            .subscribe(
                encounter_id,
                ClientId::new(),
                "dm-two".to_string(),
                ParticipantRole::Director,
                tx2,
            )
            .await;
        assert!(matches!(result, Err(HubError::DirectorAlreadyPresent)));

        // Same user id (a second tab) is allowed.
        let (tx3, _rx3) = mpsc::unbounded_channel();
        assert!(hub
            .subscribe(
                encounter_id,
                ClientId::new(),
                "dm-one".to_string(),
                ParticipantRole::Director,
                tx3,
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unsubscribe_clears_index_and_director() {
        let (hub, encounter_id) = hub_with_channel().await;
        let client_id = ClientId::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.subscribe(
            encounter_id,
            client_id,
            "dm".to_string(),
            ParticipantRole::Director,
            tx,
        )
        .await
        .unwrap();
        assert!(hub.is_director(client_id).await);

        assert_eq!(hub.unsubscribe(client_id).await, Some(encounter_id));
        assert!(!hub.is_director(client_id).await);
        assert_eq!(hub.subscriber_count(encounter_id).await, 0);

        // Slot freed: a different director user may now join.
        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(hub
            .subscribe(
                encounter_id,
                ClientId::new(),
                "dm-two".to_string(),
                ParticipantRole::Director,
                tx2,
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_channel_is_an_error() {
        let hub = EncounterHub::new();
        let missing = EncounterId::new();
        assert!(matches!(
            hub.reserve_sequence(missing).await,
            Err(HubError::ChannelNotFound(_))
        ));
    }
}
