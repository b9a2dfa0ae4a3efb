//! Broadcast event channel: named fan-out of serialized payloads.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// Default event buffer size per channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("payload encode failed: {0}")]
    Encode(serde_json::Error),

    #[error("payload decode failed: {0}")]
    Decode(serde_json::Error),

    #[error("channel closed")]
    Closed,

    #[error("receiver lagged behind by {0} events")]
    Lagged(u64),
}

/// An event as delivered to subscribers.
///
/// The payload crosses the channel in serialized form, so posters and
/// subscribers only have to agree on the channel name and a serde-compatible
/// payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Name of the channel the event was posted on.
    pub channel: String,

    /// Wall-clock time at the posting side.
    pub emitted_at: DateTime<Utc>,

    /// The serialized payload.
    pub payload: Value,
}

impl Event {
    /// Deserialize the payload into the subscriber's chosen type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        serde_json::from_value(self.payload.clone()).map_err(ChannelError::Decode)
    }
}

/// A named channel fanning events out to any number of subscribers.
///
/// Design intent:
/// - Clones share the same stream; posting on any clone reaches every
///   subscriber.
/// - Delivery is best-effort with a bounded buffer. A subscriber that falls
///   more than the capacity behind observes `Lagged` instead of blocking
///   posters.
/// - Posting with zero subscribers is not an error; the event simply
///   reaches nobody.
#[derive(Clone)]
pub struct EventChannel {
    name: String,
    tx: broadcast::Sender<Event>,
}

impl EventChannel {
    /// Create a channel with the default buffer capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel with an explicit buffer capacity.
    ///
    /// Panics if `capacity` is zero (the underlying broadcast channel
    /// requires at least 1).
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize `payload` and fan it out to current subscribers.
    ///
    /// Returns the number of subscribers the event reached.
    pub fn post<T: Serialize>(&self, payload: &T) -> Result<usize, ChannelError> {
        let payload = serde_json::to_value(payload).map_err(ChannelError::Encode)?;
        let event = Event {
            channel: self.name.clone(),
            emitted_at: Utc::now(),
            payload,
        };
        // send only errors when there is no receiver; report that as 0.
        Ok(self.tx.send(event).unwrap_or(0))
    }

    /// Subscribe to events posted from this point on.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving side of an [`EventChannel`], with its own cursor into the
/// stream.
pub struct EventReceiver {
    rx: broadcast::Receiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// `Closed` once every channel handle is dropped; `Lagged(n)` if this
    /// receiver fell behind and `n` events were overwritten. A lagged
    /// receiver stays usable and resumes at the oldest retained event.
    pub async fn recv(&mut self) -> Result<Event, ChannelError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Closed) => Err(ChannelError::Closed),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(ChannelError::Lagged(n)),
        }
    }

    /// Take an event if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Event>, ChannelError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(ChannelError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(ChannelError::Lagged(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
        note: String,
    }

    #[tokio::test]
    async fn post_and_decode_roundtrip() {
        let channel = EventChannel::new("review");
        let mut rx = channel.subscribe();

        let reached = channel
            .post(&Ping {
                seq: 7,
                note: "updated".into(),
            })
            .unwrap();
        assert_eq!(reached, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, "review");
        assert_eq!(channel.name(), "review");
        let ping: Ping = event.decode().unwrap();
        assert_eq!(ping.seq, 7);
        assert_eq!(ping.note, "updated");
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = Event {
            channel: "review".to_string(),
            emitted_at: Utc::now(),
            payload: serde_json::json!({"seq": 1}),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(back.channel, event.channel);
        assert_eq!(back.emitted_at, event.emitted_at);
        assert_eq!(back.payload, event.payload);
    }

    #[tokio::test]
    async fn decode_mismatch_is_an_error() {
        let channel = EventChannel::new("review");
        let mut rx = channel.subscribe();
        channel
            .post(&Ping {
                seq: 1,
                note: "x".into(),
            })
            .unwrap();

        let event = rx.recv().await.unwrap();
        let decoded: Result<Vec<u8>, _> = event.decode();
        assert!(matches!(decoded, Err(ChannelError::Decode(_))));
    }

    #[tokio::test]
    async fn post_without_subscribers_reaches_nobody() {
        let channel = EventChannel::new("review");
        let reached = channel
            .post(&Ping {
                seq: 1,
                note: "x".into(),
            })
            .unwrap();
        assert_eq!(reached, 0);

        // A subscriber created later does not see earlier events.
        let mut rx = channel.subscribe();
        assert!(rx.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_the_stream() {
        let channel = EventChannel::new("review");
        let mut rx = channel.subscribe();

        let other = channel.clone();
        other
            .post(&Ping {
                seq: 2,
                note: "from clone".into(),
            })
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.decode::<Ping>().unwrap().seq, 2);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let channel = EventChannel::with_capacity("review", 2);
        let mut rx = channel.subscribe();

        for seq in 0..5 {
            channel
                .post(&Ping {
                    seq,
                    note: "spam".into(),
                })
                .unwrap();
        }

        // Capacity 2 with 5 posts: 3 events were overwritten.
        match rx.recv().await {
            Err(ChannelError::Lagged(n)) => assert_eq!(n, 3),
            other => panic!("expected lag, got {other:?}"),
        }
        // The receiver resumes at the oldest retained event.
        let event = rx.recv().await.unwrap();
        assert_eq!(event.decode::<Ping>().unwrap().seq, 3);
    }

    #[tokio::test]
    async fn recv_reports_closed_after_all_handles_drop() {
        let channel = EventChannel::new("review");
        let mut rx = channel.subscribe();
        drop(channel);

        assert!(matches!(rx.recv().await, Err(ChannelError::Closed)));
    }
}
