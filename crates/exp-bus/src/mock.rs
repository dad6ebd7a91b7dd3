//! In-memory `Bus` fake for engine tests — no NATS server required.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::BusResult;
use crate::message::BusMessage;
use crate::{Bus, Subscription};

struct MockSub {
    pattern: String,
    // Feeds a spawned forwarder task, not the caller's receiver
    // directly — stopping the matching `Subscription` aborts that task,
    // which drops the caller's sender half and closes their channel,
    // mirroring `NatsBus`'s forwarder-owns-the-sender shape.
    sender: mpsc::UnboundedSender<BusMessage>,
}

/// An in-memory bus. Tests call [`MockBus::deliver`] to simulate a message
/// arriving on a subject, and inspect [`MockBus::published`] to see what
/// the engine published (e.g. heartbeats).
#[derive(Default)]
pub struct MockBus {
    subs: Mutex<Vec<MockSub>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a message arriving on `subject`, delivering it to every
    /// subscription whose pattern matches.
    pub async fn deliver(&self, subject: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let senders: Vec<mpsc::UnboundedSender<BusMessage>> = {
            let subs = self.subs.lock().unwrap();
            subs.iter()
                .filter(|s| subject_matches(&s.pattern, subject))
                .map(|s| s.sender.clone())
                .collect()
        };
        for sender in senders {
            let _ = sender.send(BusMessage {
                subject: subject.to_string(),
                data: data.clone(),
            });
        }
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bus for MockBus {
    async fn queue_subscribe(
        &self,
        subject: &str,
        _queue: &str,
        capacity: usize,
    ) -> BusResult<(mpsc::Receiver<BusMessage>, Subscription)> {
        let (tx, rx) = mpsc::channel(capacity);
        let (forward_tx, mut forward_rx) = mpsc::unbounded_channel();
        self.subs.lock().unwrap().push(MockSub {
            pattern: subject.to_string(),
            sender: forward_tx,
        });

        let handle = tokio::spawn(async move {
            while let Some(msg) = forward_rx.recv().await {
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });
        Ok((rx, Subscription::new(handle.abort_handle())))
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> BusResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }
}

/// Match a NATS-style subject pattern (tokens separated by `.`, trailing
/// `>` matches one or more remaining tokens) against a concrete subject.
fn subject_matches(pattern: &str, subject: &str) -> bool {
    let pattern_tokens: Vec<&str> = pattern.split('.').collect();
    let subject_tokens: Vec<&str> = subject.split('.').collect();

    for (i, token) in pattern_tokens.iter().enumerate() {
        if *token == ">" {
            return i < subject_tokens.len();
        }
        match subject_tokens.get(i) {
            Some(s) if *token == "*" || token == s => continue,
            _ => return false,
        }
    }
    pattern_tokens.len() == subject_tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_suffix_matches_extended_subjects() {
        assert!(subject_matches("export.a.>", "export.a.dev1"));
        assert!(subject_matches("export.a.>", "export.a.dev1.sub"));
        assert!(!subject_matches("export.a.>", "export.b.dev1"));
        assert!(!subject_matches("export.a.>", "export.a"));
    }

    #[tokio::test]
    async fn deliver_routes_to_matching_subscription() {
        let bus = MockBus::new();
        let (mut rx, _sub) = bus.queue_subscribe("export.a.>", "export", 8).await.unwrap();
        bus.deliver("export.a.dev1", &b"hello"[..]).await;

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.subject, "export.a.dev1");
        assert_eq!(&msg.data[..], b"hello");
    }

    #[tokio::test]
    async fn stopping_subscription_closes_the_channel() {
        let bus = MockBus::new();
        let (mut rx, sub) = bus.queue_subscribe("export.a.>", "export", 8).await.unwrap();

        sub.stop();
        // Give the aborted forwarder task a turn to actually stop and
        // drop its sender half.
        tokio::task::yield_now().await;

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn publish_is_recorded() {
        let bus = MockBus::new();
        bus.publish("heartbeat.export.service", vec![]).await.unwrap();
        assert_eq!(bus.published().len(), 1);
        assert_eq!(bus.published()[0].0, "heartbeat.export.service");
    }
}
