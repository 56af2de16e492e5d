use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub mod outbox;

/// Side effect requested by a workflow. Persisted into the outbox inside the
/// mutating transaction and delivered later by the outbox worker.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Email {
        to: Vec<String>,
        subject: String,
        body: String,
    },
    Broadcast {
        topic: String,
        message: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl Notification {
    pub fn email(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Notification::Email {
            to,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn broadcast(
        topic: impl Into<String>,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Notification::Broadcast {
            topic: topic.into(),
            message: message.into(),
            payload,
        }
    }

    /// Stored in the outbox `event_type` column
    pub fn event_type(&self) -> &'static str {
        match self {
            Notification::Email { .. } => "email",
            Notification::Broadcast { .. } => "broadcast",
        }
    }
}

/// Outgoing mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, from: &str, to: &[String], subject: &str, body: &str)
        -> Result<(), String>;
}

/// Mailer that only records messages in the log
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        from: &str,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), String> {
        info!(
            from = %from,
            recipients = to.len(),
            subject = %subject,
            body_len = body.len(),
            "email sent"
        );
        Ok(())
    }
}

/// Message delivered to topic subscribers
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct BroadcastMessage {
    pub topic: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

/// In-process publish/subscribe fan-out for topic broadcasts.
///
/// Only receivers obtained from [`Broadcaster::subscribe`] see messages, and the
/// server itself registers none, so in production a broadcast is logged and dropped
/// unless an embedding application subscribes. Messages sent with no receiver count
/// as delivered and are not retried.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers reached. Nobody listening is not an error.
    pub fn publish(&self, topic: &str, message: &str, payload: serde_json::Value) -> usize {
        let msg = BroadcastMessage {
            topic: topic.to_string(),
            message: message.to_string(),
            payload,
            sent_at: Utc::now(),
        };
        match self.sender.send(msg) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(topic = %topic, "broadcast with no subscribers");
                0
            }
        }
    }
}

/// Routes each notification to its transport
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    broadcaster: Broadcaster,
    mail_from: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, broadcaster: Broadcaster, mail_from: String) -> Self {
        Self {
            mailer,
            broadcaster,
            mail_from,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub async fn dispatch(&self, notification: &Notification) -> Result<(), String> {
        match notification {
            Notification::Email { to, subject, body } => {
                if to.is_empty() {
                    debug!(subject = %subject, "email without recipients skipped");
                    return Ok(());
                }
                self.mailer.send(&self.mail_from, to, subject, body).await
            }
            Notification::Broadcast {
                topic,
                message,
                payload,
            } => {
                let reached = self.broadcaster.publish(topic, message, payload.clone());
                debug!(topic = %topic, reached, "broadcast published");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, Vec<String>, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            from: &str,
            to: &[String],
            subject: &str,
            _body: &str,
        ) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push((from.to_string(), to.to_vec(), subject.to_string()));
            Ok(())
        }
    }

    #[test]
    fn notifications_serialize_with_type_tag() {
        let n = Notification::broadcast("partner", "New partner", serde_json::json!({"id": 1}));
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "broadcast");
        assert_eq!(n.event_type(), "broadcast");
        let back: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(back, n);
    }

    #[tokio::test]
    async fn dispatcher_routes_email_and_broadcast() {
        let mailer = Arc::new(RecordingMailer::default());
        let broadcaster = Broadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let dispatcher =
            NotificationDispatcher::new(mailer.clone(), broadcaster, "ops@fit.local".into());

        dispatcher
            .dispatch(&Notification::email(
                vec!["admin@fit.local".into()],
                "Driver activated",
                "body",
            ))
            .await
            .unwrap();
        dispatcher
            .dispatch(&Notification::broadcast(
                "driver",
                "New driver",
                serde_json::Value::Null,
            ))
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops@fit.local");

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "driver");
    }

    #[test]
    fn publishing_without_subscribers_reaches_nobody() {
        let broadcaster = Broadcaster::new(4);
        assert_eq!(
            broadcaster.publish("store", "hello", serde_json::Value::Null),
            0
        );
    }
}
