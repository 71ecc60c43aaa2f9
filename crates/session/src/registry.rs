//! Routing of inbound turns to per-conversation sessions.
//!
//! Every conversation key gets one worker task that owns its
//! [`ChatSession`] and drains a queue of inbound turns in arrival order.
//! Turns for one key are therefore appended and answered one at a time,
//! while different keys run in parallel. Queues are unbounded so a worker
//! stuck on a slow model call never holds up routing for other keys.

use std::collections::HashMap;

use minerva_core::channel::ChannelMessage;
use minerva_core::error::{ChannelError, Error, Result};
use minerva_core::message::{Content, ConversationKey, participant_author};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::{ChatSession, SessionServices, Trigger, TurnReport};

struct Worker {
    tx: mpsc::UnboundedSender<ChannelMessage>,
    handle: JoinHandle<()>,
}

/// Owns one session worker per conversation key.
pub struct SessionRegistry {
    services: SessionServices,
    workers: HashMap<ConversationKey, Worker>,
    reports: Option<mpsc::UnboundedSender<(ConversationKey, TurnReport)>>,
}

impl SessionRegistry {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services,
            workers: HashMap::new(),
            reports: None,
        }
    }

    /// Forward the report of every finished response cycle to `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<(ConversationKey, TurnReport)>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Number of conversations seen so far.
    pub fn session_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue an inbound turn on its conversation's worker, starting the
    /// worker on first contact.
    pub fn dispatch(&mut self, message: ChannelMessage) -> Result<()> {
        if message.text.is_none() && message.images.is_empty() {
            debug!(key = %message.key, "Ignoring empty message");
            return Ok(());
        }

        let key = message.key.clone();
        if !self.workers.contains_key(&key) {
            let worker = self.spawn_worker(key.clone())?;
            self.workers.insert(key.clone(), worker);
        }

        let Some(worker) = self.workers.get(&key) else {
            return Err(Error::Internal(format!("no worker for {key}")));
        };
        if worker.tx.send(message).is_err() {
            // The worker died; forget it so the next turn starts a fresh one
            self.workers.remove(&key);
            return Err(Error::Internal(format!("session worker for {key} stopped")));
        }
        Ok(())
    }

    /// Dispatch every turn from `rx` until the channel closes, then shut down.
    pub async fn run(mut self, mut rx: mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>) {
        info!(channel = %self.services.channel.name(), "Session registry running");

        while let Some(inbound) = rx.recv().await {
            match inbound {
                Ok(message) => {
                    if let Err(err) = self.dispatch(message) {
                        warn!(error = %err, "Failed to dispatch message");
                    }
                }
                Err(err) => warn!(error = %err, "Channel error"),
            }
        }

        self.shutdown().await;
    }

    /// Close every queue and wait for the workers to finish pending turns.
    pub async fn shutdown(self) {
        let count = self.workers.len();
        for (key, worker) in self.workers {
            drop(worker.tx);
            if let Err(err) = worker.handle.await {
                warn!(key = %key, error = %err, "Session worker panicked");
            }
        }
        info!(sessions = count, "Session registry stopped");
    }

    fn spawn_worker(&self, key: ConversationKey) -> Result<Worker> {
        let session = ChatSession::new(key.clone(), self.services.clone())?;
        let (tx, rx) = mpsc::unbounded_channel();
        let reports = self.reports.clone();

        info!(key = %key, "Starting session");
        let handle = tokio::spawn(session_worker(session, rx, reports));
        Ok(Worker { tx, handle })
    }
}

async fn session_worker(
    mut session: ChatSession,
    mut rx: mpsc::UnboundedReceiver<ChannelMessage>,
    reports: Option<mpsc::UnboundedSender<(ConversationKey, TurnReport)>>,
) {
    while let Some(message) = rx.recv().await {
        let author = participant_author(message.sender_username.as_deref(), &message.sender_id);
        session.record(author, Content::from_parts(message.text, message.images));

        if !message.addressed {
            continue;
        }

        let channel = session.channel();
        if let Err(err) = channel.send_typing(&message.key).await {
            debug!(key = %message.key, error = %err, "Typing indicator failed");
        }

        let trigger = Trigger {
            user_id: message.sender_id,
            reply_to: Some(message.message_id),
        };
        let report = session.create_response(&trigger).await;

        if let Some(tx) = &reports {
            let _ = tx.send((session.key().clone(), report));
        }
    }
    debug!(key = %session.key(), "Session worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSettings, TurnOutcome};
    use minerva_core::channel::ReplyTarget;
    use crate::test_helpers::{Delivery, RecordingChannel, ScriptedProvider, test_registry};
    use minerva_core::error::ProviderError;
    use minerva_core::message::Image;
    use minerva_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use minerva_core::token::HeuristicTokenCounter;
    use std::sync::Arc;
    use std::time::Duration;

    /// Never answers a conversation that mentions "slow".
    struct StalledProvider;

    #[async_trait::async_trait]
    impl Provider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
            if request.messages.iter().any(|m| m.text().contains("slow")) {
                std::future::pending::<()>().await;
            }
            Ok(ProviderResponse {
                content: "Action: respond\nhello".into(),
                usage: None,
                model: "mock".into(),
            })
        }
    }

    fn services(provider: Arc<ScriptedProvider>, channel: Arc<RecordingChannel>) -> SessionServices {
        SessionServices {
            provider,
            channel,
            tools: Arc::new(test_registry()),
            counter: Arc::new(HeuristicTokenCounter),
            settings: Arc::new(SessionSettings::default()),
            prompt: Arc::from("You are Minerva."),
        }
    }

    fn turn(key: &ConversationKey, id: &str, text: &str, addressed: bool) -> ChannelMessage {
        ChannelMessage {
            key: key.clone(),
            message_id: id.into(),
            sender_id: "42".into(),
            sender_username: Some("alice".into()),
            text: Some(text.into()),
            images: Vec::new(),
            addressed,
        }
    }

    #[tokio::test]
    async fn unaddressed_turns_are_only_recorded() {
        let provider = Arc::new(ScriptedProvider::replies(&["Action: respond\nhi"]));
        let channel = Arc::new(RecordingChannel::new());
        let mut registry = SessionRegistry::new(services(provider.clone(), channel.clone()));

        let key = ConversationKey::new("group");
        registry.dispatch(turn(&key, "1", "morning all", false)).unwrap();
        registry.dispatch(turn(&key, "2", "@minerva hi", true)).unwrap();
        registry.shutdown().await;

        assert_eq!(provider.call_count(), 1);
        // Both turns reach the model, in order
        let request = &provider.requests()[0];
        let texts: Vec<String> = request.messages.iter().skip(1).map(|e| e.text()).collect();
        assert_eq!(texts, vec!["morning all", "@minerva hi"]);
        assert_eq!(request.messages[1].name.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn addressed_turn_gets_typing_then_reply() {
        let provider = Arc::new(ScriptedProvider::replies(&["Action: respond\nhello"]));
        let channel = Arc::new(RecordingChannel::new());
        let (tx, mut reports) = mpsc::unbounded_channel();
        let mut registry = SessionRegistry::new(services(provider, channel.clone())).with_reports(tx);

        let key = ConversationKey::new("group").with_topic("3");
        let message = turn(&key, "99", "@minerva hello", true);
        let target = ReplyTarget::new(key.clone()).replying_to("99");
        registry.dispatch(message).unwrap();
        registry.shutdown().await;

        assert_eq!(
            channel.deliveries(),
            vec![
                Delivery::Typing(key.clone()),
                Delivery::Text {
                    target,
                    text: "hello".into()
                },
            ]
        );
        let (reported_key, report) = reports.recv().await.unwrap();
        assert_eq!(reported_key, key);
        assert_eq!(report.outcome, TurnOutcome::Responded);
    }

    #[tokio::test]
    async fn each_key_gets_its_own_session() {
        let provider = Arc::new(ScriptedProvider::replies(&["Action: respond\na", "Action: respond\nb"]));
        let channel = Arc::new(RecordingChannel::new());
        let mut registry = SessionRegistry::new(services(provider.clone(), channel));

        let first = ConversationKey::new("chat").with_topic("1");
        let second = ConversationKey::new("chat").with_topic("2");
        registry.dispatch(turn(&first, "1", "secret one", true)).unwrap();
        registry.dispatch(turn(&second, "2", "secret two", true)).unwrap();
        assert_eq!(registry.session_count(), 2);
        registry.shutdown().await;

        // Neither request sees the other conversation
        for request in provider.requests() {
            let all: String = request.messages.iter().map(|e| e.text()).collect();
            assert!(!(all.contains("secret one") && all.contains("secret two")));
        }
    }

    #[tokio::test]
    async fn anonymous_senders_get_id_author() {
        let provider = Arc::new(ScriptedProvider::replies(&["Action: respond\nhi"]));
        let channel = Arc::new(RecordingChannel::new());
        let mut registry = SessionRegistry::new(services(provider.clone(), channel));

        let key = ConversationKey::new("dm");
        let mut message = turn(&key, "5", "hey", true);
        message.sender_username = None;
        message.sender_id = "777".into();
        registry.dispatch(message).unwrap();
        registry.shutdown().await;

        let request = &provider.requests()[0];
        assert_eq!(request.messages[1].name.as_deref(), Some("id-777"));
        assert_eq!(request.user.as_deref(), Some("777"));
    }

    #[tokio::test]
    async fn images_are_forwarded() {
        let provider = Arc::new(ScriptedProvider::replies(&["Action: respond\na cat"]));
        let channel = Arc::new(RecordingChannel::new());
        let mut registry = SessionRegistry::new(services(provider.clone(), channel));

        let key = ConversationKey::new("dm");
        let mut message = turn(&key, "5", "what is this?", true);
        message.images = vec![Image::new("data:image/png;base64,AA", 64, 64)];
        registry.dispatch(message).unwrap();
        registry.shutdown().await;

        let entry = &provider.requests()[0].messages[1];
        assert_eq!(entry.content.len(), 2);
    }

    #[tokio::test]
    async fn empty_messages_are_ignored() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let channel = Arc::new(RecordingChannel::new());
        let mut registry = SessionRegistry::new(services(provider.clone(), channel));

        let mut message = turn(&ConversationKey::new("dm"), "5", "", true);
        message.text = None;
        registry.dispatch(message).unwrap();
        assert_eq!(registry.session_count(), 0);
        registry.shutdown().await;
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn stalled_conversation_does_not_hold_up_others() {
        let channel = Arc::new(RecordingChannel::new());
        let mut services = services(Arc::new(ScriptedProvider::replies(&[])), channel.clone());
        services.provider = Arc::new(StalledProvider);
        let (tx, mut reports) = mpsc::unbounded_channel();
        let mut registry = SessionRegistry::new(services).with_reports(tx);

        let busy = ConversationKey::new("busy");
        registry.dispatch(turn(&busy, "0", "a slow question", true)).unwrap();
        for id in 1..=200 {
            registry.dispatch(turn(&busy, &id.to_string(), "chatter", false)).unwrap();
        }
        let quiet = ConversationKey::new("quiet");
        registry.dispatch(turn(&quiet, "1", "@minerva hi", true)).unwrap();

        let (key, report) = tokio::time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .expect("quiet conversation was held up")
            .unwrap();
        assert_eq!(key, quiet);
        assert_eq!(report.outcome, TurnOutcome::Responded);
        assert_eq!(channel.texts(), vec!["hello"]);
    }

    #[tokio::test]
    async fn run_drains_the_channel() {
        let provider = Arc::new(ScriptedProvider::replies(&["Action: respond\none", "Action: respond\ntwo"]));
        let channel = Arc::new(RecordingChannel::new());
        let registry = SessionRegistry::new(services(provider, channel.clone()));

        let (tx, rx) = mpsc::channel(8);
        let key = ConversationKey::new("cli");
        tx.send(Ok(turn(&key, "1", "first", true))).await.unwrap();
        tx.send(Err(ChannelError::ConnectionLost("blip".into()))).await.unwrap();
        tx.send(Ok(turn(&key, "2", "second", true))).await.unwrap();
        drop(tx);

        registry.run(rx).await;
        assert_eq!(channel.texts(), vec!["one", "two"]);
    }
}
