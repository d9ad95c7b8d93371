// Shared test helpers — not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use chrono::Utc;
use palaver::api::{ChatApi, OutgoingMessage};
use palaver::channel::{LiveChannel, LocalBroker, Subscription};
use palaver::config::ClientConfig;
use palaver::errors::{PalaverError, PalaverResult};
use palaver::model::{ChannelEvent, ConversationHandle, Message, MessageKind, User};
use palaver::session::ConversationSession;
use palaver::staging::{InMemoryPreviews, StagedFile};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        name: format!("user {id}"),
    }
}

pub fn conversation(id: &str) -> ConversationHandle {
    ConversationHandle {
        id: id.to_string(),
        name: format!("conversation {id}"),
        users: vec![user("me"), user("u2")],
    }
}

pub fn message(id: &str, conversation_id: &str, author: &str) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        user: user(author),
        content: Some(format!("body {id}")),
        attachments: vec![],
        kind: MessageKind::Text,
        created_at: Utc::now(),
    }
}

pub fn message_event(id: &str, conversation_id: &str, author: &str) -> ChannelEvent {
    ChannelEvent::MessageSent {
        message: message(id, conversation_id, author),
    }
}

pub fn typing_event(user_id: &str, is_typing: bool) -> ChannelEvent {
    ChannelEvent::UserTyping {
        user: user(user_id),
        is_typing,
    }
}

pub fn image_file(name: &str) -> StagedFile {
    StagedFile {
        name: name.to_string(),
        media_type: "image/png".to_string(),
        size: 1024,
        data: vec![1u8; 8],
    }
}

pub fn pdf_file(name: &str) -> StagedFile {
    StagedFile {
        name: name.to_string(),
        media_type: "application/pdf".to_string(),
        size: 4096,
        data: vec![2u8; 8],
    }
}

pub fn transport_err(message: &str) -> PalaverError {
    PalaverError::Transport {
        message: message.to_string(),
        retryable: true,
    }
}

/// Let spawned session tasks (fetch, pump, drain) run. Under a paused
/// clock this is effectively instant and too short to trip the 300ms
/// typing debounce.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// `ChatApi` double with queued responses, recorded calls, and optional
/// per-call gates that hold a fetch/send open until released — for
/// exercising completions that land after the conversation has changed.
pub struct MockChatApi {
    local: User,
    minted: AtomicU64,
    fail_reads: AtomicBool,
    fetch_responses: Mutex<HashMap<String, VecDeque<PalaverResult<Vec<Message>>>>>,
    send_responses: Mutex<VecDeque<PalaverResult<Message>>>,
    fetch_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    send_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    pub fetched: Mutex<Vec<String>>,
    pub reads: Mutex<Vec<String>>,
    pub sends: Mutex<Vec<(String, OutgoingMessage)>>,
    pub typing_calls: Mutex<Vec<(String, bool)>>,
}

impl MockChatApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            local: user("me"),
            minted: AtomicU64::new(0),
            fail_reads: AtomicBool::new(false),
            fetch_responses: Mutex::new(HashMap::new()),
            send_responses: Mutex::new(VecDeque::new()),
            fetch_gates: Mutex::new(VecDeque::new()),
            send_gates: Mutex::new(VecDeque::new()),
            fetched: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            typing_calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue a history response for one conversation; responses are keyed
    /// by conversation so switch races cannot hand one conversation's batch
    /// to another.
    pub fn queue_fetch(&self, conversation_id: &str, response: PalaverResult<Vec<Message>>) {
        self.fetch_responses
            .lock()
            .unwrap()
            .entry(conversation_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn queue_send(&self, response: PalaverResult<Message>) {
        self.send_responses.lock().unwrap().push_back(response);
    }

    /// The next fetch call blocks until the returned sender fires (or drops).
    pub fn gate_next_fetch(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.fetch_gates.lock().unwrap().push_back(gate);
        release
    }

    pub fn gate_next_send(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.send_gates.lock().unwrap().push_back(gate);
        release
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn typing_calls(&self) -> Vec<(String, bool)> {
        self.typing_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn fetch_messages(&self, conversation_id: &str) -> PalaverResult<Vec<Message>> {
        self.fetched.lock().unwrap().push(conversation_id.to_string());
        let gate = self.fetch_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.fetch_responses
            .lock()
            .unwrap()
            .get_mut(conversation_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn mark_read(&self, conversation_id: &str) -> PalaverResult<()> {
        self.reads.lock().unwrap().push(conversation_id.to_string());
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(transport_err("read receipt rejected"));
        }
        Ok(())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        draft: OutgoingMessage,
    ) -> PalaverResult<Message> {
        self.sends
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), draft.clone()));
        let gate = self.send_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(queued) = self.send_responses.lock().unwrap().pop_front() {
            return queued;
        }
        // Default: mint the committed message the server would echo back
        let n = self.minted.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            id: format!("srv-{n}"),
            conversation_id: conversation_id.to_string(),
            user: self.local.clone(),
            content: draft.content,
            attachments: vec![],
            kind: draft.kind,
            created_at: Utc::now(),
        })
    }

    async fn send_typing(&self, conversation_id: &str, is_typing: bool) -> PalaverResult<()> {
        self.typing_calls
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), is_typing));
        Ok(())
    }
}

/// `LiveChannel` double whose subscribe always fails.
pub struct FailingChannel;

#[async_trait]
impl LiveChannel for FailingChannel {
    async fn subscribe(&self, topic: &str) -> PalaverResult<Subscription> {
        Err(PalaverError::Subscription {
            topic: topic.to_string(),
            message: "auth rejected".to_string(),
        })
    }

    async fn unsubscribe(&self, _subscription: Subscription) -> PalaverResult<()> {
        Ok(())
    }
}

pub struct TestSetup {
    pub session: ConversationSession,
    pub api: Arc<MockChatApi>,
    pub broker: Arc<LocalBroker>,
    pub previews: Arc<InMemoryPreviews>,
}

pub fn setup() -> TestSetup {
    // RUST_LOG=debug surfaces the session's lifecycle tracing when a test
    // needs debugging; repeated init attempts are fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let api = MockChatApi::new();
    let broker = Arc::new(LocalBroker::new());
    let previews = Arc::new(InMemoryPreviews::new());
    let session = ConversationSession::new(
        api.clone(),
        broker.clone(),
        previews.clone(),
        user("me"),
        ClientConfig::default(),
    );
    TestSetup {
        session,
        api,
        broker,
        previews,
    }
}
