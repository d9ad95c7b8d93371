mod tasks;

use crate::api::{ChatApi, OutgoingMessage};
use crate::channel::{LiveChannel, Subscription};
use crate::config::ClientConfig;
use crate::errors::{PalaverError, PalaverResult};
use crate::model::{ChannelEvent, ConversationHandle, Message, User};
use crate::staging::{AttachmentStaging, PreviewStore, StagedFile};
use crate::store::{Ingest, MessageStore};
use crate::typing::TypingPresence;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tasks::TaskSet;
use tracing::{debug, info, warn};

/// Orchestrates the per-conversation lifecycle: tears down and rebuilds the
/// store, typing presence, staging, and live subscription on every
/// selection change, and keeps racing async completions from leaking across
/// switches.
///
/// Every spawned operation captures the conversation epoch current at spawn
/// time; a completion whose epoch no longer matches is discarded on
/// arrival. Timers are additionally hard-aborted at teardown.
pub struct ConversationSession {
    api: Arc<dyn ChatApi>,
    channel: Arc<dyn LiveChannel>,
    local_user: User,
    config: ClientConfig,
    state: Arc<SessionState>,
}

struct SessionState {
    epoch: AtomicU64,
    active: Mutex<Option<ConversationHandle>>,
    store: Mutex<MessageStore>,
    staging: Mutex<AttachmentStaging>,
    typing: Mutex<Option<TypingPresence>>,
    composer: Mutex<String>,
    subscription: Mutex<Option<Subscription>>,
    tasks: TaskSet,
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().expect("session state lock poisoned")
}

impl SessionState {
    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    fn apply_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::MessageSent { message } => {
                let author_id = message.user.id.clone();
                let outcome = lock(&self.store).ingest(message);
                match outcome {
                    Ok(Ingest::Appended) => {}
                    Ok(Ingest::Duplicate) => debug!("suppressed duplicate push delivery"),
                    Err(e) => {
                        warn!("rejected malformed push message: {e}");
                        return;
                    }
                }
                // A delivered message ends its author's typing indicator
                let typing = lock(&self.typing);
                if let Some(typing) = typing.as_ref() {
                    typing.clear_user(&author_id);
                }
            }
            ChannelEvent::UserTyping { user, is_typing } => {
                let typing = lock(&self.typing);
                if let Some(typing) = typing.as_ref() {
                    typing.on_remote_signal(user, is_typing);
                }
            }
        }
    }
}

impl ConversationSession {
    pub fn new(
        api: Arc<dyn ChatApi>,
        channel: Arc<dyn LiveChannel>,
        previews: Arc<dyn PreviewStore>,
        local_user: User,
        config: ClientConfig,
    ) -> Self {
        Self {
            api,
            channel,
            local_user,
            config,
            state: Arc::new(SessionState {
                epoch: AtomicU64::new(0),
                active: Mutex::new(None),
                store: Mutex::new(MessageStore::new()),
                staging: Mutex::new(AttachmentStaging::new(previews)),
                typing: Mutex::new(None),
                composer: Mutex::new(String::new()),
                subscription: Mutex::new(None),
                tasks: TaskSet::new(),
            }),
        }
    }

    pub fn local_user(&self) -> &User {
        &self.local_user
    }

    pub fn active_conversation(&self) -> Option<ConversationHandle> {
        lock(&self.state.active).clone()
    }

    /// Whether a live subscription is currently open. False after a
    /// subscription failure: history still renders, live updates will not
    /// arrive until the conversation is re-selected.
    pub fn is_live(&self) -> bool {
        lock(&self.state.subscription).is_some()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state.store).messages().to_vec()
    }

    pub fn typing_users(&self) -> Vec<User> {
        lock(&self.state.typing)
            .as_ref()
            .map(TypingPresence::typing_users)
            .unwrap_or_default()
    }

    pub fn composer(&self) -> String {
        lock(&self.state.composer).clone()
    }

    pub fn staged(&self) -> Vec<StagedFile> {
        lock(&self.state.staging).files()
    }

    /// Switch to `conversation` (or to none). Tears the previous
    /// conversation fully down, then — for a real selection — fetches
    /// history and opens the live subscription independently of each other.
    /// Returns once the teardown and the subscription attempt are done; the
    /// fetch continues in the background.
    pub async fn select(&self, conversation: Option<ConversationHandle>) {
        let epoch = self.state.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.teardown().await;
        *lock(&self.state.active) = conversation.clone();

        let Some(conversation) = conversation else {
            debug!("conversation deselected");
            return;
        };
        info!("selecting conversation {}", conversation.id);

        self.spawn_typing_drain(&conversation, epoch);
        self.open_subscription(&conversation, epoch).await;
        if !self.state.is_current(epoch) {
            // Another selection happened while the subscribe was in flight;
            // spawning our fetch now would displace the newer one.
            return;
        }
        self.spawn_history_fetch(&conversation, epoch);
    }

    async fn teardown(&self) {
        let previous = lock(&self.state.subscription).take();
        if let Some(subscription) = previous {
            debug!("closing subscription to {}", subscription.topic());
            if let Err(e) = self.channel.unsubscribe(subscription).await {
                warn!("unsubscribe failed: {e}");
            }
        }
        self.state.tasks.cancel_all();
        if let Some(typing) = lock(&self.state.typing).take() {
            typing.cancel_all();
        }
        lock(&self.state.staging).clear();
        lock(&self.state.store).reset();
        lock(&self.state.composer).clear();
    }

    /// Fresh typing presence for the selected conversation, plus the drain
    /// task forwarding its debounced signals to the backend.
    fn spawn_typing_drain(&self, conversation: &ConversationHandle, epoch: u64) {
        let (presence, mut signals) = TypingPresence::new(
            self.local_user.id.clone(),
            self.config.timing.typing_expiry(),
            self.config.timing.typing_debounce(),
        );
        *lock(&self.state.typing) = Some(presence);

        let api = self.api.clone();
        let state = self.state.clone();
        let conversation_id = conversation.id.clone();
        let handle = tokio::spawn(async move {
            while let Some(is_typing) = signals.recv().await {
                if !state.is_current(epoch) {
                    break;
                }
                if let Err(e) = api.send_typing(&conversation_id, is_typing).await {
                    debug!("typing signal for {} dropped: {e}", conversation_id);
                }
            }
        });
        self.state.tasks.spawn("typing-signals", handle);
    }

    async fn open_subscription(&self, conversation: &ConversationHandle, epoch: u64) {
        let topic = format!("{}{}", self.config.channel.topic_prefix, conversation.id);
        match self.channel.subscribe(&topic).await {
            Ok(mut subscription) => {
                if !self.state.is_current(epoch) {
                    debug!("discarding subscription to {} for superseded selection", topic);
                    if let Err(e) = self.channel.unsubscribe(subscription).await {
                        warn!("unsubscribe of stale subscription failed: {e}");
                    }
                    return;
                }
                let Some(mut events) = subscription.take_events() else {
                    warn!("subscription to {} arrived without an event stream", topic);
                    return;
                };
                *lock(&self.state.subscription) = Some(subscription);
                info!("subscribed to {}", topic);

                let state = self.state.clone();
                let handle = tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if !state.is_current(epoch) {
                            break;
                        }
                        state.apply_event(event);
                    }
                });
                self.state.tasks.spawn("event-pump", handle);
            }
            Err(e) => {
                // Non-fatal: history still renders without live updates
                warn!("live channel unavailable for {}: {e}", topic);
            }
        }
    }

    fn spawn_history_fetch(&self, conversation: &ConversationHandle, epoch: u64) {
        let api = self.api.clone();
        let state = self.state.clone();
        let conversation_id = conversation.id.clone();
        let handle = tokio::spawn(async move {
            match api.fetch_messages(&conversation_id).await {
                Ok(batch) => {
                    if !state.is_current(epoch) {
                        debug!("discarding history for superseded conversation {}", conversation_id);
                        return;
                    }
                    let count = batch.len();
                    if let Err(e) = lock(&state.store).load_batch(batch) {
                        warn!("rejected history batch for {}: {e}", conversation_id);
                        return;
                    }
                    debug!("history loaded for {} ({} messages)", conversation_id, count);
                    // Read receipt rides on a successful fetch; its failure
                    // never blocks or rolls back the load.
                    if let Err(e) = api.mark_read(&conversation_id).await {
                        debug!("read receipt for {} failed: {e}", conversation_id);
                    }
                }
                Err(e) => warn!("history fetch for {} failed: {e}", conversation_id),
            }
        });
        self.state.tasks.spawn("history-fetch", handle);
    }

    /// Record composer text and drive the local typing edge from whether
    /// any non-whitespace content is present.
    pub fn set_composer(&self, text: impl Into<String>) {
        let text = text.into();
        let has_content = !text.trim().is_empty();
        *lock(&self.state.composer) = text;
        let typing = lock(&self.state.typing);
        if let Some(typing) = typing.as_ref() {
            typing.set_local_typing(has_content);
        }
    }

    /// Direct typing intent, for focus/blur style hosts that signal outside
    /// of composer edits.
    pub fn signal_typing(&self, typing: bool) {
        let presence = lock(&self.state.typing);
        if let Some(presence) = presence.as_ref() {
            presence.set_local_typing(typing);
        }
    }

    pub fn stage_files(&self, files: Vec<StagedFile>) {
        lock(&self.state.staging).add(files);
    }

    pub fn remove_staged(&self, index: usize) -> Option<StagedFile> {
        lock(&self.state.staging).remove_at(index)
    }

    /// Optimistic send of the composer content plus staged attachments.
    ///
    /// `Ok(None)` when there was nothing to send or the result arrived for
    /// a superseded conversation. On failure the composer and staging are
    /// left intact for a user-initiated retry.
    pub async fn send(&self) -> PalaverResult<Option<Message>> {
        let conversation = lock(&self.state.active)
            .clone()
            .ok_or_else(|| PalaverError::Session("no conversation selected".into()))?;
        let text = lock(&self.state.composer).clone();
        let has_text = !text.trim().is_empty();
        let files = lock(&self.state.staging).files();
        if !has_text && files.is_empty() {
            return Ok(None);
        }
        let kind = lock(&self.state.staging).classify(&text);
        let draft = OutgoingMessage {
            content: has_text.then(|| text),
            kind,
            files,
        };

        let epoch = self.state.current_epoch();
        let sent = self.api.send_message(&conversation.id, draft).await?;
        if !self.state.is_current(epoch) {
            debug!("send completed for superseded conversation {}", conversation.id);
            return Ok(None);
        }

        match lock(&self.state.store).ingest(sent.clone()) {
            Ok(Ingest::Appended) => {}
            Ok(Ingest::Duplicate) => debug!("server echo already delivered via push"),
            Err(e) => warn!("committed message failed validation: {e}"),
        }
        lock(&self.state.composer).clear();
        lock(&self.state.staging).clear();
        let typing = lock(&self.state.typing);
        if let Some(typing) = typing.as_ref() {
            typing.force_local_idle();
        }
        Ok(Some(sent))
    }
}
