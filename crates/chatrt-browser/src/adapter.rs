//! The browser-automation platform adapter: drives a WebDriver session
//! through login, DOM message scraping, and send interactions.
//!
//! Grounded on `conductor/core/src/transport/factory.rs`'s config-driven
//! construction for `new()`/`connect()` shape, and on
//! `conductor/core/src/backend/ollama.rs`'s request/response polling-loop
//! shape for [`BrowserAdapter::spawn_polling`] (periodic async call feeding
//! results back through the shared event emitter).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fantoccini::{Client, ClientBuilder, Locator};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use chatrt_behavior::{BehaviouralState, BehaviouralStateMachine, HumanResponseSimulator};
use chatrt_core::{Adapter, AdapterError, Attachment, EventBuilder, EventEmitter};
use chatrt_types::{Conversation, ConversationType, Message, MessageContent, Platform, ScopedId, User};

use crate::config::BrowserConfig;
use crate::error::BrowserError;
use crate::selectors::Selectors;

/// The WebDriver wire-protocol codepoint for the Backspace key, used to
/// retract the placeholder keystroke [`BrowserAdapter::set_typing`] sends to
/// trigger the page's own typing indicator.
const BACKSPACE_KEY: &str = "\u{E003}";

fn to_adapter_error(err: BrowserError) -> AdapterError {
    match err {
        BrowserError::AttachmentUnsupported(msg) => AdapterError::Validation(msg),
        other => AdapterError::Transport(other.to_string()),
    }
}

fn build_capabilities(config: &BrowserConfig) -> serde_json::Map<String, serde_json::Value> {
    let mut args = vec![format!("--user-data-dir={}", config.user_data_dir.display())];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if let Some(proxy) = &config.proxy {
        args.push(format!("--proxy-server={proxy}"));
    }

    let mut capabilities = serde_json::Map::new();
    match config.browser_profile.as_str() {
        "firefox" => {
            let mut firefox_args = vec![config.user_data_dir.display().to_string()];
            if config.headless {
                firefox_args.push("-headless".to_string());
            }
            capabilities.insert(
                "moz:firefoxOptions".to_string(),
                serde_json::json!({ "args": firefox_args }),
            );
        }
        _ => {
            capabilities.insert("goog:chromeOptions".to_string(), serde_json::json!({ "args": args }));
        }
    }
    capabilities
}

/// Adapter over a WebDriver-backed browser session, authenticating against
/// a chat web app and translating its DOM into unified events.
pub struct BrowserAdapter {
    config: BrowserConfig,
    selectors: Selectors,
    events: Arc<EventEmitter>,
    client: AsyncMutex<Option<Client>>,
    connected: AtomicBool,
    poller: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
    known_messages: Mutex<HashSet<String>>,
    behavior: Mutex<Option<Arc<BehaviouralStateMachine>>>,
    human_response: Mutex<Option<HumanResponseSimulator>>,
}

impl BrowserAdapter {
    /// Construct an adapter, not yet connected.
    #[must_use]
    pub fn new(config: BrowserConfig) -> Arc<Self> {
        let selectors = config.selectors();
        let human_response = config
            .session_profile
            .map(|profile| HumanResponseSimulator::new(profile, Arc::new(|| rand::random::<f64>()), Arc::new(current_hour)));
        Arc::new(Self {
            config,
            selectors,
            events: Arc::new(EventEmitter::new()),
            client: AsyncMutex::new(None),
            connected: AtomicBool::new(false),
            poller: AsyncMutex::new(None),
            known_messages: Mutex::new(HashSet::new()),
            behavior: Mutex::new(None),
            human_response: Mutex::new(human_response),
        })
    }

    /// Attach a behavioural state machine whose current state modulates the
    /// DOM-polling cadence (e.g. polling less often while `Away`).
    pub fn set_behavior(&self, behavior: Arc<BehaviouralStateMachine>) {
        *self.behavior.lock() = Some(behavior);
    }

    async fn client_handle(&self) -> Result<Client, AdapterError> {
        self.client.lock().await.clone().ok_or(AdapterError::NotConnected)
    }

    fn poll_interval(&self) -> Duration {
        let base = Duration::from_millis(self.config.message_polling_interval_ms);
        compute_poll_interval(base, self.behavior.lock().as_ref().map(|b| b.state()))
    }

    async fn find_with_timeout(&self, client: &Client, selector: &str) -> Result<fantoccini::elements::Element, BrowserError> {
        client
            .wait()
            .at_most(Duration::from_millis(self.config.element_timeout_ms))
            .for_element(Locator::Css(selector))
            .await
            .map_err(|_| BrowserError::ElementTimeout {
                selector: selector.to_string(),
                timeout_ms: self.config.element_timeout_ms,
            })
    }

    async fn login(&self, client: &Client) -> Result<(), BrowserError> {
        if client
            .wait()
            .at_most(Duration::from_millis(self.config.element_timeout_ms))
            .for_element(Locator::Css(&self.selectors.authenticated_marker))
            .await
            .is_ok()
        {
            debug!("session already authenticated, skipping login form");
            return Ok(());
        }

        let username = self.find_with_timeout(client, &self.selectors.login_username).await?;
        username.send_keys(&self.config.credentials.username).await?;
        let password = self.find_with_timeout(client, &self.selectors.login_password).await?;
        password.send_keys(&self.config.credentials.password).await?;
        let submit = self.find_with_timeout(client, &self.selectors.login_submit).await?;
        submit.click().await?;

        client
            .wait()
            .at_most(Duration::from_millis(self.config.element_timeout_ms))
            .for_element(Locator::Css(&self.selectors.authenticated_marker))
            .await
            .map_err(|_| BrowserError::LoginFailed("authenticated marker never appeared after submit".to_string()))?;
        Ok(())
    }

    async fn spawn_polling(&self) {
        let client = match self.client_handle().await {
            Ok(client) => client,
            Err(_) => return,
        };
        let events = Arc::clone(&self.events);
        let selectors = self.selectors.clone();
        // The poll task gets its own independently-owned dedup set seeded
        // from whatever `self.known_messages` already holds, rather than a
        // shared `Arc`, since nothing outside this adapter needs to observe
        // it; a reconnect may re-emit messages a prior poller generation
        // already saw.
        let known_messages = Arc::new(Mutex::new(self.known_messages.lock().clone()));
        let base_interval = Duration::from_millis(self.config.message_polling_interval_ms);
        let behavior = self.behavior.lock().clone();

        let handle = tokio::spawn(poll_loop(client, events, selectors, known_messages, base_interval, behavior));
        *self.poller.lock().await = Some(handle);
    }

    async fn stage_attachment(&self, attachment: Attachment, filename: &str) -> Result<PathBuf, BrowserError> {
        match attachment {
            Attachment::Bytes(bytes) => {
                let dir = self.config.user_data_dir.join(".chatrt-uploads");
                tokio::fs::create_dir_all(&dir).await?;
                let path = dir.join(format!("{}-{filename}", ScopedId::generate().0));
                tokio::fs::write(&path, bytes).await?;
                Ok(path)
            }
            Attachment::Url(url) => Err(BrowserError::AttachmentUnsupported(format!(
                "remote attachment url {url} requires a local file path for <input type=file> upload"
            ))),
        }
    }

    async fn upload_and_send(
        &self,
        client: &Client,
        conversation: &Conversation,
        path: &PathBuf,
        caption: Option<&str>,
        content: MessageContent,
    ) -> Result<Message, AdapterError> {
        let file_input = self.find_with_timeout(client, &self.selectors.file_input).await.map_err(to_adapter_error)?;
        file_input
            .send_keys(&path.display().to_string())
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;
        if let Some(caption) = caption {
            let composer = self.find_with_timeout(client, &self.selectors.composer_input).await.map_err(to_adapter_error)?;
            composer.send_keys(caption).await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        }
        let send = self.find_with_timeout(client, &self.selectors.send_button).await.map_err(to_adapter_error)?;
        send.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;

        Ok(Message::new(ScopedId::generate(), conversation.id.clone(), self.local_user(), Utc::now(), content))
    }

    fn local_user(&self) -> User {
        let mut user = User::new(ScopedId::from(self.config.credentials.username.clone()), Platform::Browser);
        user.username = Some(self.config.credentials.username.clone());
        user
    }

    async fn simulate_typing_delay(&self, response_text: &str) {
        let plan = self.human_response.lock().as_ref().map(|sim| sim.plan_response("", response_text));
        if let Some(plan) = plan {
            tokio::time::sleep(Duration::from_millis(plan.typing_duration_ms)).await;
        }
    }
}

fn current_hour() -> u32 {
    Utc::now().format("%H").to_string().parse().unwrap_or(12)
}

/// The cadence modulation [`BrowserAdapter::poll_interval`] and [`poll_loop`]
/// share: a behaviour state of `Away`/`Idle` stretches the base interval so
/// a persona polls less eagerly while it wouldn't plausibly be looking.
fn compute_poll_interval(base: Duration, state: Option<BehaviouralState>) -> Duration {
    match state {
        Some(BehaviouralState::Away) => base * 5,
        Some(BehaviouralState::Idle) => base * 2,
        _ => base,
    }
}

async fn poll_loop(
    client: Client,
    events: Arc<EventEmitter>,
    selectors: Selectors,
    known_messages: Arc<Mutex<HashSet<String>>>,
    base_interval: Duration,
    behavior: Option<Arc<BehaviouralStateMachine>>,
) {
    loop {
        match client.find_all(Locator::Css(&selectors.message_item)).await {
            Ok(elements) => {
                for element in elements {
                    match map_message_element(&element, &selectors).await {
                        Ok(Some(message)) => {
                            let already_seen = {
                                let mut seen = known_messages.lock();
                                !seen.insert(message.id.0.clone())
                            };
                            if !already_seen {
                                events.emit(EventBuilder::message(Platform::Browser, message));
                            }
                        }
                        Ok(None) => {}
                        Err(err) => debug!(%err, "skipping unreadable message card"),
                    }
                }
            }
            Err(err) => warn!(%err, "dom poll failed"),
        }
        let interval = compute_poll_interval(base_interval, behavior.as_ref().map(|b| b.state()));
        tokio::time::sleep(interval).await;
    }
}

async fn map_message_element(element: &fantoccini::elements::Element, selectors: &Selectors) -> Result<Option<Message>, BrowserError> {
    let text = match element.find(Locator::Css(&selectors.message_text)).await {
        Ok(text_element) => text_element.text().await?,
        Err(_) => return Ok(None),
    };
    let sender_name = element
        .find(Locator::Css(&selectors.message_sender))
        .await
        .ok();
    let sender_name = match sender_name {
        Some(el) => el.text().await.ok(),
        None => None,
    };
    let outgoing = element.find(Locator::Css(&selectors.message_outgoing_marker)).await.is_ok();
    if outgoing {
        // Already surfaced as the return value of the `send*` call that
        // produced it; re-emitting it here would echo our own traffic back
        // as inbound.
        return Ok(None);
    }
    let conversation_id = element
        .attr("data-conversation-id")
        .await?
        .map(ScopedId::from)
        .unwrap_or_else(|| ScopedId::from("unknown"));
    let message_id = element
        .attr("data-message-id")
        .await?
        .map(ScopedId::from)
        .unwrap_or_else(ScopedId::generate);

    let mut sender = User::new(
        ScopedId::from(sender_name.clone().unwrap_or_else(|| "unknown".to_string())),
        Platform::Browser,
    );
    sender.display_name = sender_name;

    Ok(Some(Message::new(message_id, conversation_id, sender, Utc::now(), MessageContent::text(text))))
}

#[async_trait]
impl Adapter for BrowserAdapter {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    fn events(&self) -> &EventEmitter {
        self.events.as_ref()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            return Err(AdapterError::AlreadyConnected);
        }
        let capabilities = build_capabilities(&self.config);
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&self.config.webdriver_url)
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;

        client.goto(&self.config.target_url).await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        self.login(&client).await.map_err(to_adapter_error)?;

        *self.client.lock().await = Some(client);
        self.spawn_polling().await;
        self.connected.store(true, Ordering::SeqCst);
        self.events.emit(EventBuilder::connected(self.platform()));
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        if let Some(client) = self.client.lock().await.take() {
            if let Err(err) = client.close().await {
                warn!(%err, "failed to close webdriver session cleanly");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
        self.events.emit(EventBuilder::disconnected(self.platform(), None));
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        self.simulate_typing_delay(text).await;
        let client = self.client_handle().await?;
        let composer = self.find_with_timeout(&client, &self.selectors.composer_input).await.map_err(to_adapter_error)?;
        composer.send_keys(text).await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        let send = self.find_with_timeout(&client, &self.selectors.send_button).await.map_err(to_adapter_error)?;
        send.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        Ok(Message::new(
            ScopedId::generate(),
            conversation.id.clone(),
            self.local_user(),
            Utc::now(),
            MessageContent::text(text),
        ))
    }

    async fn send_image(&self, conversation: &Conversation, attachment: Attachment, caption: Option<&str>) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let path = self.stage_attachment(attachment, "upload.jpg").await.map_err(to_adapter_error)?;
        let client = self.client_handle().await?;
        let content = MessageContent::Image {
            url: path.display().to_string(),
            caption: caption.map(str::to_string),
        };
        self.upload_and_send(&client, conversation, &path, caption, content).await
    }

    async fn send_video(&self, conversation: &Conversation, attachment: Attachment, caption: Option<&str>) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let path = self.stage_attachment(attachment, "upload.mp4").await.map_err(to_adapter_error)?;
        let client = self.client_handle().await?;
        let content = MessageContent::Video {
            url: path.display().to_string(),
            caption: caption.map(str::to_string),
        };
        self.upload_and_send(&client, conversation, &path, caption, content).await
    }

    async fn send_audio(&self, conversation: &Conversation, attachment: Attachment, duration_ms: u64) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let path = self.stage_attachment(attachment, "upload.mp3").await.map_err(to_adapter_error)?;
        let client = self.client_handle().await?;
        let content = MessageContent::Audio {
            url: path.display().to_string(),
            duration_ms,
        };
        self.upload_and_send(&client, conversation, &path, None, content).await
    }

    async fn send_voice(&self, conversation: &Conversation, attachment: Attachment, duration_ms: u64) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let path = self.stage_attachment(attachment, "upload.ogg").await.map_err(to_adapter_error)?;
        let client = self.client_handle().await?;
        let content = MessageContent::Voice {
            url: path.display().to_string(),
            duration_ms,
        };
        self.upload_and_send(&client, conversation, &path, None, content).await
    }

    async fn send_file(&self, conversation: &Conversation, attachment: Attachment, filename: &str) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let path = self.stage_attachment(attachment, filename).await.map_err(to_adapter_error)?;
        let client = self.client_handle().await?;
        let content = MessageContent::File {
            url: path.display().to_string(),
            filename: filename.to_string(),
            size: None,
        };
        self.upload_and_send(&client, conversation, &path, None, content).await
    }

    async fn send_location(&self, _conversation: &Conversation, _lat: f64, _lng: f64) -> Result<Message, AdapterError> {
        Err(AdapterError::UnsupportedOperation("sendLocation"))
    }

    async fn react(&self, message: &Message, emoji: &str) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let client = self.client_handle().await?;
        let card_selector = format!("{}[data-message-id='{}']", self.selectors.message_item, message.id.0);
        let card = self.find_with_timeout(&client, &card_selector).await.map_err(to_adapter_error)?;
        let trigger = card
            .find(Locator::Css(&self.selectors.reaction_trigger))
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;
        trigger.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        let picker_item = self
            .find_with_timeout(&client, &self.selectors.reaction_picker_item_for(emoji))
            .await
            .map_err(to_adapter_error)?;
        picker_item.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        Ok(())
    }

    /// No selector models a native reply affordance; sends as a new message
    /// with `reply_to` stamped locally rather than via a DOM reply control.
    async fn reply(&self, message: &Message, content: MessageContent) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let conversation = Conversation::new(message.conversation_id.clone(), Platform::Browser, ConversationType::Dm);
        let mut sent = self.send(&conversation, content).await?;
        sent.reply_to = Some(message.as_stub());
        Ok(sent)
    }

    async fn forward(&self, message: &Message, target: &Conversation) -> Result<Message, AdapterError> {
        self.ensure_connected()?;
        let client = self.client_handle().await?;
        let card_selector = format!("{}[data-message-id='{}']", self.selectors.message_item, message.id.0);
        let card = self.find_with_timeout(&client, &card_selector).await.map_err(to_adapter_error)?;
        let forward_button = card
            .find(Locator::Css(&self.selectors.forward_button))
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;
        forward_button.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;

        let search = self.find_with_timeout(&client, &self.selectors.forward_search_input).await.map_err(to_adapter_error)?;
        search.send_keys(&target.id.0).await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        let confirm = self.find_with_timeout(&client, &self.selectors.forward_confirm_button).await.map_err(to_adapter_error)?;
        confirm.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;

        Ok(Message::new(
            ScopedId::generate(),
            target.id.clone(),
            self.local_user(),
            Utc::now(),
            message.content.clone(),
        ))
    }

    async fn delete(&self, message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let client = self.client_handle().await?;
        let card_selector = format!("{}[data-message-id='{}']", self.selectors.message_item, message.id.0);
        let card = self.find_with_timeout(&client, &card_selector).await.map_err(to_adapter_error)?;
        let delete_button = card
            .find(Locator::Css(&self.selectors.delete_button))
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;
        delete_button.click().await.map_err(BrowserError::from).map_err(to_adapter_error)?;
        Ok(())
    }

    async fn set_typing(&self, _conversation: &Conversation, duration_ms: Option<u64>) -> Result<(), AdapterError> {
        self.ensure_connected()?;
        let client = self.client_handle().await?;
        let composer = self.find_with_timeout(&client, &self.selectors.composer_input).await.map_err(to_adapter_error)?;
        match duration_ms {
            Some(ms) => {
                composer.send_keys(" ").await.map_err(BrowserError::from).map_err(to_adapter_error)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                composer.send_keys(BACKSPACE_KEY).await.map_err(BrowserError::from).map_err(to_adapter_error)?;
            }
            None => {
                composer.send_keys(BACKSPACE_KEY).await.map_err(BrowserError::from).map_err(to_adapter_error)?;
            }
        }
        Ok(())
    }

    /// Seeing a message on screen via the poller is the only "read" signal
    /// this session can give; there's no distinct acknowledgement to send.
    async fn mark_read(&self, _message: &Message) -> Result<(), AdapterError> {
        self.ensure_connected()
    }

    async fn get_conversations(&self) -> Result<Vec<Conversation>, AdapterError> {
        self.ensure_connected()?;
        let client = self.client_handle().await?;
        let elements = client
            .find_all(Locator::Css(&self.selectors.conversation_list_item))
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;
        let mut conversations = Vec::with_capacity(elements.len());
        for element in elements {
            let id = element
                .attr("data-conversation-id")
                .await
                .map_err(BrowserError::from)
                .map_err(to_adapter_error)?
                .map(ScopedId::from);
            if let Some(id) = id {
                conversations.push(Conversation::new(id, Platform::Browser, ConversationType::Dm));
            }
        }
        Ok(conversations)
    }

    /// Can only see messages already rendered in the currently open
    /// conversation; returns empty for any conversation not presently in
    /// view, same degradation the trait permits for enumeration limits.
    async fn get_messages(
        &self,
        conversation: &Conversation,
        limit: Option<usize>,
        _before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, AdapterError> {
        self.ensure_connected()?;
        let client = self.client_handle().await?;
        let elements = client
            .find_all(Locator::Css(&self.selectors.message_item))
            .await
            .map_err(BrowserError::from)
            .map_err(to_adapter_error)?;
        let mut messages = Vec::new();
        for element in elements {
            if let Ok(Some(message)) = map_message_element(&element, &self.selectors).await {
                if message.conversation_id == conversation.id {
                    messages.push(message);
                }
            }
        }
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }
}

impl BrowserAdapter {
    async fn send(&self, conversation: &Conversation, content: MessageContent) -> Result<Message, AdapterError> {
        match content {
            MessageContent::Text { text } => self.send_text(conversation, &text).await,
            MessageContent::Image { url, caption } => {
                self.send_image(conversation, Attachment::Url(url), caption.as_deref()).await
            }
            MessageContent::Video { url, caption } => {
                self.send_video(conversation, Attachment::Url(url), caption.as_deref()).await
            }
            MessageContent::Audio { url, duration_ms } => self.send_audio(conversation, Attachment::Url(url), duration_ms).await,
            MessageContent::Voice { url, duration_ms } => self.send_voice(conversation, Attachment::Url(url), duration_ms).await,
            MessageContent::File { url, filename, .. } => self.send_file(conversation, Attachment::Url(url), &filename).await,
            other => Err(AdapterError::UnsupportedOperation(other.kind_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserCredentials;

    fn config() -> BrowserConfig {
        BrowserConfig::new(BrowserCredentials::new("agent@example.com", "hunter2"), "https://chat.example.com", "/tmp/chatrt-browser-test")
    }

    #[test]
    fn new_adapter_starts_disconnected() {
        let adapter = BrowserAdapter::new(config());
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn send_before_connect_fails_not_connected() {
        let adapter = BrowserAdapter::new(config());
        let conversation = Conversation::new(ScopedId::from("c1"), Platform::Browser, ConversationType::Dm);
        let err = adapter.send_text(&conversation, "hi").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConnected));
    }

    #[test]
    fn poll_interval_slows_down_while_away() {
        let adapter = BrowserAdapter::new(config());
        let machine = BehaviouralStateMachine::new(1.0, Arc::new(|| 0.0), Arc::new(|| 0));
        machine.force_transition(BehaviouralState::Away);
        adapter.set_behavior(machine);
        assert_eq!(adapter.poll_interval(), Duration::from_millis(config().message_polling_interval_ms) * 5);
    }

    #[test]
    fn build_capabilities_selects_chrome_options_by_default() {
        let caps = build_capabilities(&config());
        assert!(caps.contains_key("goog:chromeOptions"));
        assert!(!caps.contains_key("moz:firefoxOptions"));
    }

    #[test]
    fn build_capabilities_selects_firefox_options_when_configured() {
        let caps = build_capabilities(&config().with_browser_profile("firefox"));
        assert!(caps.contains_key("moz:firefoxOptions"));
    }
}
