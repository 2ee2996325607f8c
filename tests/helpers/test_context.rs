//! Test context for unified test setup
//!
//! Wires an `AgentBot` over the in-memory store, a recording channel and
//! the scripted agent service, with helpers to drive a conversation.

use std::sync::{Arc, Once};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use AgentBuddy::channels::RecordingAdapter;
use AgentBuddy::config::Settings;
use AgentBuddy::dialogs::DialogTurnResult;
use AgentBuddy::handlers::{AgentBot, CommandRecognizer};
use AgentBuddy::models::{Activity, ActivityType, ConversationReference};
use AgentBuddy::services::ServiceFactory;
use AgentBuddy::state::{ConversationState, MemoryStateStore, UserState};
use AgentBuddy::Result;

use super::fake_agent::FakeAgentService;
use super::test_data::{test_bot_account, test_bot_token, test_user, TEST_CHANNEL, TEST_CONVERSATION, TEST_ENDPOINT_HOST};

static INIT: Once = Once::new();

/// Install a test subscriber once per test binary
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("AgentBuddy=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Settings suitable for tests: in-memory state, short replay window
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.bot.token = test_bot_token();
    settings.agent.endpoint_host = TEST_ENDPOINT_HOST.to_string();
    settings.events.replay_window_seconds = 60;
    settings.logging.level = "debug".to_string();
    settings
}

pub struct TestContext {
    pub settings: Settings,
    pub adapter: Arc<RecordingAdapter>,
    pub agent: Arc<FakeAgentService>,
    pub store: Arc<MemoryStateStore>,
    pub services: ServiceFactory,
    pub bot: AgentBot,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        init_test_logging();

        let adapter = Arc::new(RecordingAdapter::new());
        let agent = Arc::new(FakeAgentService::new());
        let store = Arc::new(MemoryStateStore::new());
        let services = ServiceFactory::from_parts(&settings, agent.clone(), store.clone(), adapter.clone());
        let bot = AgentBot::new(&settings, &services, adapter.clone(), Arc::new(CommandRecognizer::new()));

        Self {
            settings,
            adapter,
            agent,
            store,
            services,
            bot,
        }
    }

    pub fn activity(&self, activity_type: ActivityType) -> Activity {
        Activity::inbound(activity_type, TEST_CHANNEL, TEST_CONVERSATION, test_user(), test_bot_account())
    }

    pub fn message(&self, text: &str) -> Activity {
        self.activity(ActivityType::Message).with_text(text)
    }

    pub fn reference(&self) -> ConversationReference {
        self.activity(ActivityType::Message).conversation_reference()
    }

    /// Send a user message through a full turn
    pub async fn send(&self, text: &str) -> Result<DialogTurnResult> {
        self.bot.on_turn(self.message(text), CancellationToken::new()).await
    }

    /// Texts sent since the last call, clearing the record
    pub fn take_texts(&self) -> Vec<String> {
        let texts = self.adapter.texts();
        self.adapter.clear();
        texts
    }

    pub async fn conversation_state(&self) -> ConversationState {
        self.services.accessors.load(&self.reference()).await.unwrap().0
    }

    pub async fn user_state(&self) -> UserState {
        self.services.accessors.load(&self.reference()).await.unwrap().1
    }

    /// Provision an agent through the dialog and return its id
    pub async fn provision(&self, name: &str) -> String {
        self.send("/provision").await.unwrap();
        let result = self.send(name).await.unwrap();
        self.adapter.clear();
        match result {
            DialogTurnResult::Complete(value) => value.as_str().unwrap().to_string(),
            other => panic!("provisioning did not complete: {:?}", other),
        }
    }

    /// Wait for background resumptions to deliver `count` texts
    pub async fn wait_for_texts(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let texts = self.adapter.texts();
            if texts.len() >= count {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.adapter.texts()
    }
}
