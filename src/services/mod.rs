//! Services module
//!
//! This module contains the agent collaborator, conversation resumption
//! and the factory that wires them together.

pub mod agent;
pub mod relay;
pub mod resumer;

// Re-export commonly used services
pub use agent::{AgentService, CreatedInvitation, EventBatch, HttpAgentService};
pub use relay::EventRelay;
pub use resumer::{ConversationResumer, NotifyRequest};

use std::sync::Arc;
use tracing::info;

use crate::channels::ChannelAdapter;
use crate::config::{Settings, StorageBackend};
use crate::events::EventBus;
use crate::state::{MemoryStateStore, RedisStateStore, StateAccessors, StateStore};
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub agent_service: Arc<dyn AgentService>,
    pub event_bus: EventBus,
    pub accessors: StateAccessors,
    pub resumer: Arc<ConversationResumer>,
    backend: StorageBackend,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized from settings
    pub async fn new(settings: &Settings, adapter: Arc<dyn ChannelAdapter>) -> Result<Self> {
        let store: Arc<dyn StateStore> = match settings.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStateStore::new()),
            StorageBackend::Redis => {
                let store = RedisStateStore::new(settings.redis.clone()).await?;
                store.test_connection().await?;
                Arc::new(store)
            }
        };
        info!(backend = ?settings.storage.backend, "State store ready");

        let agent_service: Arc<dyn AgentService> = Arc::new(HttpAgentService::new(&settings.agent)?);
        Ok(Self::from_parts(settings, agent_service, store, adapter)
            .with_backend(settings.storage.backend))
    }

    /// Wire services around an existing agent client and store
    pub fn from_parts(
        settings: &Settings,
        agent_service: Arc<dyn AgentService>,
        store: Arc<dyn StateStore>,
        adapter: Arc<dyn ChannelAdapter>,
    ) -> Self {
        let event_bus = EventBus::new(settings.events.replay_window());
        let accessors = StateAccessors::new(store, settings.dialogs.serialize_turns);
        let resumer = Arc::new(ConversationResumer::new(
            event_bus.clone(),
            agent_service.clone(),
            adapter,
            accessors.clone(),
        ));

        Self {
            agent_service,
            event_bus,
            accessors,
            resumer,
            backend: StorageBackend::Memory,
        }
    }

    fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let agent_healthy = self.agent_service.health_check().await.unwrap_or(false);

        ServiceHealthStatus {
            agent_healthy,
            storage_backend: self.backend,
            buffered_events: self.event_bus.buffered_events(),
            pending_subscriptions: self.event_bus.pending_subscriptions(),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub agent_healthy: bool,
    pub storage_backend: StorageBackend,
    pub buffered_events: usize,
    pub pending_subscriptions: usize,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.agent_healthy
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.agent_healthy {
            issues.push("Agent service unreachable".to_string());
        }
        if self.storage_backend == StorageBackend::Memory {
            issues.push("State is kept in memory and will not survive a restart".to_string());
        }

        issues
    }
}
