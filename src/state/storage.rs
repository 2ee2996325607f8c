//! State storage implementation
//! 
//! This module defines the key/value persistence contract for conversation
//! and user state, an in-memory store, a Redis-backed store, and the
//! accessors that load state into a turn and write it back once.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::channels::ChannelAdapter;
use crate::config::RedisConfig;
use crate::models::{Activity, ConversationReference};
use crate::utils::errors::Result;
use super::context::{ConversationState, UserState};
use super::locks::ConversationLocks;
use super::turn::TurnContext;

/// Which state family a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    Conversation,
    User,
}

impl StateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateScope::Conversation => "conversation",
            StateScope::User => "user",
        }
    }
}

/// Stored blob with a write counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedBlob {
    pub version: u64,
    pub data: serde_json::Value,
}

/// Key/value persistence contract. Writes are last-write-wins.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self, scope: StateScope, key: &str) -> Result<Option<VersionedBlob>>;

    /// Store `data`, returning the new version
    async fn write(&self, scope: StateScope, key: &str, data: serde_json::Value) -> Result<u64>;

    async fn delete(&self, scope: StateScope, key: &str) -> Result<()>;
}

/// In-process store; state is lost on restart
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<(StateScope, String), VersionedBlob>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self, scope: StateScope, key: &str) -> Result<Option<VersionedBlob>> {
        Ok(self.entries.read().await.get(&(scope, key.to_string())).cloned())
    }

    async fn write(&self, scope: StateScope, key: &str, data: serde_json::Value) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry((scope, key.to_string()))
            .or_insert(VersionedBlob { version: 0, data: serde_json::Value::Null });
        entry.version += 1;
        entry.data = data;
        Ok(entry.version)
    }

    async fn delete(&self, scope: StateScope, key: &str) -> Result<()> {
        self.entries.write().await.remove(&(scope, key.to_string()));
        Ok(())
    }
}

/// Redis-based state store
#[derive(Clone)]
pub struct RedisStateStore {
    /// Redis connection manager
    connection_manager: redis::aio::ConnectionManager,
    /// Redis configuration
    config: RedisConfig,
}

impl RedisStateStore {
    /// Connect to Redis
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    /// Test Redis connection
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn key(&self, scope: StateScope, key: &str) -> String {
        format!("{}{}:{}", self.config.prefix, scope.as_str(), key)
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn read(&self, scope: StateScope, key: &str) -> Result<Option<VersionedBlob>> {
        let redis_key = self.key(scope, key);
        let mut conn = self.connection_manager.clone();

        let serialized = match conn.get::<&str, Option<String>>(&redis_key).await {
            Ok(data) => data,
            Err(e) => {
                error!(key = %redis_key, error = %e, "Failed to read state from Redis");
                return Err(e.into());
            }
        };

        match serialized {
            Some(data) => {
                debug!(key = %redis_key, data_length = data.len(), "State loaded from Redis");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, scope: StateScope, key: &str, data: serde_json::Value) -> Result<u64> {
        let redis_key = self.key(scope, key);
        let version_key = format!("{}:version", redis_key);
        let mut conn = self.connection_manager.clone();

        let version: u64 = conn.incr(&version_key, 1u64).await?;
        let serialized = serde_json::to_string(&VersionedBlob { version, data })?;

        let ttl_seconds = self.config.ttl_seconds;
        let result = if ttl_seconds > 0 {
            conn.expire::<_, ()>(&version_key, ttl_seconds as i64).await?;
            conn.set_ex::<_, _, ()>(&redis_key, serialized, ttl_seconds).await
        } else {
            conn.set::<_, _, ()>(&redis_key, serialized).await
        };

        match result {
            Ok(()) => {
                debug!(key = %redis_key, version = version, ttl_seconds = ttl_seconds, "State saved to Redis");
                Ok(version)
            }
            Err(e) => {
                error!(key = %redis_key, error = %e, "Failed to save state to Redis");
                Err(e.into())
            }
        }
    }

    async fn delete(&self, scope: StateScope, key: &str) -> Result<()> {
        let redis_key = self.key(scope, key);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(vec![redis_key.clone(), format!("{}:version", redis_key)]).await?;
        debug!(key = %redis_key, deleted = deleted, "State deleted from Redis");
        Ok(())
    }
}

impl std::fmt::Debug for RedisStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStateStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Loads conversation and user state into a turn and writes it back
#[derive(Clone)]
pub struct StateAccessors {
    store: Arc<dyn StateStore>,
    locks: Option<ConversationLocks>,
}

impl StateAccessors {
    /// `serialize_turns` enables the per-conversation lock
    pub fn new(store: Arc<dyn StateStore>, serialize_turns: bool) -> Self {
        Self {
            store,
            locks: serialize_turns.then(ConversationLocks::new),
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Hold the conversation for a turn or resumption; `None` when turns are not serialized
    pub async fn lock(&self, reference: &ConversationReference) -> Option<OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(&reference.conversation_key()).await),
            None => None,
        }
    }

    pub async fn load(&self, reference: &ConversationReference) -> Result<(ConversationState, UserState)> {
        let conversation = match self.store.read(StateScope::Conversation, &reference.conversation_key()).await? {
            Some(blob) => serde_json::from_value(blob.data)?,
            None => ConversationState::default(),
        };
        let user = match self.store.read(StateScope::User, &reference.user_key()).await? {
            Some(blob) => serde_json::from_value(blob.data)?,
            None => UserState::default(),
        };
        Ok((conversation, user))
    }

    /// Build a turn over freshly loaded state
    pub async fn begin_turn(
        &self,
        activity: Activity,
        adapter: Arc<dyn ChannelAdapter>,
        cancel: CancellationToken,
    ) -> Result<TurnContext> {
        let (conversation, user) = self.load(&activity.conversation_reference()).await?;
        Ok(TurnContext::new(activity, conversation, user, adapter, cancel))
    }

    /// Write both state blobs back
    pub async fn save(&self, turn: &TurnContext) -> Result<()> {
        let conversation = serde_json::to_value(&turn.conversation_state)?;
        let user = serde_json::to_value(&turn.user_state)?;

        let version = self.store
            .write(StateScope::Conversation, &turn.reference.conversation_key(), conversation)
            .await?;
        self.store.write(StateScope::User, &turn.reference.user_key(), user).await?;

        debug!(
            conversation_id = %turn.reference.conversation_id,
            version = version,
            depth = turn.conversation_state.dialog_stack.len(),
            "Turn state saved"
        );
        Ok(())
    }
}
