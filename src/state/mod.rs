//! State management module
//! 
//! This module handles persisted conversation and user state, the per-turn
//! context, and per-conversation turn serialization.

pub mod context;
pub mod locks;
pub mod storage;
pub mod turn;

// Re-export commonly used state components
pub use context::{ConversationState, UserState};
pub use locks::ConversationLocks;
pub use storage::{MemoryStateStore, RedisStateStore, StateAccessors, StateScope, StateStore, VersionedBlob};
pub use turn::TurnContext;
