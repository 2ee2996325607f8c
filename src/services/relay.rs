//! Agent event relay
//!
//! Polls the agent's event feed and publishes what it sees on the bus.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::EventBus;
use super::agent::AgentService;

pub struct EventRelay {
    agent: Arc<dyn AgentService>,
    bus: EventBus,
    interval: Duration,
    cursor: u64,
}

impl EventRelay {
    pub fn new(agent: Arc<dyn AgentService>, bus: EventBus, interval: Duration) -> Self {
        Self {
            agent,
            bus,
            interval,
            cursor: 0,
        }
    }

    /// Fetch one batch and publish it; returns how many events were published
    pub async fn poll_once(&mut self) -> usize {
        match self.agent.poll_events(self.cursor).await {
            Ok(batch) => {
                let count = batch.events.len();
                for event in batch.events {
                    self.bus.publish(event);
                }
                self.cursor = batch.cursor.max(self.cursor);
                if count > 0 {
                    debug!(count = count, cursor = self.cursor, "Relayed agent events");
                }
                count
            }
            Err(e) => {
                warn!(error = %e, cursor = self.cursor, "Failed to poll agent events");
                0
            }
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Poll forever on the configured interval
    pub fn spawn(mut self) -> JoinHandle<()> {
        info!("Started agent event relay with interval {:?}", self.interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        })
    }
}
