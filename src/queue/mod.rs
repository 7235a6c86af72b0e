//! Ordered buffer between the parser and the runner.
//!
//! Items are appended in the order the parser discovers them and drained
//! front to back by a single consumer. Draining flips `is_processed` instead
//! of removing items, so appends during a drain never disturb iteration.
//! Processed items are removed separately by [`ActionQueue::purge_processed`]
//! or the background sweeper.

use crate::parser::ParserEvent;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

pub type SharedQueue = Arc<Mutex<ActionQueue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Artifact,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackType {
    Open,
    Close,
}

/// Envelope around one parser event.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub is_initial: bool,
    pub is_processed: bool,
    /// Handed to a consumer; guards against running the same item twice.
    #[serde(skip)]
    claimed: bool,
    pub event: ParserEvent,
}

impl QueueItem {
    pub fn new(event: ParserEvent, is_initial: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_initial,
            is_processed: false,
            claimed: false,
            event,
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self.event {
            ParserEvent::ArtifactOpen { .. } | ParserEvent::ArtifactClose { .. } => {
                ItemType::Artifact
            }
            ParserEvent::ActionOpen { .. } | ParserEvent::ActionClose { .. } => ItemType::Action,
        }
    }

    pub fn callback_type(&self) -> CallbackType {
        match self.event {
            ParserEvent::ArtifactOpen { .. } | ParserEvent::ActionOpen { .. } => {
                CallbackType::Open
            }
            ParserEvent::ArtifactClose { .. } | ParserEvent::ActionClose { .. } => {
                CallbackType::Close
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ActionQueue {
    items: Vec<QueueItem>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedQueue {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn push(&mut self, event: ParserEvent, is_initial: bool) -> Uuid {
        let item = QueueItem::new(event, is_initial);
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn extend(&mut self, events: Vec<ParserEvent>, is_initial: bool) -> Vec<Uuid> {
        events
            .into_iter()
            .map(|event| self.push(event, is_initial))
            .collect()
    }

    /// Claim the oldest item nobody has started on yet.
    pub fn claim_next(&mut self) -> Option<QueueItem> {
        let item = self
            .items
            .iter_mut()
            .find(|item| !item.is_processed && !item.claimed)?;
        item.claimed = true;
        Some(item.clone())
    }

    /// Claim a specific item. `None` if it is unknown, processed, or already claimed.
    pub fn claim(&mut self, id: Uuid) -> Option<QueueItem> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id && !item.is_processed && !item.claimed)?;
        item.claimed = true;
        Some(item.clone())
    }

    pub fn mark_processed(&mut self, id: Uuid) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.is_processed = true;
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items not yet claimed by a consumer.
    pub fn has_pending(&self) -> bool {
        self.items
            .iter()
            .any(|item| !item.is_processed && !item.claimed)
    }

    pub fn processed_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_processed).count()
    }

    /// Drop processed items, returning how many were removed.
    pub fn purge_processed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.is_processed);
        before - self.items.len()
    }
}

/// Periodically purge processed items once more than `threshold` accumulate.
///
/// The task stops on its own when the queue is dropped.
pub fn spawn_sweeper(queue: &SharedQueue, threshold: usize, every: Duration) -> JoinHandle<()> {
    let weak: Weak<Mutex<ActionQueue>> = Arc::downgrade(queue);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(queue) = weak.upgrade() else {
                break;
            };
            let mut queue = queue.lock().await;
            if queue.processed_count() > threshold {
                let removed = queue.purge_processed();
                debug!(removed, remaining = queue.len(), "Swept processed queue items");
            }
        }
    })
}
