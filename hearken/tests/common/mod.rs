#![allow(dead_code)]

use futures::StreamExt;
use hearken::{Event, EventResult, EventResultStream, Key, KeyGraph, KeyGraphBuilder};
use lazy_static::lazy_static;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

// ============================================================================
// Test Keys
// ============================================================================

lazy_static! {
    /// ```text
    /// event
    /// ├── message
    /// │   ├── private_message
    /// │   └── group_message ─┐
    /// ├── mention ───────────┴── group_at_message
    /// └── notice
    /// ```
    pub static ref CHAT_KEYS: KeyGraph = KeyGraphBuilder::new()
        .key("message", ["event"])
        .key("private_message", ["message"])
        .key("group_message", ["message"])
        .key("mention", ["event"])
        .key("group_at_message", ["group_message", "mention"])
        .key("notice", ["event"])
        .build()
        .unwrap();
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn key(id: &str) -> Key {
    CHAT_KEYS.get(id).unwrap()
}

// ============================================================================
// Test Event Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub id: String,
    pub key: Key,
    pub text: Option<String>,
}

impl Event for ChatEvent {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> &Key {
        &self.key
    }

    fn plain_text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

pub fn chat(key_id: &str, text: &str) -> Arc<dyn Event> {
    Arc::new(ChatEvent {
        id: format!("chat-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        key: key(key_id),
        text: Some(text.to_string()),
    })
}

pub fn notice() -> Arc<dyn Event> {
    Arc::new(ChatEvent {
        id: format!("notice-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        key: key("notice"),
        text: None,
    })
}

// ============================================================================
// Helpers
// ============================================================================

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn collect(stream: EventResultStream) -> Vec<EventResult> {
    stream.collect().await
}

/// The values of the `Simple` results of type `T`, in order.
pub fn values<T: Clone + 'static>(results: &[EventResult]) -> Vec<T> {
    results
        .iter()
        .filter_map(|result| result.value::<T>().cloned())
        .collect()
}
