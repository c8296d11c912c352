//! Records flowing from the upstream pipeline into an output.
//!
//! A `PipelinePack` is borrowed from a pool and must be handed back through a
//! `PackRecycler` once the output no longer needs it. `recycle` takes the pack
//! by value, so a pack cannot be returned twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Default syslog-style severity (debug).
pub const DEFAULT_SEVERITY: i32 = 7;

/// A structured log/event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub uuid: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Name of the component that emitted the record. Used as the queue
    /// identifier in dynamic-per-message mode.
    pub logger: String,
    pub severity: i32,
    pub payload: String,
    pub env_version: String,
    pub pid: i32,
    pub hostname: String,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            timestamp: Utc::now(),
            msg_type: String::new(),
            logger: String::new(),
            severity: DEFAULT_SEVERITY,
            payload: String::new(),
            env_version: String::new(),
            pid: 0,
            hostname: String::new(),
            fields: BTreeMap::new(),
        }
    }
}

impl Message {
    pub fn new(logger: &str, payload: &str) -> Self {
        Self {
            logger: logger.to_string(),
            payload: payload.to_string(),
            ..Default::default()
        }
    }
}

/// A pooled wrapper around a `Message`.
#[derive(Debug, Default)]
pub struct PipelinePack {
    pub message: Message,
}

impl PipelinePack {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    /// Clear the message so the pack can be reused.
    pub fn reset(&mut self) {
        self.message = Message::default();
    }
}

/// Returns packs to wherever they were borrowed from.
pub trait PackRecycler: Send + Sync {
    fn recycle(&self, pack: PipelinePack);
}

/// Bounded free list of packs.
///
/// Recycled packs beyond `capacity` are dropped. The pool counts every
/// recycle so callers can check that each pack came back exactly once.
pub struct PackPool {
    capacity: usize,
    free: Mutex<Vec<PipelinePack>>,
    issued: AtomicU64,
    recycled: AtomicU64,
}

impl PackPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(Vec::with_capacity(capacity)),
            issued: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
        }
    }

    /// Take a pack from the pool (or allocate one) and load `message` into it.
    pub fn get(&self, message: Message) -> PipelinePack {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let reused = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match reused {
            Some(mut pack) => {
                pack.message = message;
                pack
            }
            None => PipelinePack::new(message),
        }
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn recycled(&self) -> u64 {
        self.recycled.load(Ordering::SeqCst)
    }

    /// Packs handed out and not yet returned.
    pub fn outstanding(&self) -> u64 {
        self.issued().saturating_sub(self.recycled())
    }

    /// Number of packs sitting in the free list.
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PackRecycler for PackPool {
    fn recycle(&self, mut pack: PipelinePack) {
        self.recycled.fetch_add(1, Ordering::SeqCst);
        pack.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(pack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserializes_with_defaults() {
        let message: Message =
            serde_json::from_str(r#"{"logger": "orders", "payload": "created", "type": "event"}"#)
                .unwrap();
        assert_eq!(message.logger, "orders");
        assert_eq!(message.payload, "created");
        assert_eq!(message.msg_type, "event");
        assert_eq!(message.severity, DEFAULT_SEVERITY);
        assert!(message.fields.is_empty());
    }

    #[test]
    fn test_pool_reuses_and_counts() {
        let pool = PackPool::new(1);

        let first = pool.get(Message::new("a", "one"));
        let second = pool.get(Message::new("b", "two"));
        assert_eq!(pool.outstanding(), 2);

        pool.recycle(first);
        pool.recycle(second);
        assert_eq!(pool.recycled(), 2);
        assert_eq!(pool.outstanding(), 0);
        // Capacity is one, the second pack was dropped.
        assert_eq!(pool.available(), 1);

        let reused = pool.get(Message::new("c", "three"));
        assert_eq!(reused.message.logger, "c");
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_recycle_resets_message() {
        let pool = PackPool::new(4);
        let pack = pool.get(Message::new("orders", "payload"));
        pool.recycle(pack);

        let free = pool.free.lock().unwrap();
        assert_eq!(free[0].message.logger, "");
        assert_eq!(free[0].message.payload, "");
    }
}
