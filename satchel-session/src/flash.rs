//! Two-generation flash bookkeeping
//!
//! Each flashed key moves `new -> old -> removed`, one step per
//! [`FlashRegistry::age`]. The registry persists alongside the attributes
//! as `{"new": [...], "old": [...]}` under the reserved `_flash` key but is
//! owned separately, so application code never edits the lists by path.

use crate::attributes::AttributeStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashRegistry {
    #[serde(default)]
    new: Vec<String>,
    #[serde(default)]
    old: Vec<String>,
}

impl FlashRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted `_flash` value, ignoring anything malformed
    pub fn from_value(value: &Value) -> Self {
        match serde_json::from_value::<FlashRegistry>(value.clone()) {
            Ok(mut registry) => {
                dedup(&mut registry.new);
                dedup(&mut registry.old);
                registry
            }
            Err(e) => {
                debug!("Discarding malformed flash registry: {}", e);
                Self::default()
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "new": self.new,
            "old": self.old,
        })
    }

    /// Keys that survive the next age
    pub fn new_keys(&self) -> &[String] {
        &self.new
    }

    /// Keys removed by the next age
    pub fn old_keys(&self) -> &[String] {
        &self.old
    }

    pub fn is_new(&self, key: &str) -> bool {
        self.new.iter().any(|k| k == key)
    }

    pub fn is_old(&self, key: &str) -> bool {
        self.old.iter().any(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.old.is_empty()
    }

    /// Register `key` in the new generation
    pub fn mark_new(&mut self, key: &str) {
        push_unique(&mut self.new, key);
        self.old.retain(|k| k != key);
    }

    /// Register `key` directly in the old generation
    pub fn mark_now(&mut self, key: &str) {
        self.new.retain(|k| k != key);
        push_unique(&mut self.old, key);
    }

    /// Remove old keys from `attributes`, then promote new to old
    pub fn age(&mut self, attributes: &mut AttributeStore) {
        let expired = std::mem::take(&mut self.old);
        if !expired.is_empty() {
            debug!(count = expired.len(), "Expiring flash data");
        }
        attributes.forget(&expired);

        self.old = std::mem::take(&mut self.new);
        self.prune(attributes);
    }

    /// Give every aging key one more cycle
    pub fn reflash(&mut self) {
        for key in std::mem::take(&mut self.old) {
            push_unique(&mut self.new, &key);
        }
    }

    /// Give the listed keys one more cycle, if they are aging
    pub fn keep<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            if self.is_old(key) {
                self.old.retain(|k| k != key);
                push_unique(&mut self.new, key);
            }
        }
    }

    /// Stop tracking `key` in either generation
    pub fn discard(&mut self, key: &str) {
        self.new.retain(|k| k != key);
        self.old.retain(|k| k != key);
    }

    /// Drop keys that no longer exist in `attributes`
    pub fn prune(&mut self, attributes: &AttributeStore) {
        self.new.retain(|k| attributes.exists(k.as_str()));
        self.old.retain(|k| attributes.exists(k.as_str()));
    }

    /// Fold another registry's keys into this one
    pub fn merge(&mut self, other: FlashRegistry) {
        for key in other.new {
            if !self.is_old(&key) {
                push_unique(&mut self.new, &key);
            }
        }
        for key in other.old {
            if !self.is_new(&key) {
                push_unique(&mut self.old, &key);
            }
        }
    }

    pub fn reset(&mut self) {
        self.new.clear();
        self.old.clear();
    }
}

fn push_unique(list: &mut Vec<String>, key: &str) {
    if !list.iter().any(|k| k == key) {
        list.push(key.to_string());
    }
}

fn dedup(list: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(list.len());
    list.retain(|k| {
        if seen.contains(k) {
            false
        } else {
            seen.push(k.clone());
            true
        }
    });
}
