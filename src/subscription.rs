//! Keyed live values.
//!
//! A [`SubscriptionHub`] holds one `tokio::sync::watch` channel per key.
//! Subscribers only ever see the most recent value: snapshots published
//! while a subscriber is not looking are skipped, never queued.

use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::{watch, RwLock};

pub struct Subscription<V> {
    rx: watch::Receiver<Option<V>>,
}

impl<V: Clone> Subscription<V> {
    /// Latest published value, `None` until the first publish.
    pub fn latest(&self) -> Option<V> {
        self.rx.borrow().clone()
    }

    /// Wait for a value newer than the last one seen. `None` once the key
    /// has been closed on the hub.
    pub async fn changed(&mut self) -> Option<V> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

pub struct SubscriptionHub<K, V> {
    channels: RwLock<HashMap<K, watch::Sender<Option<V>>>>,
}

impl<K, V> Default for SubscriptionHub<K, V> {
    fn default() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> SubscriptionHub<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, key: &K) -> Subscription<V> {
        if let Some(tx) = self.channels.read().await.get(key) {
            return Subscription { rx: tx.subscribe() };
        }

        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(key.clone())
            .or_insert_with(|| watch::channel(None).0);
        Subscription { rx: tx.subscribe() }
    }

    /// Replace the value for `key`. Succeeds with or without subscribers.
    pub async fn publish(&self, key: &K, value: V) {
        if let Some(tx) = self.channels.read().await.get(key) {
            tx.send_replace(Some(value));
            return;
        }

        let mut channels = self.channels.write().await;
        match channels.get(key) {
            Some(tx) => {
                tx.send_replace(Some(value));
            }
            None => {
                channels.insert(key.clone(), watch::channel(Some(value)).0);
            }
        }
    }

    /// Drop the channel for `key`; pending `changed()` calls resolve to `None`.
    pub async fn close(&self, key: &K) {
        self.channels.write().await.remove(key);
    }

    pub async fn subscriber_count(&self, key: &K) -> usize {
        self.channels
            .read()
            .await
            .get(key)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}
