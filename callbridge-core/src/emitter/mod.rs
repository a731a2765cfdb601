//! Minimal typed publish/subscribe channel.
//!
//! Components keep an [`Emitter`] private and expose only their own topic enum, so callers
//! cannot publish on a component's behalf.

use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Token returned by [`Emitter::subscribe`], used to remove that one handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

pub struct Emitter<K, A> {
    topics: DashMap<K, Vec<(Subscription, Handler<A>)>>,
    next_id: AtomicU64,
}

impl<K, A> Emitter<K, A>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribe<F>(&self, topic: K, handler: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics
            .entry(topic)
            .or_default()
            .push((subscription, Arc::new(handler)));
        subscription
    }

    /// Invokes every handler subscribed to `topic` at the moment of the call, in subscription order.
    ///
    /// The handler list is copied before the first handler runs, so handlers may freely
    /// subscribe or unsubscribe; such changes take effect from the next publish.
    pub fn publish(&self, topic: &K, args: &A) {
        let handlers: Vec<Handler<A>> = match self.topics.get(topic) {
            Some(entry) => entry.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };

        for handler in handlers {
            handler(args);
        }
    }

    /// Removes one handler, or every handler of the topic when `subscription` is `None`.
    pub fn unsubscribe(&self, topic: &K, subscription: Option<Subscription>) {
        match subscription {
            Some(subscription) => {
                if let Some(mut entry) = self.topics.get_mut(topic) {
                    entry.retain(|(s, _)| *s != subscription);
                }
            }
            None => {
                self.topics.remove(topic);
            }
        }
    }

    pub fn clear(&self) {
        self.topics.clear();
    }

    pub fn subscriber_count(&self, topic: &K) -> usize {
        self.topics.get(topic).map_or(0, |entry| entry.len())
    }
}

impl<K, A> Default for Emitter<K, A>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> fmt::Debug for Emitter<K, A>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics: Vec<(K, usize)> = self
            .topics
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        f.debug_struct("Emitter").field("topics", &topics).finish()
    }
}
