//! Broadcast channels and subscription tokens.
//!
//! Every modifier owns two broadcast points, one per [`Channel`]. Other
//! modifiers in the same spell subscribe to them through the reference
//! resolver and are notified synchronously when the owner publishes.
//!
//! # Delivery
//!
//! - `publish` runs every listener registered at the moment of the call, in
//!   registration order, on the calling thread
//! - The listener list is copied before iterating, so a listener may publish
//!   again, subscribe, or drop subscriptions without corrupting the list
//! - No lock is held while a listener runs
//!
//! # Lifetime
//!
//! [`Broadcast::subscribe`] returns a [`Subscription`] token. Dropping the
//! token unsubscribes. A subscriber registers at most one listener per
//! broadcast: subscribing again replaces the earlier listener and makes the
//! earlier token inert.
//!
//! # Example
//!
//! ```
//! use spellforge_core::channel::{Broadcast, Channel};
//! use spellforge_core::modifier::ModifierId;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let broadcast: Broadcast<u32> = Broadcast::new(ModifierId::new(0), Channel::Cast);
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let sum = Arc::clone(&total);
//! let token = broadcast.subscribe(
//!     ModifierId::new(1),
//!     Arc::new(move |value: &u32| {
//!         sum.fetch_add(*value as usize, Ordering::SeqCst);
//!     }),
//! );
//!
//! assert_eq!(broadcast.publish(&5), 1);
//! drop(token);
//! assert_eq!(broadcast.publish(&5), 0);
//! assert_eq!(total.load(Ordering::SeqCst), 5);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::modifier::ModifierId;

// =============================================================================
// Channel
// =============================================================================

/// The two broadcast points every modifier owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Fired after the modifier's own `on_cast` completes.
    Cast,
    /// Fired whenever the modifier performs its action.
    Action,
}

impl Channel {
    /// Both channels, cast first.
    pub const ALL: [Channel; 2] = [Channel::Cast, Channel::Action];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cast => write!(f, "OnCast"),
            Self::Action => write!(f, "OnAction"),
        }
    }
}

// =============================================================================
// Broadcast
// =============================================================================

/// A listener invoked on publish.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E: ?Sized> {
    subscriber: ModifierId,
    token: u64,
    listener: Listener<E>,
}

struct BroadcastInner<E: ?Sized> {
    entries: Mutex<Vec<Entry<E>>>,
    next_token: AtomicU64,
}

impl<E: ?Sized> BroadcastInner<E> {
    fn lock(&self) -> MutexGuard<'_, Vec<Entry<E>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, subscriber: ModifierId, token: u64) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| !(entry.subscriber == subscriber && entry.token == token));
        entries.len() != before
    }
}

/// A broadcast point delivering `&E` to every subscriber.
pub struct Broadcast<E: ?Sized> {
    owner: ModifierId,
    channel: Channel,
    inner: Arc<BroadcastInner<E>>,
}

impl<E: ?Sized + 'static> fmt::Debug for Broadcast<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("owner", &self.owner)
            .field("channel", &self.channel)
            .field("subscribers", &self.subscribers())
            .finish()
    }
}

impl<E: ?Sized + 'static> Broadcast<E> {
    /// Creates an empty broadcast owned by `owner`.
    #[must_use]
    pub fn new(owner: ModifierId, channel: Channel) -> Self {
        Self {
            owner,
            channel,
            inner: Arc::new(BroadcastInner {
                entries: Mutex::new(Vec::new()),
                next_token: AtomicU64::new(0),
            }),
        }
    }

    /// The modifier that publishes on this broadcast.
    #[must_use]
    pub fn owner(&self) -> ModifierId {
        self.owner
    }

    /// Which channel this broadcast is.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Registers `listener` for `subscriber`, replacing any listener that
    /// subscriber already had here.
    pub fn subscribe(&self, subscriber: ModifierId, listener: Listener<E>) -> Subscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.inner.lock();
            entries.retain(|entry| entry.subscriber != subscriber);
            entries.push(Entry {
                subscriber,
                token,
                listener,
            });
        }

        let weak: Weak<BroadcastInner<E>> = Arc::downgrade(&self.inner);
        let inner: Weak<dyn Unsubscribe> = weak;
        Subscription {
            publisher: self.owner,
            channel: self.channel,
            subscriber,
            token,
            inner,
        }
    }

    /// Delivers `event` to every current listener. Returns how many ran.
    pub fn publish(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self
            .inner
            .lock()
            .iter()
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    /// Subscribers in registration order.
    #[must_use]
    pub fn subscribers(&self) -> Vec<ModifierId> {
        self.inner.lock().iter().map(|entry| entry.subscriber).collect()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if `subscriber` has a listener registered here.
    #[must_use]
    pub fn is_subscribed(&self, subscriber: ModifierId) -> bool {
        self.inner
            .lock()
            .iter()
            .any(|entry| entry.subscriber == subscriber)
    }

    /// Removes every listener. Outstanding tokens become inert.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.lock());
        drop(removed);
    }
}

// =============================================================================
// Subscription
// =============================================================================

trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, subscriber: ModifierId, token: u64) -> bool;
    fn is_registered(&self, subscriber: ModifierId, token: u64) -> bool;
}

impl<E: ?Sized + 'static> Unsubscribe for BroadcastInner<E> {
    fn unsubscribe(&self, subscriber: ModifierId, token: u64) -> bool {
        self.remove(subscriber, token)
    }

    fn is_registered(&self, subscriber: ModifierId, token: u64) -> bool {
        self.lock()
            .iter()
            .any(|entry| entry.subscriber == subscriber && entry.token == token)
    }
}

/// Token for one registered listener. Dropping it unsubscribes.
///
/// The token holds only a weak link to the broadcast, so it never keeps the
/// publishing modifier alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    publisher: ModifierId,
    channel: Channel,
    subscriber: ModifierId,
    token: u64,
    inner: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// The modifier being listened to.
    #[must_use]
    pub fn publisher(&self) -> ModifierId {
        self.publisher
    }

    /// The channel being listened to.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The listening modifier.
    #[must_use]
    pub fn subscriber(&self) -> ModifierId {
        self.subscriber
    }

    /// Returns true while this token's listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.is_registered(self.subscriber, self.token))
    }

    /// Unsubscribes now. Equivalent to dropping the token.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe(self.subscriber, self.token);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("publisher", &self.publisher)
            .field("channel", &self.channel)
            .field("subscriber", &self.subscriber)
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Channels
// =============================================================================

/// The pair of broadcasts a modifier owns.
pub struct Channels<E: ?Sized> {
    cast: Broadcast<E>,
    action: Broadcast<E>,
}

impl<E: ?Sized + 'static> fmt::Debug for Channels<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channels")
            .field("cast", &self.cast)
            .field("action", &self.action)
            .finish()
    }
}

impl<E: ?Sized + 'static> Channels<E> {
    /// Creates both broadcasts for `owner`.
    #[must_use]
    pub fn new(owner: ModifierId) -> Self {
        Self {
            cast: Broadcast::new(owner, Channel::Cast),
            action: Broadcast::new(owner, Channel::Action),
        }
    }

    /// The broadcast for `channel`.
    #[must_use]
    pub fn get(&self, channel: Channel) -> &Broadcast<E> {
        match channel {
            Channel::Cast => &self.cast,
            Channel::Action => &self.action,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn id(n: u64) -> ModifierId {
        ModifierId::new(n)
    }

    fn recorder(log: &Arc<Mutex<Vec<u64>>>, tag: u64) -> Listener<()> {
        let log = Arc::clone(log);
        Arc::new(move |_: &()| log.lock().unwrap().push(tag))
    }

    mod subscribe_tests {
        use super::*;

        #[test]
        fn publish_runs_in_registration_order() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Cast);
            let log = Arc::new(Mutex::new(Vec::new()));
            let _a = broadcast.subscribe(id(1), recorder(&log, 1));
            let _b = broadcast.subscribe(id(2), recorder(&log, 2));
            let _c = broadcast.subscribe(id(3), recorder(&log, 3));

            assert_eq!(broadcast.publish(&()), 3);
            assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        }

        #[test]
        fn resubscribe_replaces_listener() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Action);
            let log = Arc::new(Mutex::new(Vec::new()));
            let first = broadcast.subscribe(id(1), recorder(&log, 10));
            let second = broadcast.subscribe(id(1), recorder(&log, 20));

            assert_eq!(broadcast.subscriber_count(), 1);
            assert!(!first.is_active());
            assert!(second.is_active());

            broadcast.publish(&());
            assert_eq!(*log.lock().unwrap(), vec![20]);
        }

        #[test]
        fn stale_token_does_not_remove_replacement() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Cast);
            let log = Arc::new(Mutex::new(Vec::new()));
            let first = broadcast.subscribe(id(1), recorder(&log, 1));
            let _second = broadcast.subscribe(id(1), recorder(&log, 2));

            drop(first);
            assert!(broadcast.is_subscribed(id(1)));
            broadcast.publish(&());
            assert_eq!(*log.lock().unwrap(), vec![2]);
        }

        #[test]
        fn dropping_token_unsubscribes() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Cast);
            let log = Arc::new(Mutex::new(Vec::new()));
            let token = broadcast.subscribe(id(4), recorder(&log, 4));
            assert_eq!(token.publisher(), id(0));
            assert_eq!(token.subscriber(), id(4));
            assert_eq!(token.channel(), Channel::Cast);

            token.unsubscribe();
            assert_eq!(broadcast.subscriber_count(), 0);
            assert_eq!(broadcast.publish(&()), 0);
        }

        #[test]
        fn token_outliving_broadcast_is_harmless() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Cast);
            let log = Arc::new(Mutex::new(Vec::new()));
            let token = broadcast.subscribe(id(1), recorder(&log, 1));
            drop(broadcast);
            assert!(!token.is_active());
            drop(token);
        }

        #[test]
        fn clear_makes_tokens_inert() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Cast);
            let log = Arc::new(Mutex::new(Vec::new()));
            let token = broadcast.subscribe(id(1), recorder(&log, 1));
            broadcast.clear();
            assert!(!token.is_active());
        }
    }

    mod reentrancy_tests {
        use super::*;

        #[test]
        fn listener_may_publish_again() {
            let broadcast: Arc<Broadcast<u32>> = Arc::new(Broadcast::new(id(0), Channel::Cast));
            let calls = Arc::new(AtomicUsize::new(0));

            let inner = Arc::downgrade(&broadcast);
            let counter = Arc::clone(&calls);
            let _token = broadcast.subscribe(
                id(1),
                Arc::new(move |depth: &u32| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if *depth < 3 {
                        if let Some(b) = inner.upgrade() {
                            b.publish(&(depth + 1));
                        }
                    }
                }),
            );

            broadcast.publish(&0);
            assert_eq!(calls.load(Ordering::SeqCst), 4);
        }

        #[test]
        fn listener_added_during_publish_waits_for_next_publish() {
            let broadcast: Arc<Broadcast<()>> = Arc::new(Broadcast::new(id(0), Channel::Cast));
            let log = Arc::new(Mutex::new(Vec::new()));
            let late_tokens = Arc::new(Mutex::new(Vec::new()));

            let inner = Arc::downgrade(&broadcast);
            let late_log = Arc::clone(&log);
            let tokens = Arc::clone(&late_tokens);
            let _token = broadcast.subscribe(
                id(1),
                Arc::new(move |(): &()| {
                    if let Some(b) = inner.upgrade() {
                        let token = b.subscribe(id(2), recorder(&late_log, 2));
                        tokens.lock().unwrap().push(token);
                    }
                }),
            );

            assert_eq!(broadcast.publish(&()), 1);
            assert!(log.lock().unwrap().is_empty());
            assert_eq!(broadcast.publish(&()), 2);
            assert_eq!(*log.lock().unwrap(), vec![2]);
        }

        #[test]
        fn listener_may_drop_own_subscription() {
            let broadcast: Broadcast<()> = Broadcast::new(id(0), Channel::Action);
            let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
            let calls = Arc::new(AtomicUsize::new(0));

            let own = Arc::clone(&slot);
            let counter = Arc::clone(&calls);
            let token = broadcast.subscribe(
                id(1),
                Arc::new(move |(): &()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    own.lock().unwrap().take();
                }),
            );
            *slot.lock().unwrap() = Some(token);

            broadcast.publish(&());
            broadcast.publish(&());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn channels_route_by_kind() {
        let channels: Channels<()> = Channels::new(id(7));
        assert_eq!(channels.get(Channel::Cast).channel(), Channel::Cast);
        assert_eq!(channels.get(Channel::Action).channel(), Channel::Action);
        assert_eq!(channels.get(Channel::Action).owner(), id(7));
    }

    #[test]
    fn channel_display_matches_event_names() {
        assert_eq!(Channel::Cast.to_string(), "OnCast");
        assert_eq!(Channel::Action.to_string(), "OnAction");
    }

    #[test]
    fn broadcast_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Broadcast<()>>();
        assert_send_sync::<Subscription>();
    }
}
