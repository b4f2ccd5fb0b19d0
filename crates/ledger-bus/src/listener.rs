//! # Listener Registration
//!
//! Listeners are held weakly: the hub never keeps a listener alive. A
//! listener dropped by its owner stays in the set until the next dispatch on
//! one of its channels notices the dead reference and purges it.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, error};

use crate::events::MessageChannel;
use crate::message::Message;

/// Observer of messages on a hub.
///
/// Invoked on the hub's dispatch task, one message at a time and in publish
/// order. Implementations must return promptly: a slow listener delays every
/// later delivery on the same hub.
pub trait MessageListener: Send + Sync {
    /// Called once per message on a subscribed channel.
    fn message_posted(&self, message: &Message);
}

type ListenerRef = Weak<dyn MessageListener>;

fn identity(listener: &ListenerRef) -> *const () {
    listener.as_ptr() as *const ()
}

/// Per-channel weak listener sets.
#[derive(Default)]
pub(crate) struct ListenerSet {
    channels: RwLock<HashMap<MessageChannel, Vec<ListenerRef>>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a listener to a channel. Returns `false` for a duplicate.
    pub(crate) fn register(&self, bus: &str, listener: &ListenerRef, channel: MessageChannel) -> bool {
        let target = identity(listener);
        let mut channels = self.channels.write();
        let set = channels.entry(channel).or_default();

        if set
            .iter()
            .any(|existing| existing.strong_count() > 0 && identity(existing) == target)
        {
            error!(
                bus,
                %channel,
                backtrace = %Backtrace::force_capture(),
                "Listener already registered on channel"
            );
            return false;
        }

        set.push(Weak::clone(listener));
        debug!(bus, %channel, listeners = set.len(), "Listener registered");
        true
    }

    /// Remove a listener from a channel, purging dead references on the way.
    pub(crate) fn unregister(&self, listener: &ListenerRef, channel: MessageChannel) -> bool {
        let target = identity(listener);
        let mut channels = self.channels.write();
        let Some(set) = channels.get_mut(&channel) else {
            return false;
        };

        let before = set.len();
        let mut removed = false;
        set.retain(|existing| {
            if identity(existing) == target {
                removed = true;
                return false;
            }
            existing.strong_count() > 0
        });

        if set.len() != before {
            debug!(%channel, removed = before - set.len(), "Listeners removed");
        }
        removed
    }

    /// Copy of a channel's set, for iteration outside the lock.
    pub(crate) fn snapshot(&self, channel: MessageChannel) -> Vec<ListenerRef> {
        self.channels
            .read()
            .get(&channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every dead reference on a channel.
    pub(crate) fn purge_dead(&self, channel: MessageChannel) -> usize {
        let mut channels = self.channels.write();
        let Some(set) = channels.get_mut(&channel) else {
            return 0;
        };
        let before = set.len();
        set.retain(|existing| existing.strong_count() > 0);
        before - set.len()
    }

    /// Entries on a channel, dead ones included.
    pub(crate) fn len(&self, channel: MessageChannel) -> usize {
        self.channels.read().get(&channel).map_or(0, Vec::len)
    }

    pub(crate) fn clear(&self) {
        self.channels.write().clear();
    }
}

/// Weak reference to a listener, as stored in a [`ListenerSet`].
pub(crate) fn downgrade<L: MessageListener + 'static>(listener: &Arc<L>) -> ListenerRef {
    let weak: Weak<L> = Arc::downgrade(listener);
    weak
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl MessageListener for Noop {
        fn message_posted(&self, _message: &Message) {}
    }

    #[test]
    fn test_duplicate_rejected() {
        let set = ListenerSet::new();
        let listener = Arc::new(Noop);
        let weak = downgrade(&listener);

        assert!(set.register("test", &weak, MessageChannel::Account));
        assert!(!set.register("test", &weak, MessageChannel::Account));
        assert!(set.register("test", &weak, MessageChannel::Budget));
        assert_eq!(set.len(MessageChannel::Account), 1);
    }

    #[test]
    fn test_unregister_by_identity() {
        let set = ListenerSet::new();
        let a = Arc::new(Noop);
        let b = Arc::new(Noop);

        set.register("test", &downgrade(&a), MessageChannel::Tag);
        set.register("test", &downgrade(&b), MessageChannel::Tag);

        assert!(set.unregister(&downgrade(&a), MessageChannel::Tag));
        assert!(!set.unregister(&downgrade(&a), MessageChannel::Tag));
        assert_eq!(set.len(MessageChannel::Tag), 1);
    }

    #[test]
    fn test_unregister_purges_dead() {
        let set = ListenerSet::new();
        let keep = Arc::new(Noop);
        let dropped = Arc::new(Noop);

        set.register("test", &downgrade(&keep), MessageChannel::Config);
        set.register("test", &downgrade(&dropped), MessageChannel::Config);
        drop(dropped);

        let other = Arc::new(Noop);
        assert!(!set.unregister(&downgrade(&other), MessageChannel::Config));
        assert_eq!(set.len(MessageChannel::Config), 1);
    }

    #[test]
    fn test_purge_dead() {
        let set = ListenerSet::new();
        let listener = Arc::new(Noop);
        set.register("test", &downgrade(&listener), MessageChannel::Reminder);
        drop(listener);

        assert_eq!(set.snapshot(MessageChannel::Reminder).len(), 1);
        assert_eq!(set.purge_dead(MessageChannel::Reminder), 1);
        assert_eq!(set.len(MessageChannel::Reminder), 0);
    }
}
