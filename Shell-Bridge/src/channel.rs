use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ChannelInner<T> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<T>)>>,
}

/// An in-process publish/subscribe channel.
///
/// Handlers run synchronously inside [`publish()`](Self::publish), in
/// subscription order, so values published on one channel are observed in
/// publish order. Cloning a `Channel` yields another handle to the same
/// subscriber list.
///
/// # Example
///
/// ```
/// use shell_bridge::Channel;
/// use std::sync::{Arc, Mutex};
///
/// let channel = Channel::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let sub = channel.subscribe(move |v: &u32| sink.lock().unwrap().push(*v));
///
/// channel.publish(1);
/// sub.unsubscribe();
/// channel.publish(2);
///
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
/// ```
pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                next_id: AtomicU64::new(0),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Deliver `value` to every current subscriber.
    pub fn publish(&self, value: T) {
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking.
        let handlers: Vec<Handler<T>> = match self.inner.handlers.lock() {
            Ok(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            Err(_) => return,
        };
        for handler in handlers {
            handler(&value);
        }
    }

    /// Register a handler. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut list) = self.inner.handlers.lock() {
            list.push((id, Arc::new(handler)));
        }

        let weak: Weak<ChannelInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut list) = inner.handlers.lock() {
                    list.retain(|(existing, _)| *existing != id);
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.lock().map(|l| l.len()).unwrap_or(0)
    }
}

/// Handle returned by [`Channel::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the handler from its channel.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the handler registered for the lifetime of the channel.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let channel: Channel<&'static str> = Channel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        let _s1 = channel.subscribe(move |v| a.lock().unwrap().push(format!("a:{v}")));
        let b = Arc::clone(&seen);
        let _s2 = channel.subscribe(move |v| b.lock().unwrap().push(format!("b:{v}")));

        channel.publish("x");
        channel.publish("y");

        assert_eq!(*seen.lock().unwrap(), vec!["a:x", "b:x", "a:y", "b:y"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let channel: Channel<u8> = Channel::new();
        let sub = channel.subscribe(|_| {});
        assert_eq!(channel.subscriber_count(), 1);
        drop(sub);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_handler() {
        let channel: Channel<u8> = Channel::new();
        channel.subscribe(|_| {}).detach();
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_channel_dropped() {
        let channel: Channel<u8> = Channel::new();
        let sub = channel.subscribe(|_| {});
        drop(channel);
        sub.unsubscribe();
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let channel: Channel<u8> = Channel::new();
        let inner = channel.clone();
        let _sub = channel.subscribe(move |_| inner.subscribe(|_| {}).detach());
        channel.publish(1);
        assert_eq!(channel.subscriber_count(), 2);
    }
}
