use crate::model::TableName;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, Weak,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, span, trace, Level};

/// Changes a [`ChangeFeed`] buffers before it collapses them into one
/// [`Change::All`].
pub const FEED_CAPACITY: usize = 64;

/// What changed. `All` is the unqualified signal that asks every observer to
/// re-read, regardless of the tables it watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum Change {
    Table(TableName),
    All,
}

impl Change {
    pub fn affects(&self, tables: &[TableName]) -> bool {
        match self {
            Change::Table(t) => tables.contains(t),
            Change::All => true,
        }
    }
}

type Callback = Arc<dyn Fn(Change) + Send + Sync>;

struct Subscriber {
    id: u64,
    tables: Vec<TableName>,
    active: Arc<AtomicBool>,
    callback: Callback,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl HubInner {
    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: u64) {
        self.subscribers().retain(|s| s.id != id);
    }
}

/// Publish/subscribe point shared by every view context over one durable
/// backing. Clones share subscribers: hand a clone to each store that should
/// hear about the others' writes.
#[derive(Clone, Default)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `callback` whenever one of `tables` changes or on `Change::All`.
    pub fn subscribe<F>(&self, tables: &[TableName], callback: F) -> Subscription
    where
        F: Fn(Change) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner.subscribers().push(Subscriber {
            id,
            tables: tables.to_vec(),
            active: active.clone(),
            callback: Arc::new(callback),
        });
        trace!(id, ?tables, "Subscribed");
        Subscription {
            id,
            active,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Notifies each matching subscriber exactly once and returns how many were
    /// called. Callbacks run on the caller's thread, after the subscriber list
    /// lock is released, so they may read stores or (un)subscribe.
    pub fn publish(&self, change: Change) -> usize {
        let targets: Vec<(Arc<AtomicBool>, Callback)> = self
            .inner
            .subscribers()
            .iter()
            .filter(|s| change.affects(&s.tables))
            .map(|s| (s.active.clone(), s.callback.clone()))
            .collect();
        let span = span!(Level::DEBUG, "publish", ?change, targets = targets.len());
        let _enter = span.enter();
        let mut notified = 0;
        for (active, callback) in targets {
            // an earlier callback in this round may have unsubscribed it
            if active.load(Ordering::Acquire) {
                callback(change);
                notified += 1;
            }
        }
        notified
    }

    pub fn notify_local(&self) -> usize {
        self.publish(Change::All)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }

    /// Bridges matching changes into an async receiver holding at most
    /// [`FEED_CAPACITY`] changes. A reader that falls behind gets a single
    /// `Change::All` in place of the backlog.
    pub fn channel(&self, tables: &[TableName]) -> ChangeFeed {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let overflowed = Arc::new(AtomicBool::new(false));
        let subscription = {
            let overflowed = overflowed.clone();
            self.subscribe(tables, move |change| match tx.try_send(change) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    if !overflowed.swap(true, Ordering::AcqRel) {
                        debug!("Change feed full, collapsing backlog");
                    }
                }
                Err(e @ TrySendError::Closed(_)) => {
                    error!(error = %e, "Failed to forward change");
                }
            })
        };
        ChangeFeed {
            rx,
            overflowed,
            subscription,
        }
    }
}

/// Handle returned by [`ChangeHub::subscribe`]. Dropping it keeps the
/// subscription alive; call [`Subscription::unsubscribe`] to end it.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Returns true the first time; later calls do nothing.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
        trace!(id = self.id, "Unsubscribed");
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Receiving end of [`ChangeHub::channel`]. Unsubscribes when dropped.
pub struct ChangeFeed {
    rx: mpsc::Receiver<Change>,
    overflowed: Arc<AtomicBool>,
    subscription: Subscription,
}

impl ChangeFeed {
    pub async fn recv(&mut self) -> Option<Change> {
        match self.collapse() {
            Some(change) => Some(change),
            None => self.rx.recv().await,
        }
    }

    pub fn try_recv(&mut self) -> Option<Change> {
        self.collapse().or_else(|| self.rx.try_recv().ok())
    }

    // drops the queued backlog once a change was lost
    fn collapse(&mut self) -> Option<Change> {
        if !self.overflowed.swap(false, Ordering::AcqRel) {
            return None;
        }
        while self.rx.try_recv().is_ok() {}
        Some(Change::All)
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(Change) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_: Change| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn only_matching_tables_are_notified() {
        let hub = ChangeHub::new();
        let (jobs, cb) = counter();
        let _s = hub.subscribe(&[TableName::Jobs], cb);

        assert_eq!(hub.publish(Change::Table(TableName::Timesheets)), 0);
        assert_eq!(hub.publish(Change::Table(TableName::Jobs)), 1);
        assert_eq!(jobs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn global_signal_reaches_everyone() {
        let hub = ChangeHub::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let _sa = hub.subscribe(&[TableName::Jobs], cb_a);
        let _sb = hub.subscribe(&[], cb_b);

        assert_eq!(hub.notify_local(), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_subscribers() {
        let hub = ChangeHub::new();
        let other_context = hub.clone();
        let (count, cb) = counter();
        let _s = other_context.subscribe(&[TableName::Applications], cb);

        hub.publish(Change::Table(TableName::Applications));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = ChangeHub::new();
        let (count, cb) = counter();
        let sub = hub.subscribe(&[TableName::Jobs], cb);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(!sub.is_active());
        assert_eq!(hub.subscriber_count(), 0);
        hub.publish(Change::Table(TableName::Jobs));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_after_hub_dropped() {
        let hub = ChangeHub::new();
        let sub = hub.subscribe(&[TableName::Jobs], |_| {});
        drop(hub);
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn callback_can_unsubscribe_a_later_subscriber() {
        let hub = ChangeHub::new();
        let (count, cb) = counter();
        let victim = Arc::new(Mutex::new(None::<Subscription>));
        let v = victim.clone();
        let _first = hub.subscribe(&[TableName::Jobs], move |_| {
            if let Some(s) = v.lock().unwrap().as_ref() {
                s.unsubscribe();
            }
        });
        *victim.lock().unwrap() = Some(hub.subscribe(&[TableName::Jobs], cb));

        assert_eq!(hub.publish(Change::Table(TableName::Jobs)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn channel_forwards_changes() {
        let hub = ChangeHub::new();
        let mut feed = hub.channel(&[TableName::Timesheets]);
        hub.publish(Change::Table(TableName::Jobs));
        hub.publish(Change::Table(TableName::Timesheets));
        hub.notify_local();

        assert_eq!(feed.recv().await, Some(Change::Table(TableName::Timesheets)));
        assert_eq!(feed.recv().await, Some(Change::All));
        assert_eq!(feed.try_recv(), None);

        drop(feed);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_feed_collapses_backlog() {
        let hub = ChangeHub::new();
        let mut feed = hub.channel(&[TableName::Jobs, TableName::Users]);
        for _ in 0..FEED_CAPACITY * 3 {
            hub.publish(Change::Table(TableName::Jobs));
        }
        hub.publish(Change::Table(TableName::Users));

        assert_eq!(feed.recv().await, Some(Change::All));
        assert_eq!(feed.try_recv(), None);

        hub.publish(Change::Table(TableName::Users));
        assert_eq!(feed.recv().await, Some(Change::Table(TableName::Users)));
    }

    #[test]
    fn change_wire_format() {
        let json = serde_json::to_string(&Change::Table(TableName::Jobs)).unwrap();
        assert_eq!(json, r#"{"kind":"table","table":"jobs"}"#);
        let all: Change = serde_json::from_str(r#"{"kind":"all"}"#).unwrap();
        assert_eq!(all, Change::All);
    }
}
