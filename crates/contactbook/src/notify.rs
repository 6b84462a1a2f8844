//! Change notification for the relational backend.
//!
//! A [`ChangeFeed`] hands out receivers of [`ChangeEvent`]s. The
//! [`ChangeNotifier`] subscribes once and calls a refresh callback for every
//! event. If the subscription cannot be set up, the notifier logs the failure
//! and runs degraded: no task, no polling, no callbacks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::contact::ContactId;
use crate::error::{Error, Result};

/// What happened to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A record was created.
    Insert,
    /// A record was edited.
    Update,
    /// A record was deleted.
    Delete,
    /// Another connection committed a change; details unknown.
    External,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::External => write!(f, "external"),
        }
    }
}

/// A single change to the contact collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Affected record, when known.
    pub id: Option<ContactId>,
}

impl ChangeEvent {
    /// Event for a known record.
    #[must_use]
    pub fn new(kind: ChangeKind, id: impl Into<ContactId>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
        }
    }

    /// Event for a change made elsewhere.
    #[must_use]
    pub fn external() -> Self {
        Self {
            kind: ChangeKind::External,
            id: None,
        }
    }
}

/// A source of change events.
pub trait ChangeFeed {
    /// Open a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    fn subscribe(&self) -> Result<broadcast::Receiver<ChangeEvent>>;
}

/// Lifecycle of a notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    /// Subscribed and delivering events.
    Active,
    /// Subscription failed; no events will be delivered.
    Degraded,
    /// The subscription ended or was stopped.
    Stopped,
}

/// Subscribes to a [`ChangeFeed`] and drives a refresh callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeNotifier;

impl ChangeNotifier {
    /// Subscribe to `feed` and call `refresh` for each event.
    ///
    /// Must be called from within a tokio runtime to become active. Any setup
    /// failure is logged and yields a degraded handle instead of an error.
    pub fn start<F>(feed: &dyn ChangeFeed, refresh: F) -> NotifierHandle
    where
        F: FnMut(&ChangeEvent) + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "No async runtime; change notifications disabled");
                return NotifierHandle::degraded();
            }
        };

        let rx = match feed.subscribe() {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "Change subscription failed; continuing without live updates");
                return NotifierHandle::degraded();
            }
        };

        info!("Subscribed to contact changes");
        NotifierHandle {
            task: Some(runtime.spawn(Self::run(rx, refresh))),
        }
    }

    async fn run<F>(mut rx: broadcast::Receiver<ChangeEvent>, mut refresh: F)
    where
        F: FnMut(&ChangeEvent) + Send + 'static,
    {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    trace!(kind = %event.kind, id = ?event.id, "Change received");
                    refresh(&event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Change subscriber lagged; refreshing once");
                    refresh(&ChangeEvent::external());
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Change feed closed");
                    break;
                }
            }
        }
    }
}

/// Handle to a running (or degraded) notifier.
#[derive(Debug)]
pub struct NotifierHandle {
    task: Option<JoinHandle<()>>,
}

impl NotifierHandle {
    fn degraded() -> Self {
        Self { task: None }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> NotifierState {
        match &self.task {
            None => NotifierState::Degraded,
            Some(task) if task.is_finished() => NotifierState::Stopped,
            Some(_) => NotifierState::Active,
        }
    }

    /// Whether events are being delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == NotifierState::Active
    }

    /// Stop delivering events.
    pub fn stop(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Wait for the subscription to end on its own (feed closed).
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for NotifierHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watches a database file for commits made by other connections.
///
/// `SQLite` bumps `PRAGMA data_version` on a connection whenever another
/// connection commits. Each subscription opens its own read-only connection
/// to an existing database and checks the value once per interval.
#[derive(Debug, Clone)]
pub struct ExternalChangeFeed {
    path: PathBuf,
    interval: Duration,
    capacity: usize,
}

impl ExternalChangeFeed {
    /// Watch the database at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, interval: Duration, capacity: usize) -> Self {
        Self {
            path: path.into(),
            interval: interval.max(Duration::from_millis(1)),
            capacity: capacity.max(1),
        }
    }

    /// Path being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only connection to an existing database.
    fn open_watch_connection(path: &Path) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("PRAGMA data_version", [], |row| row.get(0))
    }

    async fn watch(
        conn: Connection,
        interval: Duration,
        mut last: i64,
        tx: broadcast::Sender<ChangeEvent>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if tx.receiver_count() == 0 {
                debug!("No change subscribers left; stopping database watch");
                break;
            }
            match Self::data_version(&conn) {
                Ok(version) if version != last => {
                    last = version;
                    let _ = tx.send(ChangeEvent::external());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Database watch failed; stopping");
                    break;
                }
            }
        }
    }
}

impl ChangeFeed for ExternalChangeFeed {
    fn subscribe(&self) -> Result<broadcast::Receiver<ChangeEvent>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::subscription(e.to_string()))?;

        let conn = Self::open_watch_connection(&self.path)
            .map_err(|e| Error::subscription(format!("{}: {e}", self.path.display())))?;
        let last = Self::data_version(&conn).map_err(|e| Error::subscription(e.to_string()))?;

        let (tx, rx) = broadcast::channel(self.capacity);
        runtime.spawn(Self::watch(conn, self.interval, last, tx));

        debug!("Watching {} for external changes", self.path.display());
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactFields;
    use crate::store::{ContactStore, SqliteStore};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    struct FailingFeed;

    impl ChangeFeed for FailingFeed {
        fn subscribe(&self) -> Result<broadcast::Receiver<ChangeEvent>> {
            Err(Error::subscription("backend unreachable"))
        }
    }

    fn jo() -> ContactFields {
        ContactFields::new("Jo", "2020-01-01", "jo@x.com", "1112223333")
    }

    fn forwarding() -> (
        impl FnMut(&ChangeEvent) + Send + 'static,
        mpsc::UnboundedReceiver<ChangeEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |event: &ChangeEvent| {
                let _ = tx.send(event.clone());
            },
            rx,
        )
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Insert.to_string(), "insert");
        assert_eq!(ChangeKind::External.to_string(), "external");
    }

    #[test]
    fn test_start_without_runtime_is_degraded() {
        let store = SqliteStore::open_in_memory().unwrap();
        let handle = ChangeNotifier::start(&store, |_| {});
        assert_eq!(handle.state(), NotifierState::Degraded);
    }

    #[tokio::test]
    async fn test_subscription_failure_is_degraded() {
        let handle = ChangeNotifier::start(&FailingFeed, |_| panic!("must not be called"));
        assert_eq!(handle.state(), NotifierState::Degraded);
        assert!(!handle.is_active());
        handle.stop();
    }

    #[tokio::test]
    async fn test_refresh_called_for_each_mutation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (refresh, mut events) = forwarding();
        let handle = ChangeNotifier::start(&store, refresh);
        assert!(handle.is_active());

        let created = store.create(&jo()).unwrap();
        store
            .update(&created.id, &crate::contact::ContactPatch::from(jo()))
            .unwrap();
        store.delete(&created.id).unwrap();

        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
            assert_eq!(event, ChangeEvent::new(kind, created.id.clone()));
        }
    }

    #[tokio::test]
    async fn test_notifier_stops_when_feed_closes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let handle = ChangeNotifier::start(&store, |_| {});
        drop(store);

        timeout(WAIT, handle.finished()).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_aborts_task() {
        let store = SqliteStore::open_in_memory().unwrap();
        let handle = ChangeNotifier::start(&store, |_| {});
        handle.stop();

        timeout(WAIT, async {
            while handle.state() != NotifierState::Stopped {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_external_feed_missing_database_is_degraded() {
        let feed = ExternalChangeFeed::new(
            "/nonexistent/path/contacts.db",
            Duration::from_millis(10),
            8,
        );
        assert!(feed.subscribe().is_err());
        let handle = ChangeNotifier::start(&feed, |_| {});
        assert_eq!(handle.state(), NotifierState::Degraded);
    }

    #[test]
    fn test_watch_connection_cannot_write() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("contacts.db");
        let writer = SqliteStore::open(&db_path, 8).unwrap();
        writer.create(&jo()).unwrap();

        let conn = ExternalChangeFeed::open_watch_connection(&db_path).unwrap();
        assert!(ExternalChangeFeed::data_version(&conn).is_ok());
        assert!(conn.execute("DELETE FROM contacts", []).is_err());
        assert_eq!(writer.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_external_feed_sees_other_connection() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("contacts.db");
        let writer = SqliteStore::open(&db_path, 8).unwrap();

        let feed = ExternalChangeFeed::new(&db_path, Duration::from_millis(10), 8);
        assert_eq!(feed.path(), db_path);
        let (refresh, mut events) = forwarding();
        let _handle = ChangeNotifier::start(&feed, refresh);

        writer.create(&jo()).unwrap();

        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event, ChangeEvent::external());
    }
}
