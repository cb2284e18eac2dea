//! Client runtime — wires the connection to the session state.
//!
//! `AgentClient` owns the connection slot and a `ChatSession`, refreshes a
//! lock-free snapshot after every applied frame, and notifies consumers
//! through a revision watch channel.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::connection::{Connection, ConnectionState, ReconnectPolicy};
use crate::error::ClientError;
use crate::session::{ChatSession, SessionSnapshot};

/// Connection parameters, derived from the embedding environment
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub url: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// Handle to a running client (cheap to Clone).
#[derive(Clone)]
pub struct AgentClient {
    connection: Connection,
    session: Arc<Mutex<ChatSession>>,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    revision_tx: watch::Sender<u64>,
}

impl AgentClient {
    /// Build the client and register the frame handler. Must be called
    /// within a tokio runtime; no IO happens until `connect()`.
    pub async fn new(options: ClientOptions) -> Self {
        let connection = Connection::new(options.url, options.reconnect);
        let session = Arc::new(Mutex::new(ChatSession::new()));
        let snapshot = Arc::new(ArcSwap::from_pointee(SessionSnapshot::default()));
        let (revision_tx, _) = watch::channel(0);

        let handler_session = Arc::clone(&session);
        let handler_snapshot = Arc::clone(&snapshot);
        let handler_revision = revision_tx.clone();
        connection
            .set_handler(move |frame| {
                let mut session = handler_session
                    .lock()
                    .expect("session mutex poisoned");
                session.apply(&frame);
                let snap = session.snapshot();
                handler_revision.send_replace(snap.revision);
                handler_snapshot.store(Arc::new(snap));
            })
            .await;

        Self {
            connection,
            session,
            snapshot,
            revision_tx,
        }
    }

    pub async fn connect(&self) {
        self.connection.connect().await;
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Send user text. Fails with `NotConnected` when the connection is
    /// not open; the local user entry is appended only after a successful
    /// send, so a rejected send leaves the transcript untouched.
    pub async fn send_user_text(&self, text: &str) -> Result<(), ClientError> {
        self.connection.send(text).await?;
        let mut session = self.session.lock().expect("session mutex poisoned");
        session.push_user_entry(text);
        let snap = session.snapshot();
        self.revision_tx.send_replace(snap.revision);
        self.snapshot.store(Arc::new(snap));
        Ok(())
    }

    /// Toggle a tool entry's expansion flag and publish a fresh snapshot.
    /// Returns false when `entry_id` names no tool entry.
    pub fn toggle_expanded(&self, entry_id: &str) -> bool {
        let mut session = self.session.lock().expect("session mutex poisoned");
        if !session.toggle_expanded(entry_id) {
            return false;
        }
        let snap = session.snapshot();
        self.revision_tx.send_replace(snap.revision);
        self.snapshot.store(Arc::new(snap));
        true
    }

    /// Lock-free snapshot of the current transcript, actions, and
    /// processing flag.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot.load_full()
    }

    /// Watch revision changes; the value is the latest applied revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }
}
