//! Controller session registry.
//!
//! The registry is the only state shared between connections. Membership
//! means "this client has an open, usable channel right now".

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use webmote_input::{ControllerBackend, ControllerInfo};
use webmote_types::SessionId;

use crate::error::DaemonError;
use crate::session::{lock, ControlMirror, ControllerSession};
use crate::state::TransportState;

struct Entry {
    seq: u64,
    session: ControllerSession,
}

#[derive(Default)]
struct Members {
    sessions: HashMap<SessionId, Entry>,
    next_seq: u64,
}

/// One `Open` session as seen by [`SessionRegistry::snapshot`].
#[derive(Debug, Clone)]
pub struct SessionView {
    pub id: SessionId,
    pub info: Option<ControllerInfo>,
    pub mirror: ControlMirror,
}

/// Tracks live controller sessions and owns the backend context.
pub struct SessionRegistry {
    backend: Arc<dyn ControllerBackend>,
    members: Mutex<Members>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn ControllerBackend>) -> Self {
        Self {
            backend,
            members: Mutex::new(Members::default()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ControllerBackend> {
        &self.backend
    }

    /// Allocate and plug in a controller, registering the session as `Connecting`.
    ///
    /// On failure nothing is registered and any half-created controller is released.
    pub async fn create_session(&self) -> Result<ControllerSession, DaemonError> {
        let handle = self
            .backend
            .create_controller()
            .await
            .map_err(DaemonError::BackendUnavailable)?;

        if let Err(e) = self.backend.connect(handle).await {
            if let Err(release) = self.backend.disconnect(handle).await {
                warn!(%handle, error = %release, "failed to release unconnected controller");
            }
            return Err(DaemonError::BackendUnavailable(e));
        }

        let session = ControllerSession::new(handle);
        {
            let mut members = lock(&self.members);
            let seq = members.next_seq;
            members.next_seq += 1;
            members.sessions.insert(
                session.id(),
                Entry {
                    seq,
                    session: session.clone(),
                },
            );
        }
        debug!(session = %session.id(), %handle, "session created");
        Ok(session)
    }

    /// Move a session to `Open`, making it visible in snapshots.
    pub fn activate(&self, session: &ControllerSession) {
        if session.open() {
            info!(session = %session.id(), handle = %session.handle(), "session open");
        }
    }

    /// Release the session's controller and forget it. Idempotent.
    pub async fn destroy(&self, session: &ControllerSession) {
        if !session.begin_destroy() {
            return;
        }
        lock(&self.members).sessions.remove(&session.id());
        if let Err(e) = self.backend.disconnect(session.handle()).await {
            warn!(session = %session.id(), error = %e, "failed to release controller");
        }
        info!(session = %session.id(), "session closed");
    }

    /// `Open` sessions in creation order.
    pub fn snapshot(&self) -> Vec<SessionView> {
        let members = lock(&self.members);
        let mut open: Vec<(u64, SessionView)> = members
            .sessions
            .values()
            .filter_map(|entry| {
                let (state, mirror) = entry.session.view();
                (state == TransportState::Open).then(|| {
                    (
                        entry.seq,
                        SessionView {
                            id: entry.session.id(),
                            info: self.backend.describe(entry.session.handle()),
                            mirror,
                        },
                    )
                })
            })
            .collect();
        open.sort_by_key(|(seq, _)| *seq);
        open.into_iter().map(|(_, view)| view).collect()
    }

    /// Number of registered sessions, open or not.
    pub fn len(&self) -> usize {
        lock(&self.members).sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every session still registered.
    pub async fn close_all(&self) {
        let sessions: Vec<ControllerSession> = lock(&self.members)
            .sessions
            .values()
            .map(|e| e.session.clone())
            .collect();
        for session in sessions {
            self.destroy(&session).await;
        }
    }
}
