//! Input update dispatcher.

use std::sync::Arc;

use tracing::trace;
use webmote_input::ControllerBackend;
use webmote_types::{ResolvedUpdate, Update};

use crate::error::DaemonError;
use crate::session::ControllerSession;

/// Applies decoded updates to one session's controller.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn ControllerBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ControllerBackend>) -> Self {
        Self { backend }
    }

    /// Validate `update`, write it to the backend, then mirror it.
    ///
    /// Unknown control names are rejected before any backend call. The mirror
    /// only changes once every backend write for the update has succeeded.
    pub async fn apply(
        &self,
        session: &ControllerSession,
        update: &Update,
    ) -> Result<(), DaemonError> {
        if !session.is_live() {
            return Err(DaemonError::SessionClosed(session.id()));
        }
        let resolved = ResolvedUpdate::resolve(update)?;
        let handle = session.handle();

        match resolved {
            ResolvedUpdate::Button { button, value } => {
                self.backend.set_button(handle, button, value).await?;
            }
            ResolvedUpdate::Stick { stick, x, y } => {
                let (ax, ay) = stick.axes();
                self.backend.set_axis(handle, ax, x).await?;
                self.backend.set_axis(handle, ay, y).await?;
            }
        }

        session.record(&resolved);
        trace!(session = %session.id(), ?resolved, "applied update");
        Ok(())
    }
}
