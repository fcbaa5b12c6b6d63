//! Status snapshot exporter.

use webmote_types::{ControllerKind, ControllerStatus, StatusReport};

use crate::registry::SessionRegistry;

/// Project the registry's open sessions into the status document.
pub fn get_status(registry: &SessionRegistry) -> StatusReport {
    let controllers = registry
        .snapshot()
        .into_iter()
        .map(|view| {
            let (index, user_index, attached, kind) = match view.info {
                Some(info) => (info.index, info.user_index, info.attached, info.kind),
                None => (0, 0, false, ControllerKind::X360),
            };
            ControllerStatus {
                index,
                user_index,
                attached,
                kind,
                axis: view.mirror.axis,
                button: view.mirror.button,
            }
        })
        .collect();
    StatusReport { controllers }
}
