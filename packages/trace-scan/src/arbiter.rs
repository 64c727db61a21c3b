// Process-wide camera exclusivity
//
// The camera is a single exclusive resource. Sessions sharing an arbiter
// claim it on `start()`; a claim while another session holds it force-stops
// that session first, so two streams are never open at once.

use crate::session::SessionShared;
use crate::types::Termination;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

struct Holder {
    session_id: String,
    session: Weak<SessionShared>,
}

#[derive(Default)]
pub struct CameraArbiter {
    holder: Mutex<Option<Holder>>,
}

impl CameraArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the session currently holding the claim
    pub fn holder(&self) -> Option<String> {
        self.holder
            .lock()
            .as_ref()
            .map(|holder| holder.session_id.clone())
    }

    pub(crate) fn claim(&self, session: &Arc<SessionShared>) {
        let previous = {
            let mut holder = self.holder.lock();
            if let Some(current) = holder.as_ref() {
                if current.session_id == session.id() {
                    return;
                }
            }
            holder.replace(Holder {
                session_id: session.id().to_string(),
                session: Arc::downgrade(session),
            })
        };

        if let Some(previous) = previous.and_then(|holder| holder.session.upgrade()) {
            log::info!(
                "Session {} takes the camera from session {}",
                session.id(),
                previous.id()
            );
            previous.halt(Termination::Preempted);
        }
    }

    pub(crate) fn release(&self, session_id: &str) {
        let mut holder = self.holder.lock();
        if holder
            .as_ref()
            .is_some_and(|current| current.session_id == session_id)
        {
            *holder = None;
        }
    }
}
