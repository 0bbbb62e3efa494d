//! Dispatcher: owns per-session state and routes each message to the
//! handler for the session's phase.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::extractor::Extractor;
use super::handlers::{self, HandlerContext};
use super::keywords::is_cancel;
use super::state::{Phase, SessionState};
use crate::error::Error;
use crate::orders::OrderService;

const CANCELLED: &str = "已取消目前的流程。有其他需要請隨時告訴我。";
const EMPTY_MESSAGE: &str = "請輸入訊息。";

/// Routes chat messages through the ordering state machine.
///
/// The session map lock is held only to snapshot and write back, never
/// across a handler call. Two concurrent messages for the same session
/// therefore race and the later write wins.
pub struct Dispatcher {
    service: OrderService,
    extractor: Arc<dyn Extractor>,
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl Dispatcher {
    pub fn new(service: OrderService, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            service,
            extractor,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Process one user message and return the reply.
    ///
    /// On `Err` the session is left exactly as it was.
    pub async fn handle_message(&self, session_id: &str, message: &str) -> Result<String, Error> {
        let text = message.trim();
        if text.is_empty() {
            return Ok(EMPTY_MESSAGE.to_string());
        }

        let mut state = self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        let from = state.phase;

        let reply = if is_cancel(text) && from.is_active() {
            state.cancel();
            CANCELLED.to_string()
        } else {
            let ctx = HandlerContext {
                service: &self.service,
                extractor: self.extractor.as_ref(),
            };
            let transition = handlers::handle(&ctx, &state, text).await?;
            if !from.can_transition_to(transition.next) {
                warn!(
                    session = %session_id,
                    from = %from,
                    to = %transition.next,
                    "Unexpected phase transition"
                );
            }
            state.apply(transition.patch, transition.next);
            transition.reply
        };

        state.record_turn(text, &reply);
        let to = state.phase;
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), state);

        if from != to {
            info!(session = %session_id, from = %from, to = %to, "Phase transition");
        }
        Ok(reply)
    }

    /// Snapshot of a session, if it exists.
    pub async fn session(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Current phase of a session; unknown sessions are idle.
    pub async fn phase(&self, session_id: &str) -> Phase {
        self.session(session_id)
            .await
            .map(|s| s.phase)
            .unwrap_or_default()
    }
}
