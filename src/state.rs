use crate::engine::MatchingEngine;
use std::sync::Arc;

/// Shared handle passed to every route: the engine owns all books, trade
/// histories and event channels.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(MatchingEngine::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}
