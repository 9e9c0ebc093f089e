//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use course_sync_core::CourseSyncService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<CourseSyncService>,
    pub config: Arc<Config>,
}
