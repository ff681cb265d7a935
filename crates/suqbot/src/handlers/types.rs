//! Handler types and dependencies

use std::sync::Arc;

use suqcore::nav::NavContext;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub nav: Arc<NavContext>,
}
