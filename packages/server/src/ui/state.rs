//! Server state shared by the route handlers.

use crate::{config::PumpConfig, hub::HubHandle};

/// Shared application state
pub struct AppState {
    /// Entry point to the connection registry
    pub hub: HubHandle,
    /// Limits applied to every accepted connection
    pub pump: PumpConfig,
}
