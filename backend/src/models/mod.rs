use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::middleware::RateLimiter;
use crate::services::okta::OktaDirectory;
use crate::services::websocket::FleetHub;

pub mod fleet;
pub mod owner;
pub mod refresh_token;
pub mod user;
pub mod vehicle;

pub use fleet::*;
pub use owner::*;
pub use refresh_token::*;
pub use user::*;
pub use vehicle::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub hub: Arc<FleetHub>,
    pub okta: Arc<OktaDirectory>,
    pub login_rate_limiter: Arc<RateLimiter>,
}
