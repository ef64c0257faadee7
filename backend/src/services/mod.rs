pub mod auth;
pub mod fleets;
pub mod okta;
pub mod tokens;
pub mod vehicles;
pub mod websocket;
