use actix_web::web;

pub mod auth;
pub mod fleets;
pub mod telemetry;
pub mod vehicles;
pub mod websocket;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth::configure)
            .configure(fleets::configure)
            .configure(vehicles::configure)
            .configure(telemetry::configure),
    );
}
