//! Route table

use actix_web::web;

use super::handlers;

/// Register all routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/categories", web::get().to(handlers::categories))
        .route("/products", web::get().to(handlers::products));
}
