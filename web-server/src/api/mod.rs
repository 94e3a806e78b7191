// web-server/src/api/mod.rs
pub mod auth;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(auth::nonce)
            .service(auth::verify)
            .service(auth::me)
            .service(auth::logout)
    );
}
