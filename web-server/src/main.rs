// web-server/src/main.rs
use actix_web::{web, App, HttpServer};
use siwe_auth_server::{api, middleware::RateLimiter, AppState};
use siwe_common::{setup_tracing, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration; refuse to start without a usable session secret
    let config = Config::load().map_err(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let level = config
        .tracing_level()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    setup_tracing(level).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let server_addr = config.web_server_addr.clone();
    tracing::info!(
        "Starting auth server on {} for domain {} (secure cookies: {})",
        server_addr,
        config.auth.domain,
        config.secure_cookies()
    );

    let state = web::Data::new(AppState::start(&config));
    let limiter = RateLimiter::from_config(&config.rate_limit);
    limiter.start_sweeper();

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(limiter.clone())
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
