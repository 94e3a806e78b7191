// client/tests/handshake.rs
use actix_web::{web, App, HttpServer};
use siwe_auth_server::{api, AppState};
use siwe_client::{ClientAgent, ClientConfig, HttpAuthBackend, LocalWallet, Phase};
use siwe_common::Config;
use std::sync::Arc;

const PASSWORD: &str = "complex_password_at_least_32_characters_long";
const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn server_config() -> Config {
    let mut config = Config::default();
    config.session.password = PASSWORD.to_string();
    config.session.secure = Some(false);
    config.auth.domain = "localhost:3000".to_string();
    config.validate().expect("test config is valid");
    config
}

#[actix_web::test]
async fn test_client_signs_in_against_live_server() {
    let state = web::Data::new(AppState::start(&server_config()));
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test server");
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let config = ClientConfig {
        api_base_url: format!("http://{}", addr),
        origin: "http://localhost:3000".to_string(),
        ..ClientConfig::default()
    };
    let backend = Arc::new(HttpAuthBackend::new(&config.api_base_url).unwrap());
    let wallet = Arc::new(LocalWallet::from_hex(DEV_KEY, 1).unwrap());
    let agent = ClientAgent::new(config, backend, wallet);

    assert_eq!(agent.probe_session().await.unwrap(), None);
    assert_eq!(agent.state().phase(), Phase::Anonymous);

    let address = agent.sign_in().await.unwrap();
    assert_eq!(address.to_string(), DEV_ADDRESS);
    assert_eq!(agent.state().phase(), Phase::Authenticated);

    // The cookie set by /api/verify identifies the session
    assert_eq!(agent.probe_session().await.unwrap(), Some(address));

    agent.sign_out().await;
    assert_eq!(agent.state().phase(), Phase::Anonymous);
    assert_eq!(agent.probe_session().await.unwrap(), None);

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_client_rejected_for_wrong_domain() {
    let state = web::Data::new(AppState::start(&server_config()));
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test server");
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let config = ClientConfig {
        api_base_url: format!("http://{}", addr),
        origin: "https://phishing.example".to_string(),
        ..ClientConfig::default()
    };
    let backend = Arc::new(HttpAuthBackend::new(&config.api_base_url).unwrap());
    let wallet = Arc::new(LocalWallet::from_hex(DEV_KEY, 1).unwrap());
    let agent = ClientAgent::new(config, backend, wallet);

    let err = agent.sign_in().await.unwrap_err();
    assert_eq!(err, siwe_client::ClientError::VerificationFailed { status: 401 });
    assert!(!agent.state().loading);
    assert_eq!(agent.probe_session().await.unwrap(), None);

    handle.stop(true).await;
}
