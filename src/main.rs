use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use premiere_server::auth::JwtService;
use premiere_server::clients::{HttpNotifier, PaystackClient};
use premiere_server::config::Config;
use premiere_server::routes::create_routes;
use premiere_server::settings;
use premiere_server::state::AppState;
use premiere_server::workflow::PaymentWorkflow;

const OUTBOUND_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    settings::seed_defaults(&pool)
        .await
        .expect("Failed to seed default settings");

    tracing::info!("Migrations run and settings seeded");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(OUTBOUND_TIMEOUT_SECS))
        .build()
        .expect("Failed to build HTTP client");

    let provider = Arc::new(PaystackClient::new(
        http.clone(),
        config.paystack_base_url.clone(),
        config.paystack_secret_key.clone(),
    ));
    let notifier = Arc::new(HttpNotifier::new(
        http,
        config.mailer.clone(),
        config.whatsapp.clone(),
    ));

    let workflow = Arc::new(PaymentWorkflow::new(
        pool.clone(),
        provider,
        notifier,
        config.frontend_url.clone(),
    ));

    let state = AppState {
        pool,
        jwt: JwtService::new(&config.jwt_secret),
        workflow,
        frontend_url: config.frontend_url.clone(),
    };

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
