use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer};
use crate::handlers::{self, admin, auth, movies, payments, settings};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-token", get(auth::verify_token))
        .route("/movies", get(movies::list_movies))
        .route("/image/:movie_id", get(movies::get_movie_image))
        .route("/payments/initialize", post(payments::initialize_payment))
        .route("/payments/verify/:reference", get(payments::verify_payment))
        .route("/payment-callback", get(payments::payment_callback))
        .route("/settings", get(settings::get_settings).post(settings::update_settings))
        .route("/admin/movies", get(movies::admin_list_movies).post(movies::create_movie))
        .route("/admin/movies/:movie_id", delete(movies::delete_movie))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:user_id", delete(admin::delete_user))
        .route("/admin/tickets", get(admin::list_tickets))
        .route("/admin/tickets/:ticket_id", delete(admin::delete_ticket))
        .route("/admin/verify-token", post(admin::verify_ticket_token))
        .route("/admin/send-vip-ticket", post(admin::send_vip_ticket))
        .route("/admin/send-reminder", post(admin::send_reminder));

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer())
        .with_state(state);

    apply_security_headers(router)
}
