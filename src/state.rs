use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::JwtService;
use crate::workflow::PaymentWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: JwtService,
    pub workflow: Arc<PaymentWorkflow>,
    pub frontend_url: String,
}
