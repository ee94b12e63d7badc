pub mod auth;
pub mod clients;
pub mod config;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod settings;
pub mod state;
pub mod utils;
pub mod workflow;
