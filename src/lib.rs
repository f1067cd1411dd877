pub mod auth;
pub mod cliq;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
