pub mod actions;
pub mod auth;
