pub mod auth;
pub mod handlers;
pub mod health;
pub mod routes;
