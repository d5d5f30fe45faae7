pub mod auth;
pub mod dashboard;
pub mod files;
pub mod health;
pub mod users;
pub mod ws;
