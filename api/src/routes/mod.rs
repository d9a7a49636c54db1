pub mod config;
pub mod health;
pub mod incidents;
pub mod sessions;
