pub mod advisory;
pub mod error;
pub mod events;
pub mod incident;
pub mod methodology;
pub mod recommender;
pub mod resolver;
pub mod schema;
pub mod session;
