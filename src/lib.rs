pub mod api;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod config;
pub mod contact;
pub mod db;
pub mod db_migrate;
pub mod email_sender;
pub mod error;
pub mod members;
pub mod models;
pub mod profiles;
pub mod server;
pub mod state;
pub mod store;
pub mod templates;

pub use db::ScyllaStore;
pub use error::Result as AppResult;
pub use state::StoreStateManager;
pub use store::{EntityStore, MemoryStore};
