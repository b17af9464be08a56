pub mod access;
pub mod app;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod mapper;
pub mod middleware;
pub mod mock;
pub mod schema;
pub mod state;
pub mod types;

pub use app::app;
pub use state::AppState;
