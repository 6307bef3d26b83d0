pub mod app_state;
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware_auth;
pub mod models;
pub mod patch;
pub mod permissions;
pub mod policy;
pub mod requests;
pub mod resources;
pub mod routes;
pub mod services;
pub mod utils;

pub use app_state::AppState;
pub use config::Config;
pub use errors::*;
pub use models::*;
pub use routes::build_router;
pub use utils::*;
