pub mod account;
pub mod app;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod documents;
pub mod drag;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod ui;
pub mod validation;

pub use app::router;
pub use config::Config;
pub use state::AppState;
