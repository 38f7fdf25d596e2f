pub mod auth;
pub mod context;
pub mod convert;
pub mod error;
pub mod loader;
pub mod loaders;
pub mod posts;
pub mod routes;
pub mod session;
pub mod state;
pub mod validate;
pub mod votes;

pub use error::ApiError;
pub use routes::router;
pub use state::{ApiConfig, AppState, AppStateInner};
