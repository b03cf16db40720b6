pub mod content;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod share;
pub mod state;
pub mod tags;
pub mod tokens;
pub mod users;
pub mod validation;
pub mod views;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
