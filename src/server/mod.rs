//! JSON HTTP surface (feature `server`).

mod routes;

pub use routes::{create_router, create_router_with_name, AppState};
