pub mod extract;
pub mod routes;

pub use extract::ApiJson;
pub use routes::{create_router, parse_id, AppState, Gates};
