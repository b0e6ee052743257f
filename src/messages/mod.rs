//! Contact messages: public submission and the admin inbox.

pub mod api;
pub mod models;
pub mod store;

pub use models::Message;
pub use store::MessageStore;
