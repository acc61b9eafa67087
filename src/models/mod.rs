pub mod payloads;
pub mod schema;
