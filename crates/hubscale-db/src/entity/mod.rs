//! database entity models for sea-orm.
//!
//! these entities map to database tables and handle serialization
//! of list-valued fields to/from json text columns.

pub mod node;
pub mod route;
pub mod user;
