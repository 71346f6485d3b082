//! statement helpers usable on a plain connection or inside a transaction.
//!
//! every function is generic over [`sea_orm::ConnectionTrait`] so the
//! registry can run a whole check-then-write sequence on one
//! [`WriteTxn`](crate::WriteTxn).

pub mod node;
pub mod route;
pub mod user;
