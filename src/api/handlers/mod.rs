//! Route handlers. Each handler authenticates (where required), calls into
//! [`crate::accounts::Services`] and maps domain errors through [`error::ApiError`].

pub mod auth_management;
pub mod authentication;
pub mod error;
pub mod health;
pub mod principal;
pub mod root;
pub mod secrets;
pub mod users;
