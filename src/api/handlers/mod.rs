//! Route handlers for the admin oracle service.

pub mod admin;
pub mod health;
pub mod types;

mod utils;

pub use admin::AdminState;
