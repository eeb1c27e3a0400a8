pub mod access;
pub mod auth;
pub mod error;
pub mod posts;
pub mod slug;

pub use error::{ServiceError, ServiceResult};
