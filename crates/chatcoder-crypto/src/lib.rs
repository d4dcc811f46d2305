//! ChatCoder crypto helpers.
//!
//! - Password hashing with Argon2id (PHC strings, random salt per hash)
//! - Bearer tokens: HS256 JWTs carrying a username claim

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{TokenService, generate_secret};
