//! # auth-adapters
//!
//! Credential primitives behind the `domains` auth ports.

#[cfg(feature = "auth-jwt")]
pub mod jwt;
pub mod password;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtTokenService;
pub use password::{Argon2PasswordHasher, RandomConfirmHash};
