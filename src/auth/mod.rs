//! Credentials: password hashing and bearer tokens.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtConfig};
pub use password::{PasswordPolicy, PasswordPolicyError, PasswordService};
