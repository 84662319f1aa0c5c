//! Password hashing with Argon2id.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use rand::rngs::OsRng;

use crate::error::{Error, Result, ValidationError};

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    pub fn complex(min_length: usize) -> Self {
        Self {
            min_length,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }

    pub fn validate(&self, password: &str) -> std::result::Result<(), PasswordPolicyError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PasswordPolicyError::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }
        if self.require_special && password.chars().all(char::is_alphanumeric) {
            return Err(PasswordPolicyError::MissingSpecial);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min_length} characters")]
    TooShort { min_length: usize },
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

impl From<PasswordPolicyError> for Error {
    fn from(err: PasswordPolicyError) -> Self {
        Error::Validation(ValidationError::Password(err.to_string()))
    }
}

pub struct PasswordService;

impl PasswordService {
    /// Hashes with Argon2id using `2^memory_cost_log2` KiB of memory.
    /// 12 is enough for development; production deployments should use 16
    /// or more.
    pub fn hash_password(password: &str, memory_cost_log2: u32) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let m_cost = 1u32 << memory_cost_log2.clamp(3, 22);

        let params = Params::new(m_cost, 3, 1, None).map_err(|e| Error::Password(e.to_string()))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Password(e.to_string()))
    }

    /// A malformed stored hash is an error; a wrong password is `Ok(false)`.
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(password_hash).map_err(|e| Error::Password(e.to_string()))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Password(e.to_string())),
        }
    }
}
