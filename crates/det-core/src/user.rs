//! User accounts and password hashing.
//!
//! Passwords are never stored as supplied: the store keeps an argon2 PHC
//! string and verifies candidates against it.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A stored account. The password hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:    i64,
  pub name:  String,
  pub email: String,
}

/// Input for [`crate::store::ResultStore::insert_user`].
#[derive(Clone)]
pub struct NewUser {
  pub name:     String,
  pub email:    String,
  /// Plain-text password; hashed by the store before it is written.
  pub password: String,
}

/// Produce a salted argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check `password` against a PHC string. An unparseable hash never matches.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_then_verify() {
    let phc = hash_password("hunter2").unwrap();
    assert!(phc.starts_with("$argon2"));
    assert!(verify_password("hunter2", &phc));
    assert!(!verify_password("hunter3", &phc));
  }

  #[test]
  fn garbage_hash_never_matches() {
    assert!(!verify_password("", "not a phc string"));
  }
}
