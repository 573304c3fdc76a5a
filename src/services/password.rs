//! Password hashing (Argon2id, random salt per hash) and password rules

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password into a PHC string (`$argon2id$...`)
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

/// Minimum length, and not only whitespace
pub fn check_password_rules(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.trim().is_empty() {
        return Err("Password cannot be blank".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_and_salted() {
        let h1 = hash_password("same_password").unwrap();
        let h2 = hash_password("same_password").unwrap();
        assert!(h1.starts_with("$argon2id$"));
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password_rules("short").is_err());
        assert!(check_password_rules("        ").is_err());
        assert!(check_password_rules("long enough").is_ok());
        // counted in characters, not bytes
        assert!(check_password_rules("пароль12").is_ok());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            #[test]
            fn hash_then_verify_accepts_only_original(
                password in "[a-zA-Z0-9!@#]{1,32}",
                other in "[a-zA-Z0-9!@#]{1,32}"
            ) {
                let hash = hash_password(&password).unwrap();
                prop_assert!(verify_password(&password, &hash).unwrap());
                if other != password {
                    prop_assert!(!verify_password(&other, &hash).unwrap());
                }
            }
        }
    }
}
