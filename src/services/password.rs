use pbkdf2::{
    Params, Pbkdf2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::{Rng, RngCore, distributions::Alphanumeric, rngs::OsRng};
use tracing::{error, instrument, warn};

use crate::errors::AppError;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TEMP_PASSWORD_LEN: usize = 12;

/// Salted PBKDF2-SHA256 hashing in PHC string format.
#[derive(Debug, Clone)]
pub struct PasswordService {
    rounds: u32,
}

impl PasswordService {
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }

    #[instrument(skip_all)]
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Internal(format!("Failed to encode salt: {e}")))?;

        let params = Params {
            rounds: self.rounds,
            output_length: HASH_LEN,
        };
        let hash = Pbkdf2
            .hash_password_customized(password.as_bytes(), None, None, params, &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing error: {e}")))?;

        Ok(hash.to_string())
    }

    /// False on mismatch and on hashes that cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }

    /// `hash` on the blocking pool, keeping PBKDF2 off the async workers.
    pub async fn hash_blocking(&self, password: &str) -> Result<String, AppError> {
        let service = self.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || service.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))?
    }

    /// `verify` on the blocking pool. A failed task counts as a mismatch.
    pub async fn verify_blocking(&self, password: &str, hash: &str) -> bool {
        let service = self.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        match tokio::task::spawn_blocking(move || service.verify(&password, &hash)).await {
            Ok(valid) => valid,
            Err(e) => {
                error!("Password verification task failed: {}", e);
                false
            }
        }
    }

    pub fn generate_temp_password(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMP_PASSWORD_LEN)
            .map(char::from)
            .collect()
    }
}

/// Opaque random token used for sessions and password resets.
pub fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let service = PasswordService::new(1_000);
        let hash = service.hash("correct horse").unwrap();

        assert!(hash.starts_with("$pbkdf2-sha256$i=1000"));
        assert!(service.verify("correct horse", &hash));
        assert!(!service.verify("wrong horse", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let service = PasswordService::new(1_000);
        assert_ne!(service.hash("secret").unwrap(), service.hash("secret").unwrap());
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        let service = PasswordService::new(1_000);
        assert!(!service.verify("secret", "not-a-phc-string"));
        assert!(!service.verify("secret", ""));
    }

    #[tokio::test]
    async fn test_blocking_pool_variants_agree_with_sync_ones() {
        let service = PasswordService::new(1_000);
        let hash = service.hash_blocking("correct horse").await.unwrap();

        assert!(service.verify("correct horse", &hash));
        assert!(service.verify_blocking("correct horse", &hash).await);
        assert!(!service.verify_blocking("wrong horse", &hash).await);
        assert!(!service.verify_blocking("correct horse", "garbage").await);
    }

    #[test]
    fn test_temp_password_shape() {
        let service = PasswordService::new(1_000);
        let password = service.generate_temp_password();
        assert_eq!(password.len(), 12);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, service.generate_temp_password());
    }

    #[test]
    fn test_tokens_are_unique_uuids() {
        let token = new_token();
        assert!(uuid::Uuid::parse_str(&token).is_ok());
        assert_ne!(token, new_token());
    }
}
