use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use password_hash::{PasswordHash, SaltString};

/// Argon2id memory cost in KiB.
pub const MEMORY_KIB: u32 = 19 * 1024;
/// Argon2id passes over memory.
pub const ITERATIONS: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("hashing engine failed: {0}")]
    Engine(String),
}

/// Salted, adaptive one-way password hashing (Argon2id, PHC string output).
///
/// The work factor is fixed per instance. `verify` reads the parameters embedded in
/// the stored digest, so digests produced under older parameters still verify.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        // Constants above are within argon2's accepted ranges
        Self::with_cost(MEMORY_KIB, ITERATIONS).unwrap_or_else(|_| Self { argon2: Argon2::default() })
    }
}

impl PasswordHasher {
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, 1, None).map_err(|e| HashError::Engine(e.to_string()))?;
        Ok(Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| HashError::Entropy(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError::Engine(e.to_string()))?;
        let phc = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError::Engine(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    /// True iff `plaintext` produced `digest`. Unparsable digests never verify.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self.argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}
