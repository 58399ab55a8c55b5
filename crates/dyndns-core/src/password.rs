//! Salted PBKDF2-HMAC-SHA256 password hashes
//!
//! Format: `pbkdf2:sha256:<iterations>$<salt>$<hex digest>`. The salt is used
//! as its UTF-8 bytes and the digest is 32 bytes, so hashes produced by the
//! common `generate_password_hash(..., method="pbkdf2:sha256")` tooling verify
//! unchanged. The iteration count may be omitted (legacy form).

use pbkdf2::pbkdf2_hmac;
use rand::{Rng, distr::Alphanumeric};
use sha2::Sha256;
use std::str::FromStr;

pub const DEFAULT_ITERATIONS: u32 = 600_000;
const LEGACY_ITERATIONS: u32 = 260_000;
pub const SALT_LEN: usize = 8;
const DIGEST_LEN: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    iterations: u32,
    salt: String,
    digest_hex: String,
}

// never print the digest
impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl PasswordHash {
    /// Hash `password` with a fresh random salt.
    pub fn generate(password: &str, iterations: u32) -> Self {
        let salt: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LEN)
            .map(char::from)
            .collect();
        let digest_hex = derive_hex(password, &salt, iterations);
        Self {
            iterations,
            salt,
            digest_hex,
        }
    }

    /// CPU-bound; callers on an async runtime should use `spawn_blocking`.
    pub fn verify(&self, password: &str) -> bool {
        let candidate = derive_hex(password, &self.salt, self.iterations);
        constant_time_eq(candidate.as_bytes(), self.digest_hex.as_bytes())
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl std::fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pbkdf2:sha256:{}${}${}",
            self.iterations, self.salt, self.digest_hex
        )
    }
}

impl FromStr for PasswordHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '$');
        let (Some(method), Some(salt), Some(digest)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err("expected `method$salt$digest`".into());
        };

        let mut m = method.split(':');
        match (m.next(), m.next()) {
            (Some("pbkdf2"), Some("sha256")) => {}
            _ => return Err("unsupported hash method, expected pbkdf2:sha256".into()),
        }
        let iterations = match m.next() {
            None | Some("") => LEGACY_ITERATIONS,
            Some(n) => n
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("bad iteration count `{n}`"))?,
        };
        if m.next().is_some() {
            return Err("unsupported hash method, expected pbkdf2:sha256".into());
        }

        if salt.is_empty() {
            return Err("empty salt".into());
        }
        if digest.len() != DIGEST_LEN * 2 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err("digest must be 64 hex characters".into());
        }

        Ok(Self {
            iterations,
            salt: salt.to_owned(),
            digest_hex: digest.to_ascii_lowercase(),
        })
    }
}

fn derive_hex(password: &str, salt: &str, iterations: u32) -> String {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    hex::encode(out)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
