use std::collections::HashSet;

use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use argon2::{Algorithm, Argon2, Params, Version};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::CryptoError;

pub const KEY_SIZE: usize = 32;
pub const SALT_SIZE: usize = 16;

/// Upper bounds accepted from a ciphertext header, a small multiple of
/// the defaults. Anything above is refused before the KDF runs.
pub const MAX_MEMORY_KIB: u32 = 64 * 1024;
pub const MAX_ITERATIONS: u32 = 4;
pub const MAX_PARALLELISM: u32 = 4;

/// Distinct foreign (salt, params) pairs one password may make a cipher derive.
pub const MAX_FOREIGN_DERIVATIONS: usize = 16;

/// Derived keys kept per cipher before the cache is flushed.
const KEY_CACHE_CAPACITY: usize = 256;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// OWASP baseline for Argon2id: 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, CryptoError> {
        let params = Self {
            memory_kib,
            iterations,
            parallelism,
        };
        params.check()?;
        params.argon2_params()?;
        Ok(params)
    }

    /// Cheapest parameters argon2 accepts. Only suitable for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    pub(crate) fn check(&self) -> Result<(), CryptoError> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations > MAX_ITERATIONS
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(CryptoError::KdfParamsRejected);
        }
        Ok(())
    }

    fn argon2_params(&self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|_| CryptoError::KdfParamsRejected)
    }
}

pub type DerivedKey = Zeroizing<[u8; KEY_SIZE]>;

/// Derive a 256-bit key from a room password with Argon2id.
pub fn derive_key(
    password: &str,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> Result<DerivedKey, CryptoError> {
    params.check()?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.argon2_params()?);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Memoizes Argon2id output per (params, salt, password).
///
/// Entries are addressed by peppered SHA-256 digests so the cache never
/// holds the password itself. Derivations for salts other than our own are
/// budgeted per password: header costs come from whoever sent the
/// ciphertext, and the KDF runs before anything is authenticated.
pub(crate) struct KeyCache {
    pepper: [u8; SALT_SIZE],
    keys: DashMap<[u8; 32], DerivedKey>,
    foreign: DashMap<[u8; 32], HashSet<[u8; 32]>>,
}

impl Default for KeyCache {
    fn default() -> Self {
        Self {
            pepper: random_salt(),
            keys: DashMap::new(),
            foreign: DashMap::new(),
        }
    }
}

impl KeyCache {
    pub(crate) fn get_or_derive(
        &self,
        password: &str,
        salt: &[u8; SALT_SIZE],
        params: &KdfParams,
    ) -> Result<DerivedKey, CryptoError> {
        let slot = self.slot(password, salt, params);
        if let Some(key) = self.keys.get(&slot) {
            return Ok(key.value().clone());
        }
        self.derive_into(slot, password, salt, params)
    }

    /// Like [`KeyCache::get_or_derive`], for salts and params read from a
    /// peer's ciphertext. Fails once `password` has paid for
    /// `MAX_FOREIGN_DERIVATIONS` distinct pairs.
    pub(crate) fn get_or_derive_foreign(
        &self,
        password: &str,
        salt: &[u8; SALT_SIZE],
        params: &KdfParams,
    ) -> Result<DerivedKey, CryptoError> {
        let slot = self.slot(password, salt, params);
        if let Some(key) = self.keys.get(&slot) {
            return Ok(key.value().clone());
        }

        {
            let mut seen = self.foreign.entry(self.password_tag(password)).or_default();
            if !seen.contains(&slot) {
                if seen.len() >= MAX_FOREIGN_DERIVATIONS {
                    return Err(CryptoError::DerivationBudgetExhausted);
                }
                seen.insert(slot);
            }
        }

        self.derive_into(slot, password, salt, params)
    }

    fn derive_into(
        &self,
        slot: [u8; 32],
        password: &str,
        salt: &[u8; SALT_SIZE],
        params: &KdfParams,
    ) -> Result<DerivedKey, CryptoError> {
        let key = derive_key(password, salt, params)?;
        if self.keys.len() >= KEY_CACHE_CAPACITY {
            self.keys.clear();
        }
        self.keys.insert(slot, key.clone());
        Ok(key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    fn slot(&self, password: &str, salt: &[u8; SALT_SIZE], params: &KdfParams) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper);
        hasher.update(params.memory_kib.to_be_bytes());
        hasher.update(params.iterations.to_be_bytes());
        hasher.update(params.parallelism.to_be_bytes());
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }

    fn password_tag(&self, password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper);
        hasher.update(b"password");
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic_per_salt() {
        let params = KdfParams::minimal();
        let salt = random_salt();

        let k1 = derive_key("hunter2", &salt, &params).unwrap();
        let k2 = derive_key("hunter2", &salt, &params).unwrap();
        assert_eq!(*k1, *k2);

        let other = derive_key("hunter2", &random_salt(), &params).unwrap();
        assert_ne!(*k1, *other);

        let wrong = derive_key("hunter3", &salt, &params).unwrap();
        assert_ne!(*k1, *wrong);
    }

    #[test]
    fn oversized_params_are_rejected() {
        assert!(matches!(
            KdfParams::new(MAX_MEMORY_KIB + 1, 1, 1),
            Err(CryptoError::KdfParamsRejected)
        ));
        assert!(matches!(KdfParams::new(8, 0, 1), Err(CryptoError::KdfParamsRejected)));
        assert!(KdfParams::new(64, 2, 1).is_ok());
    }

    #[test]
    fn cache_reuses_derived_keys() {
        let cache = KeyCache::default();
        let params = KdfParams::minimal();
        let salt = random_salt();

        let k1 = cache.get_or_derive("pw", &salt, &params).unwrap();
        let k2 = cache.get_or_derive("pw", &salt, &params).unwrap();
        assert_eq!(*k1, *k2);
        assert_eq!(cache.len(), 1);

        cache.get_or_derive("other", &salt, &params).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn foreign_derivations_are_budgeted_per_password() {
        let cache = KeyCache::default();
        let params = KdfParams::minimal();
        let salts: Vec<_> = (0..=MAX_FOREIGN_DERIVATIONS).map(|_| random_salt()).collect();

        for salt in &salts[..MAX_FOREIGN_DERIVATIONS] {
            cache.get_or_derive_foreign("pw", salt, &params).unwrap();
        }
        assert!(matches!(
            cache.get_or_derive_foreign("pw", &salts[MAX_FOREIGN_DERIVATIONS], &params),
            Err(CryptoError::DerivationBudgetExhausted)
        ));

        // Already paid for, and other passwords have their own budget
        cache.get_or_derive_foreign("pw", &salts[0], &params).unwrap();
        cache
            .get_or_derive_foreign("other", &salts[MAX_FOREIGN_DERIVATIONS], &params)
            .unwrap();
        // Own-salt derivations are never budgeted
        cache.get_or_derive("pw", &salts[MAX_FOREIGN_DERIVATIONS], &params).unwrap();
    }
}
