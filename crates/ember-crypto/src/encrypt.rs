/// Password-based AES-256-GCM for room messages and validation tokens.
///
/// Wire format (standard base64 of):
///
/// ```text
/// [0]       version (0x01)
/// [1..5]    Argon2id memory cost in KiB (u32 BE)
/// [5..9]    Argon2id passes (u32 BE)
/// [9..13]   Argon2id lanes (u32 BE)
/// [13..29]  salt (16 bytes)
/// [29..41]  nonce (12 bytes)
/// [41..]    ciphertext + GCM tag (16 bytes)
/// ```
///
/// Bytes `[0..29]` are authenticated as associated data, so a tampered
/// header fails exactly like a wrong password.
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload, rand_core::RngCore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::CryptoError;
use crate::keys::{KdfParams, KeyCache, SALT_SIZE, random_salt};

pub const VERSION: u8 = 0x01;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const HEADER_SIZE: usize = 1 + 4 + 4 + 4 + SALT_SIZE;

/// Encrypts and decrypts text under a room password.
///
/// One cipher draws a single salt for everything it encrypts, so a
/// session pays for one key derivation per password. Decryption honours
/// whatever salt and parameters the sender used, for a bounded number of
/// distinct senders per password.
pub struct RoomCipher {
    params: KdfParams,
    session_salt: [u8; SALT_SIZE],
    keys: KeyCache,
}

impl RoomCipher {
    pub fn new(params: KdfParams) -> Self {
        Self {
            params,
            session_salt: random_salt(),
            keys: KeyCache::default(),
        }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    pub fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CryptoError> {
        let header = encode_header(&self.params, &self.session_salt);
        let key = self
            .keys
            .get_or_derive(password, &self.session_salt, &self.params)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &header,
                },
            )
            .map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str, password: &str) -> Result<String, CryptoError> {
        let raw = BASE64.decode(encoded.trim())?;
        if raw.len() < HEADER_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::TooShort);
        }

        let (header, rest) = raw.split_at(HEADER_SIZE);
        let (params, salt) = decode_header(header)?;
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        // Foreign salts cost a derivation each and are budgeted
        let key = if salt == self.session_salt && params == self.params {
            self.keys.get_or_derive(password, &salt, &params)?
        } else {
            self.keys.get_or_derive_foreign(password, &salt, &params)?
        };
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

fn encode_header(params: &KdfParams, salt: &[u8; SALT_SIZE]) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = VERSION;
    header[1..5].copy_from_slice(&params.memory_kib.to_be_bytes());
    header[5..9].copy_from_slice(&params.iterations.to_be_bytes());
    header[9..13].copy_from_slice(&params.parallelism.to_be_bytes());
    header[13..].copy_from_slice(salt);
    header
}

fn decode_header(header: &[u8]) -> Result<(KdfParams, [u8; SALT_SIZE]), CryptoError> {
    if header[0] != VERSION {
        return Err(CryptoError::UnsupportedVersion(header[0]));
    }

    let read_u32 = |at: usize| u32::from_be_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]);
    let params = KdfParams {
        memory_kib: read_u32(1),
        iterations: read_u32(5),
        parallelism: read_u32(9),
    };
    params.check()?;

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&header[13..HEADER_SIZE]);
    Ok((params, salt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::keys::{MAX_FOREIGN_DERIVATIONS, MAX_ITERATIONS, MAX_MEMORY_KIB, MAX_PARALLELISM};

    fn cipher() -> RoomCipher {
        RoomCipher::new(KdfParams::minimal())
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let message = "Hello from ember! 🔥";

        let ciphertext = cipher.encrypt(message, "hunter2").unwrap();
        assert!(!ciphertext.contains(message));

        let decrypted = cipher.decrypt(&ciphertext, "hunter2").unwrap();
        assert_eq!(decrypted, message);
    }

    #[test]
    fn another_client_can_decrypt() {
        let alice = cipher();
        let bob = RoomCipher::new(KdfParams::default());

        let ciphertext = alice.encrypt("hi bob", "shared").unwrap();
        assert_eq!(bob.decrypt(&ciphertext, "shared").unwrap(), "hi bob");
    }

    #[test]
    fn wrong_password_fails() {
        let cipher = cipher();
        let ciphertext = cipher.encrypt("Secret message", "correct").unwrap();
        assert!(matches!(
            cipher.decrypt(&ciphertext, "wrong"),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn repeated_encryption_is_randomized() {
        let cipher = cipher();
        let c1 = cipher.encrypt("same", "pw").unwrap();
        let c2 = cipher.encrypt("same", "pw").unwrap();
        assert_ne!(c1, c2);
        assert_eq!(cipher.decrypt(&c1, "pw").unwrap(), cipher.decrypt(&c2, "pw").unwrap());
    }

    #[test]
    fn tampered_header_fails() {
        let cipher = cipher();
        let mut raw = BASE64.decode(cipher.encrypt("data", "pw").unwrap()).unwrap();
        // Flip a salt byte: the key changes and the AAD no longer matches
        raw[20] ^= 0xFF;
        assert!(cipher.decrypt(&BASE64.encode(&raw), "pw").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = cipher();
        let mut raw = BASE64.decode(cipher.encrypt("sensitive data", "pw").unwrap()).unwrap();
        let mid = HEADER_SIZE + NONCE_SIZE + 3;
        raw[mid] ^= 0xFF;
        assert!(matches!(
            cipher.decrypt(&BASE64.encode(&raw), "pw"),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn malformed_inputs_are_errors_not_panics() {
        let cipher = cipher();
        assert!(matches!(cipher.decrypt("not base64!!", "pw"), Err(CryptoError::Encoding(_))));
        assert!(matches!(cipher.decrypt("", "pw"), Err(CryptoError::TooShort)));
        assert!(matches!(
            cipher.decrypt(&BASE64.encode([0u8; 10]), "pw"),
            Err(CryptoError::TooShort)
        ));

        let mut raw = BASE64.decode(cipher.encrypt("x", "pw").unwrap()).unwrap();
        raw[0] = 0x7F;
        assert!(matches!(
            cipher.decrypt(&BASE64.encode(&raw), "pw"),
            Err(CryptoError::UnsupportedVersion(0x7F))
        ));
    }

    #[test]
    fn hostile_kdf_params_are_refused() {
        let cipher = cipher();
        let mut raw = BASE64.decode(cipher.encrypt("x", "pw").unwrap()).unwrap();
        raw[1..5].copy_from_slice(&(MAX_MEMORY_KIB + 1).to_be_bytes());
        assert!(matches!(
            cipher.decrypt(&BASE64.encode(&raw), "pw"),
            Err(CryptoError::KdfParamsRejected)
        ));
    }

    #[test]
    fn costly_headers_fail_fast() {
        let cipher = cipher();
        let hostile = |params: &KdfParams| {
            let mut raw = encode_header(params, &random_salt()).to_vec();
            raw.extend_from_slice(&[0u8; NONCE_SIZE + TAG_SIZE + 8]);
            BASE64.encode(raw)
        };

        let started = Instant::now();
        for params in [
            KdfParams { memory_kib: 256 * 1024, iterations: 16, parallelism: 8 },
            KdfParams { memory_kib: MAX_MEMORY_KIB, iterations: MAX_ITERATIONS + 1, parallelism: 1 },
            KdfParams { memory_kib: MAX_MEMORY_KIB, iterations: 1, parallelism: MAX_PARALLELISM + 1 },
        ] {
            assert!(matches!(
                cipher.decrypt(&hostile(&params), "pw"),
                Err(CryptoError::KdfParamsRejected)
            ));
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn foreign_salt_flood_is_bounded() {
        let cipher = cipher();
        let own = cipher.encrypt("mine", "pw").unwrap();
        let peers: Vec<_> = (0..MAX_FOREIGN_DERIVATIONS)
            .map(|_| RoomCipher::new(KdfParams::minimal()))
            .collect();
        let honest: Vec<_> = peers.iter().map(|p| p.encrypt("hi", "pw").unwrap()).collect();
        for ciphertext in &honest {
            assert_eq!(cipher.decrypt(ciphertext, "pw").unwrap(), "hi");
        }

        // Every further fresh salt is refused without running the KDF
        let started = Instant::now();
        for _ in 0..64 {
            let flood = RoomCipher::new(KdfParams::minimal()).encrypt("spam", "pw").unwrap();
            assert!(matches!(
                cipher.decrypt(&flood, "pw"),
                Err(CryptoError::DerivationBudgetExhausted)
            ));
        }
        assert!(started.elapsed() < Duration::from_secs(5));

        // Keys already paid for and our own salt keep working
        assert_eq!(cipher.decrypt(&honest[0], "pw").unwrap(), "hi");
        assert_eq!(cipher.decrypt(&own, "pw").unwrap(), "mine");
    }

    #[test]
    fn empty_plaintext() {
        let cipher = cipher();
        let ciphertext = cipher.encrypt("", "pw").unwrap();
        let raw = BASE64.decode(&ciphertext).unwrap();
        assert_eq!(raw.len(), HEADER_SIZE + NONCE_SIZE + TAG_SIZE);
        assert_eq!(cipher.decrypt(&ciphertext, "pw").unwrap(), "");
    }
}
