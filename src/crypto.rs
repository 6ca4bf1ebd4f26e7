//! Cryptographic operations for the tdata local storage
//!
//! Implements:
//! - PBKDF2-SHA512 local key derivation
//! - AES-256-IGE encryption/decryption of storage blocks
//! - SHA1/MD5 integrity values

use rand::RngCore;
use sha1::{Digest as Sha1Digest, Sha1};
use sha2::Sha512;

use crate::{Error, Result};

/// Size of the derived local encryption key, in bytes
pub const LOCAL_KEY_SIZE: usize = 256;

/// Size of the local encryption salt
pub const LOCAL_ENCRYPT_SALT_SIZE: usize = 32;

/// AES-256 key size
pub const AES_KEY_SIZE: usize = 32;

/// AES block size
pub const AES_BLOCK_SIZE: usize = 16;

/// PBKDF2 iteration count used by Telegram Desktop (with passcode)
const PBKDF2_ITERATIONS_WITH_PASSCODE: u32 = 100_000;

/// PBKDF2 iteration count used by Telegram Desktop (without passcode)
const PBKDF2_ITERATIONS_NO_PASSCODE: u32 = 1;

/// Local encryption key protecting a tdata container
///
/// Derived from the passcode and salt, or generated fresh when writing a new
/// container. Distinct from the 256-byte MTProto authorization key even
/// though the sizes coincide.
#[derive(Clone)]
pub struct LocalKey {
    data: [u8; LOCAL_KEY_SIZE],
}

impl LocalKey {
    /// Create a LocalKey from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != LOCAL_KEY_SIZE {
            return Err(Error::invalid_format(format!(
                "local key must be {} bytes, got {}",
                LOCAL_KEY_SIZE,
                bytes.len()
            )));
        }

        let mut data = [0u8; LOCAL_KEY_SIZE];
        data.copy_from_slice(bytes);
        Ok(Self { data })
    }

    /// Generate a fresh random local key for a new container
    pub fn generate() -> Self {
        let mut data = [0u8; LOCAL_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut data);
        Self { data }
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; LOCAL_KEY_SIZE] {
        &self.data
    }
}

impl std::fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose key material in debug output
        f.debug_struct("LocalKey")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Generate a fresh random salt for a new container
pub fn generate_salt() -> [u8; LOCAL_ENCRYPT_SALT_SIZE] {
    let mut salt = [0u8; LOCAL_ENCRYPT_SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive the local encryption key from salt and passcode using PBKDF2-SHA512
///
/// Algorithm from tdesktop:
/// 1. hash_key = SHA512(salt + passcode + salt)
/// 2. iterations = 1 if no passcode, else 100000
/// 3. key = PBKDF2-HMAC-SHA512(hash_key, salt, iterations)
pub fn create_local_key(salt: &[u8], passcode: &[u8]) -> LocalKey {
    let mut key_data = [0u8; LOCAL_KEY_SIZE];

    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(passcode);
    hasher.update(salt);
    let hash_key = hasher.finalize();

    let iterations = if passcode.is_empty() {
        PBKDF2_ITERATIONS_NO_PASSCODE
    } else {
        PBKDF2_ITERATIONS_WITH_PASSCODE
    };

    pbkdf2::pbkdf2_hmac::<Sha512>(&hash_key, salt, iterations, &mut key_data);

    LocalKey { data: key_data }
}

/// Decrypt a tdata storage block with the local key
///
/// Block layout:
/// - bytes[0..16]: msg_key = SHA1 of the decrypted payload, doubles as the
///   per-block IV material for the AES key schedule
/// - bytes[16..]: AES-256-IGE ciphertext
///
/// Decrypted payload layout:
/// - bytes[0..4]: full data length including this prefix (little endian)
/// - bytes[4..len]: actual data
/// - bytes[len..]: random padding up to the AES block boundary
pub fn decrypt_local(encrypted: &[u8], key: &LocalKey) -> Result<Vec<u8>> {
    if encrypted.len() <= AES_BLOCK_SIZE {
        return Err(Error::invalid_format("encrypted block too short"));
    }

    if encrypted.len() % AES_BLOCK_SIZE != 0 {
        return Err(Error::invalid_format(
            "encrypted block length must be a multiple of 16",
        ));
    }

    let msg_key = &encrypted[0..16];
    let ciphertext = &encrypted[16..];

    tracing::debug!(
        "decrypt_local: encrypted len={}, msg_key={:02x?}",
        encrypted.len(),
        msg_key
    );

    let (aes_key, aes_iv) = prepare_aes_oldmtp(key.as_bytes(), msg_key);
    let decrypted = grammers_crypto::aes::ige_decrypt(ciphertext, &aes_key, &aes_iv);

    // The embedded check value: SHA1(decrypted)[0..16] must equal msg_key.
    // A wrong passcode or corrupted salt decrypts "successfully" at the
    // cipher level and is only caught here.
    let check_hash = &sha1_hash(&decrypted)[0..16];

    tracing::debug!(
        "SHA1 check: expected={:02x?}, computed={:02x?}",
        msg_key,
        check_hash
    );

    if check_hash != msg_key {
        return Err(Error::IntegrityCheckFailed);
    }

    if decrypted.len() < 4 {
        return Err(Error::IntegrityCheckFailed);
    }

    let full_len =
        u32::from_le_bytes([decrypted[0], decrypted[1], decrypted[2], decrypted[3]]) as usize;

    // The length prefix counts itself; padding never reaches a full block
    if full_len > decrypted.len() || full_len + AES_BLOCK_SIZE <= decrypted.len() || full_len < 4 {
        return Err(Error::invalid_format(format!(
            "invalid decrypted length: {} of {} bytes",
            full_len,
            decrypted.len()
        )));
    }

    Ok(decrypted[4..full_len].to_vec())
}

/// Encrypt a tdata storage block with the local key, inverse of
/// [`decrypt_local`]
///
/// Prepends the little-endian length, pads to the AES block boundary with
/// random bytes, computes msg_key = SHA1(payload)[0..16] and encrypts with
/// the per-block key schedule.
pub fn encrypt_local(plain: &[u8], key: &LocalKey) -> Vec<u8> {
    let full_len = 4 + plain.len();
    let padding = (AES_BLOCK_SIZE - full_len % AES_BLOCK_SIZE) % AES_BLOCK_SIZE;

    let mut payload = Vec::with_capacity(full_len + padding);
    payload.extend_from_slice(&(full_len as u32).to_le_bytes());
    payload.extend_from_slice(plain);
    if padding > 0 {
        let mut pad = vec![0u8; padding];
        rand::thread_rng().fill_bytes(&mut pad);
        payload.extend_from_slice(&pad);
    }

    let sha = sha1_hash(&payload);
    let msg_key = &sha[0..16];

    let (aes_key, aes_iv) = prepare_aes_oldmtp(key.as_bytes(), msg_key);
    let ciphertext = grammers_crypto::aes::ige_encrypt(&payload, &aes_key, &aes_iv);

    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(msg_key);
    out.extend_from_slice(&ciphertext);
    out
}

/// Prepare the AES key and IV from the local key and message key
/// (old MTProto 1.0 style key schedule)
///
/// Matches tdesktop's prepareAES_oldmtp with send=false (x = 8), which the
/// local storage uses for both directions.
fn prepare_aes_oldmtp(
    local_key: &[u8],
    msg_key: &[u8],
) -> ([u8; AES_KEY_SIZE], [u8; AES_KEY_SIZE]) {
    let x: usize = 8;

    // sha1_a = SHA1(msgKey + key[x..x+32])
    let sha1_a = sha1_hash_2(msg_key, &local_key[x..x + 32]);

    // sha1_b = SHA1(key[32+x..48+x] + msgKey + key[48+x..64+x])
    let sha1_b = sha1_hash_3(
        &local_key[32 + x..48 + x],
        msg_key,
        &local_key[48 + x..64 + x],
    );

    // sha1_c = SHA1(key[64+x..96+x] + msgKey)
    let sha1_c = sha1_hash_2(&local_key[64 + x..96 + x], msg_key);

    // sha1_d = SHA1(msgKey + key[96+x..128+x])
    let sha1_d = sha1_hash_2(msg_key, &local_key[96 + x..128 + x]);

    let mut key = [0u8; AES_KEY_SIZE];
    let mut iv = [0u8; AES_KEY_SIZE];

    // aes_key = sha1_a[0..8] + sha1_b[8..20] + sha1_c[4..16]
    key[0..8].copy_from_slice(&sha1_a[0..8]);
    key[8..20].copy_from_slice(&sha1_b[8..20]);
    key[20..32].copy_from_slice(&sha1_c[4..16]);

    // aes_iv = sha1_a[8..20] + sha1_b[0..8] + sha1_c[16..20] + sha1_d[0..8]
    iv[0..12].copy_from_slice(&sha1_a[8..20]);
    iv[12..20].copy_from_slice(&sha1_b[0..8]);
    iv[20..24].copy_from_slice(&sha1_c[16..20]);
    iv[24..32].copy_from_slice(&sha1_d[0..8]);

    (key, iv)
}

/// Compute SHA-1
pub(crate) fn sha1_hash(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn sha1_hash_2(a: &[u8], b: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

fn sha1_hash_3(a: &[u8], b: &[u8], c: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(a);
    hasher.update(b);
    hasher.update(c);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_local_key_no_passcode() {
        let salt = [0u8; LOCAL_ENCRYPT_SALT_SIZE];
        let key = create_local_key(&salt, b"");
        assert_eq!(key.as_bytes().len(), LOCAL_KEY_SIZE);
    }

    #[test]
    fn create_local_key_deterministic() {
        let salt = [7u8; LOCAL_ENCRYPT_SALT_SIZE];
        let key = create_local_key(&salt, b"test");
        let key2 = create_local_key(&salt, b"test");
        assert_eq!(key.as_bytes(), key2.as_bytes());

        let other = create_local_key(&salt, b"other");
        assert_ne!(key.as_bytes(), other.as_bytes());
    }

    #[test]
    fn local_key_wrong_size() {
        let bytes = [0u8; 100];
        assert!(LocalKey::from_bytes(&bytes).is_err());
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = create_local_key(&[1u8; LOCAL_ENCRYPT_SALT_SIZE], b"");
        let plain = b"some serialized storage block".to_vec();

        let encrypted = encrypt_local(&plain, &key);
        assert_eq!(encrypted.len() % AES_BLOCK_SIZE, 0);

        let decrypted = decrypt_local(&encrypted, &key).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn encrypt_block_aligned_payload() {
        // 12 + 4 prefix bytes = exactly one AES block, no padding
        let key = create_local_key(&[2u8; LOCAL_ENCRYPT_SALT_SIZE], b"");
        let plain = vec![0x5A; 12];

        let encrypted = encrypt_local(&plain, &key);
        let decrypted = decrypt_local(&encrypted, &key).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn tampered_block_fails_integrity_check() {
        let key = create_local_key(&[3u8; LOCAL_ENCRYPT_SALT_SIZE], b"");
        let mut encrypted = encrypt_local(b"payload bytes", &key);

        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;

        assert!(matches!(
            decrypt_local(&encrypted, &key),
            Err(Error::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn wrong_key_fails_integrity_check() {
        let key = create_local_key(&[4u8; LOCAL_ENCRYPT_SALT_SIZE], b"right");
        let wrong = create_local_key(&[4u8; LOCAL_ENCRYPT_SALT_SIZE], b"wrong");
        let encrypted = encrypt_local(b"payload bytes", &key);

        assert!(matches!(
            decrypt_local(&encrypted, &wrong),
            Err(Error::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn sha1_known_vector() {
        // SHA1("hello") = aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d
        assert_eq!(
            hex::encode(sha1_hash(b"hello")),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }
}
