//! Telegram Desktop local-storage codec
//!
//! Tdata is a directory of `TDF$`-framed files. The `key_data` file carries
//! the per-installation salt, the passcode-encrypted local key, and the
//! encrypted account index list. Each account then has an MTP-authorization
//! file (named after `MD5` of the data name) holding the user id, the
//! current data center, and one auth key per data center the client talked
//! to.
//!
//! The encode path is best-effort by nature: the layout is a private,
//! versioned detail of one client, so only the fields documented here are
//! written and the rest is left for the client to regenerate on launch.

use std::fs;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::crypto::{create_local_key, decrypt_local, encrypt_local, generate_salt, LocalKey};
use crate::session::{AuthKey, AuthorizationSession};
use crate::wire::{QtReader, QtWriter};
use crate::{Error, Result, AUTH_KEY_SIZE, DEFAULT_KEY_FILE, MAX_ACCOUNTS};

/// Magic bytes at the start of tdata files
const TDATA_MAGIC: [u8; 4] = [0x54, 0x44, 0x46, 0x24]; // "TDF$"

/// dbiMtpAuthorization block id
const BLOCK_MTP_AUTHORIZATION: i32 = 0x4B;

/// Two -1 i32s in place of the legacy user id announce 64-bit ids
const WIDE_IDS_TAG: i64 = !0i64;

/// Container version written on encode (app version 4.8.3)
const TDATA_VERSION: u32 = 4_008_003;

/// Framed tdata file: version plus checked payload
#[derive(Debug)]
struct FileDescriptor {
    version: u32,
    data: Vec<u8>,
}

/// Read a tdata file, trying the backup ("s"-suffixed) name as fallback
fn read_tdf_file(name: &str, base_path: &Path) -> Result<FileDescriptor> {
    let path = base_path.join(name);
    let path_s = base_path.join(format!("{name}s"));

    tracing::debug!("trying to read tdata file: {:?}", path);

    // Use is_file() to skip directories
    let file_data = if path.is_file() {
        fs::read(&path)?
    } else if path_s.is_file() {
        tracing::debug!("falling back to backup file: {:?}", path_s);
        fs::read(&path_s)?
    } else {
        return Err(Error::FileNotFound {
            file: name.to_string(),
            folder: base_path.to_path_buf(),
        });
    };

    parse_file_descriptor(&file_data)
}

/// Parse a file descriptor from raw bytes
///
/// File format:
/// - bytes[0..4]: magic "TDF$"
/// - bytes[4..8]: version (little endian)
/// - bytes[8..len-16]: data payload
/// - bytes[len-16..len]: MD5 of (data + dataSize + version + magic)
fn parse_file_descriptor(data: &[u8]) -> Result<FileDescriptor> {
    if data.len() < 8 + 16 {
        return Err(Error::invalid_format("tdata file too short"));
    }

    if data[0..4] != TDATA_MAGIC {
        return Err(Error::invalid_format("invalid tdata file magic"));
    }

    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    let data_size = data.len() - 8 - 16;
    let payload = &data[8..8 + data_size];
    let file_md5 = &data[data.len() - 16..];

    let computed_md5 = descriptor_md5(payload, version);

    tracing::debug!(
        "MD5 check: file={:02x?}, computed={:02x?}",
        file_md5,
        computed_md5
    );

    if file_md5 != computed_md5.as_slice() {
        return Err(Error::IntegrityCheckFailed);
    }

    Ok(FileDescriptor {
        version,
        data: payload.to_vec(),
    })
}

/// Frame a payload into the TDF$ file format, inverse of
/// [`parse_file_descriptor`]
fn build_file_descriptor(version: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len() + 16);
    out.extend_from_slice(&TDATA_MAGIC);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&descriptor_md5(payload, version));
    out
}

fn descriptor_md5(payload: &[u8], version: u32) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(payload);
    hasher.update((payload.len() as u32).to_le_bytes());
    hasher.update(version.to_le_bytes());
    hasher.update(TDATA_MAGIC);
    hasher.finalize().into()
}

fn write_tdf_file(path: &Path, version: u32, payload: &[u8]) -> Result<()> {
    fs::write(path, build_file_descriptor(version, payload))?;
    Ok(())
}

/// Contents of the key_data file
#[derive(Debug)]
struct KeyData {
    salt: Vec<u8>,
    key_encrypted: Vec<u8>,
    info_encrypted: Vec<u8>,
    version: u32,
}

fn read_key_data(base_path: &Path, key_file: &str) -> Result<KeyData> {
    let name = format!("key_{key_file}");
    let file = read_tdf_file(&name, base_path)?;

    let mut stream = QtReader::new(&file.data);
    let salt = stream.read_prefixed_bytes()?;
    let key_encrypted = stream.read_prefixed_bytes()?;
    let info_encrypted = stream.read_prefixed_bytes()?;

    Ok(KeyData {
        salt,
        key_encrypted,
        info_encrypted,
        version: file.version,
    })
}

/// Decrypted key info: the local key plus the stored account indices
#[derive(Debug)]
struct KeyInfo {
    local_key: LocalKey,
    account_indices: Vec<i32>,
}

fn decrypt_key_data(key_data: &KeyData, passcode: &[u8]) -> Result<KeyInfo> {
    let passcode_key = create_local_key(&key_data.salt, passcode);

    let decrypted_key = decrypt_local(&key_data.key_encrypted, &passcode_key)?;
    if decrypted_key.len() < 256 {
        return Err(Error::invalid_format(format!(
            "decrypted local key too short: {} bytes",
            decrypted_key.len()
        )));
    }
    let local_key = LocalKey::from_bytes(&decrypted_key[..256])?;

    let decrypted_info = decrypt_local(&key_data.info_encrypted, &local_key)?;
    let mut info_stream = QtReader::new(&decrypted_info);

    let count = info_stream.read_i32()?;
    if count <= 0 || count > MAX_ACCOUNTS as i32 {
        return Err(Error::invalid_format(format!(
            "invalid account count: {count}"
        )));
    }

    let mut account_indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = info_stream.read_i32()?;
        if index >= 0 && index < MAX_ACCOUNTS as i32 {
            account_indices.push(index);
        }
    }

    Ok(KeyInfo {
        local_key,
        account_indices,
    })
}

/// Compose the data name: "data" for index 0, "data#2" for index 1, etc.
fn compose_data_string(key_file: &str, index: i32) -> String {
    let base = key_file.replace('#', "");
    if index > 0 {
        format!("{}#{}", base, index + 1)
    } else {
        base
    }
}

/// Data name key = lower 64 bits of MD5(data name)
fn compute_data_name_key(data_name: &str) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(data_name.as_bytes());
    let result: [u8; 16] = hasher.finalize().into();

    u64::from_le_bytes([
        result[0], result[1], result[2], result[3], result[4], result[5], result[6], result[7],
    ])
}

/// Convert a file key to the 16-character hex file name, low nibble first
fn to_file_part(val: u64) -> String {
    let mut result = String::with_capacity(16);
    let mut v = val;

    for _ in 0..16 {
        let nibble = (v & 0x0F) as u8;
        let c = if nibble < 0x0A {
            (b'0' + nibble) as char
        } else {
            (b'A' + (nibble - 0x0A)) as char
        };
        result.push(c);
        v >>= 4;
    }

    result
}

/// One decrypted MTP-authorization block
#[derive(Debug)]
struct MtpAuthorization {
    main_dc_id: i32,
    user_id: i64,
    /// (dc_id, auth_key) pairs, one per data center the client held a key for
    keys: Vec<(i32, [u8; AUTH_KEY_SIZE])>,
}

impl MtpAuthorization {
    /// Select the entry for the marked-current data center, or the sole
    /// entry when nothing is marked
    fn select_current(&self) -> Result<(i32, [u8; AUTH_KEY_SIZE])> {
        if self.main_dc_id > 0 {
            return self
                .keys
                .iter()
                .find(|(dc, _)| *dc == self.main_dc_id)
                .copied()
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "no auth key found for main dc {}",
                        self.main_dc_id
                    ))
                });
        }
        match self.keys.as_slice() {
            [single] => Ok(*single),
            [] => Err(Error::malformed("authorization block holds no dc keys")),
            _ => Err(Error::AmbiguousDataCenter),
        }
    }
}

/// Read and decrypt the MTP data file for one account
fn read_mtp_data(
    base_path: &Path,
    index: i32,
    local_key: &LocalKey,
    key_file: &str,
) -> Result<MtpAuthorization> {
    let data_name = compose_data_string(key_file, index);
    let file_name = to_file_part(compute_data_name_key(&data_name));

    tracing::debug!("looking for MTP data in file: {}", file_name);

    let file = read_tdf_file(&file_name, base_path)?;

    let mut stream = QtReader::new(&file.data);
    let encrypted = stream.read_prefixed_bytes()?;

    let decrypted = decrypt_local(&encrypted, local_key)?;
    parse_mtp_authorization(&decrypted)
}

/// Parse an MTP authorization block from decrypted bytes
///
/// Layout:
/// - i32: block id (must be 0x4B, dbiMtpAuthorization)
/// - byte array: serialized authorization:
///   - i32 userId, i32 mainDcId (legacy), or the wide-ids tag followed by
///     i64 userId, i32 mainDcId
///   - i32 keysCount, then per key: i32 dcId + 256 raw key bytes
///   - i32 keysToDestroyCount, ...
fn parse_mtp_authorization(data: &[u8]) -> Result<MtpAuthorization> {
    let mut stream = QtReader::new(data);

    let block_id = stream.read_i32()?;
    if block_id != BLOCK_MTP_AUTHORIZATION {
        return Err(Error::invalid_format(format!(
            "expected MtpAuthorization block (0x4B), got 0x{block_id:02X}"
        )));
    }

    let serialized = stream.read_prefixed_bytes()?;
    let mut auth_stream = QtReader::new(&serialized);

    let first_int = auth_stream.read_i32()?;
    let second_int = auth_stream.read_i32()?;

    let combined = ((first_int as i64) << 32) | (second_int as u32 as i64);
    let (user_id, main_dc_id) = if combined == WIDE_IDS_TAG {
        let uid = auth_stream.read_i64()?;
        let dc = auth_stream.read_i32()?;
        (uid, dc)
    } else {
        (first_int as i64, second_int)
    };

    tracing::debug!("MTP auth: user_id={}, main_dc_id={}", user_id, main_dc_id);

    let keys_count = auth_stream.read_i32()?;
    if keys_count < 0 || keys_count > 10 {
        return Err(Error::invalid_format(format!(
            "invalid keys count: {keys_count}"
        )));
    }

    let mut keys = Vec::with_capacity(keys_count as usize);
    for _ in 0..keys_count {
        let dc_id = auth_stream.read_i32()?;
        let key_bytes = auth_stream.read_bytes(AUTH_KEY_SIZE)?;

        tracing::debug!("found key for dc {}", dc_id);

        let mut key = [0u8; AUTH_KEY_SIZE];
        key.copy_from_slice(&key_bytes);
        keys.push((dc_id, key));
    }

    Ok(MtpAuthorization {
        main_dc_id,
        user_id,
        keys,
    })
}

/// Serialize an MTP authorization block for the session, inverse of
/// [`parse_mtp_authorization`]
fn build_mtp_authorization(session: &AuthorizationSession, user_id: i64) -> Vec<u8> {
    let mut serialized = QtWriter::new();
    // Wide-ids tag, then the 64-bit user id
    serialized.write_i32(-1);
    serialized.write_i32(-1);
    serialized.write_i64(user_id);
    serialized.write_i32(session.dc_id);
    serialized.write_i32(1); // keys count
    serialized.write_i32(session.dc_id);
    serialized.write_bytes(session.auth_key.as_bytes());
    serialized.write_i32(0); // keys to destroy

    let mut block = QtWriter::new();
    block.write_i32(BLOCK_MTP_AUTHORIZATION);
    block.write_prefixed_bytes(&serialized.into_bytes());
    block.into_bytes()
}

/// Decode the main account of a tdata directory into the canonical model
///
/// `passcode` is the Local Passcode when one is set; `None` derives the key
/// from the empty passcode, the common case.
pub fn decode(tdata_dir: &Path, passcode: Option<&str>) -> Result<AuthorizationSession> {
    decode_accounts(tdata_dir, passcode)?
        .into_iter()
        .next()
        .ok_or(Error::NoAccounts)
}

/// Decode every account stored in a tdata directory
///
/// Telegram Desktop holds up to three accounts; the first listed one is the
/// main account.
pub fn decode_accounts(
    tdata_dir: &Path,
    passcode: Option<&str>,
) -> Result<Vec<AuthorizationSession>> {
    let base_path = expand_path(tdata_dir);
    if !base_path.exists() {
        return Err(Error::FolderNotFound { path: base_path });
    }

    let passcode = passcode.unwrap_or("");
    let key_data = read_key_data(&base_path, DEFAULT_KEY_FILE)?;
    let KeyInfo {
        local_key,
        account_indices,
    } = decrypt_key_data(&key_data, passcode.as_bytes())?;

    tracing::info!(
        "loaded key data: {} accounts listed, app version {}",
        account_indices.len(),
        key_data.version
    );

    let mut sessions = Vec::new();
    for index in account_indices {
        match load_account(&base_path, index, &local_key) {
            Ok(session) => {
                tracing::info!(
                    "loaded account {}: dc_id={}, user_id={:?}",
                    index,
                    session.dc_id,
                    session.user_id
                );
                sessions.push(session);
            }
            // Wrong-passcode failures surface from decrypt_key_data above;
            // an undecryptable single account must not mask the others
            Err(Error::IntegrityCheckFailed) => return Err(Error::IntegrityCheckFailed),
            Err(e) => {
                tracing::warn!("failed to load account {}: {}", index, e);
            }
        }
    }

    if sessions.is_empty() {
        return Err(Error::NoAccounts);
    }
    Ok(sessions)
}

fn load_account(base_path: &Path, index: i32, local_key: &LocalKey) -> Result<AuthorizationSession> {
    let mtp = read_mtp_data(base_path, index, local_key, DEFAULT_KEY_FILE)?;
    let (dc_id, key) = mtp.select_current()?;

    let mut session = AuthorizationSession::new(dc_id, AuthKey::from(key));
    session.user_id = Some(mtp.user_id).filter(|id| *id != 0);
    session.validate()?;
    Ok(session)
}

/// Encode the canonical model into a minimal tdata directory
///
/// Generates a fresh salt and local key, writes a single-account key file
/// and one MTP-authorization block holding exactly the session's dc entry.
/// Success means the container is internally consistent; acceptance by a
/// particular Telegram Desktop build is best-effort.
pub fn encode(
    session: &AuthorizationSession,
    tdata_dir: &Path,
    passcode: Option<&str>,
) -> Result<()> {
    session.validate()?;
    let user_id = session.user_id.ok_or_else(|| {
        Error::malformed("user_id is required to encode a tdata container")
    })?;

    fs::create_dir_all(tdata_dir)?;

    let passcode = passcode.unwrap_or("");
    let salt = generate_salt();
    let passcode_key = create_local_key(&salt, passcode.as_bytes());
    let local_key = LocalKey::generate();

    // key_data: salt, passcode-encrypted local key, encrypted account list
    let key_encrypted = encrypt_local(local_key.as_bytes(), &passcode_key);

    let mut info = QtWriter::new();
    info.write_i32(1); // account count
    info.write_i32(0); // main account index
    let info_encrypted = encrypt_local(&info.into_bytes(), &local_key);

    let mut key_payload = QtWriter::new();
    key_payload.write_prefixed_bytes(&salt);
    key_payload.write_prefixed_bytes(&key_encrypted);
    key_payload.write_prefixed_bytes(&info_encrypted);
    write_tdf_file(
        &tdata_dir.join(format!("key_{DEFAULT_KEY_FILE}")),
        TDATA_VERSION,
        &key_payload.into_bytes(),
    )?;

    // Account 0: the MTP authorization block, encrypted with the local key
    let block = build_mtp_authorization(session, user_id);
    let encrypted_block = encrypt_local(&block, &local_key);

    let mut account_payload = QtWriter::new();
    account_payload.write_prefixed_bytes(&encrypted_block);

    let data_name = compose_data_string(DEFAULT_KEY_FILE, 0);
    let file_name = to_file_part(compute_data_name_key(&data_name));
    write_tdf_file(
        &tdata_dir.join(file_name),
        TDATA_VERSION,
        &account_payload.into_bytes(),
    )?;

    tracing::info!("wrote tdata container: dc_id={}, user_id={}", session.dc_id, user_id);
    Ok(())
}

/// Expand a leading ~ to the home directory
fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Default tdata path for the current OS, when one is known
pub fn default_tdata_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        dirs::home_dir().map(|h| h.join(".local/share/TelegramDesktop/tdata"))
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join("Library/Application Support/Telegram Desktop/tdata"))
    }

    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir().map(|d| d.join("Telegram Desktop/tdata"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}
