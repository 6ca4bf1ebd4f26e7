//! The canonical session model all conversions pivot through

use crate::api::ApiProfile;
use crate::{Error, Result, AUTH_KEY_SIZE};

/// Telegram datacenter addresses (production)
const DC_ADDRESSES: [(i32, &str, u16); 5] = [
    (1, "149.154.175.53", 443),
    (2, "149.154.167.51", 443),
    (3, "149.154.175.100", 443),
    (4, "149.154.167.91", 443),
    (5, "91.108.56.130", 443),
];

/// The 256-byte MTProto authorization key
///
/// The length is enforced at construction; a key of any other length cannot
/// exist in the canonical model.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey {
    data: [u8; AUTH_KEY_SIZE],
}

impl AuthKey {
    /// Create an AuthKey from raw bytes
    ///
    /// Fails with [`Error::MalformedSession`] for any length other than 256
    /// bytes; key material is never truncated or padded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AUTH_KEY_SIZE {
            return Err(Error::malformed(format!(
                "auth key must be {} bytes, got {}",
                AUTH_KEY_SIZE,
                bytes.len()
            )));
        }

        let mut data = [0u8; AUTH_KEY_SIZE];
        data.copy_from_slice(bytes);
        Ok(Self { data })
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_SIZE] {
        &self.data
    }

    /// Short masked fingerprint for display, derived the way MTProto derives
    /// the key id (low-order bytes of the SHA-1)
    pub fn fingerprint(&self) -> String {
        let sha = crate::crypto::sha1_hash(&self.data);
        hex::encode(&sha[12..20])
    }
}

impl From<[u8; AUTH_KEY_SIZE]> for AuthKey {
    fn from(data: [u8; AUTH_KEY_SIZE]) -> Self {
        Self { data }
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose key material in debug output
        f.debug_struct("AuthKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// A client authorization with a Telegram data center, independent of any
/// on-disk format
///
/// Constructed fresh by exactly one decode operation and immutable
/// afterwards; conversions build a new instance rather than mutating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationSession {
    /// Data center the session is bound to (1-5 in practice, not validated
    /// against a whitelist)
    pub dc_id: i32,
    /// The authorization key
    pub auth_key: AuthKey,
    /// Endpoint override, when the source format embedded a literal address
    pub server_address: Option<String>,
    /// Endpoint port override
    pub port: Option<u16>,
    /// API id, when the source format recorded it
    pub api_id: Option<i32>,
    /// API hash, only ever supplied via explicit configuration
    pub api_hash: Option<String>,
    /// Profile selecting default device/system metadata for formats that
    /// embed such fields
    pub api_profile: ApiProfile,
    /// Authorized account id, when the source format recorded it
    pub user_id: Option<i64>,
    /// Active takeout session id, round-tripped when the target format has
    /// such a field and dropped silently otherwise
    pub takeout_id: Option<i64>,
}

impl AuthorizationSession {
    /// Create a session holding only the required fields
    pub fn new(dc_id: i32, auth_key: AuthKey) -> Self {
        Self {
            dc_id,
            auth_key,
            server_address: None,
            port: None,
            api_id: None,
            api_hash: None,
            api_profile: ApiProfile::default(),
            user_id: None,
            takeout_id: None,
        }
    }

    /// Check the model invariants, failing with [`Error::MalformedSession`]
    /// on the first violated one
    pub fn validate(&self) -> Result<()> {
        if self.dc_id <= 0 {
            return Err(Error::malformed(format!(
                "dc_id must be a positive integer, got {}",
                self.dc_id
            )));
        }
        // auth_key length is enforced by the AuthKey type
        if let Some(addr) = &self.server_address {
            if addr.is_empty() {
                return Err(Error::malformed("server_address override is empty"));
            }
        }
        Ok(())
    }

    /// Endpoint for this session: the recorded override if any, otherwise
    /// the production default for `dc_id`
    pub fn endpoint(&self) -> Option<(String, u16)> {
        if let Some(addr) = &self.server_address {
            return Some((addr.clone(), self.port.unwrap_or(443)));
        }
        DC_ADDRESSES
            .iter()
            .find(|(id, _, _)| *id == self.dc_id)
            .map(|(_, ip, port)| (ip.to_string(), *port))
    }

    /// Read-only summary for "info"-style display by callers; never exposes
    /// the key itself
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            dc_id: self.dc_id,
            auth_key_fingerprint: self.auth_key.fingerprint(),
            user_id: self.user_id,
            api_id: self.api_id,
        }
    }
}

/// Read-only view of a session for inspection layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub dc_id: i32,
    pub auth_key_fingerprint: String,
    pub user_id: Option<i64>,
    pub api_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_key_exact_length_only() {
        assert!(AuthKey::from_bytes(&[0u8; 256]).is_ok());
        assert!(matches!(
            AuthKey::from_bytes(&[0u8; 255]),
            Err(Error::MalformedSession { .. })
        ));
        assert!(matches!(
            AuthKey::from_bytes(&[0u8; 257]),
            Err(Error::MalformedSession { .. })
        ));
    }

    #[test]
    fn validate_rejects_missing_dc() {
        let key = AuthKey::from_bytes(&[0xAA; 256]).unwrap();
        let session = AuthorizationSession::new(0, key);
        assert!(matches!(
            session.validate(),
            Err(Error::MalformedSession { .. })
        ));
    }

    #[test]
    fn endpoint_prefers_override() {
        let key = AuthKey::from_bytes(&[0xAA; 256]).unwrap();
        let mut session = AuthorizationSession::new(2, key);
        assert_eq!(
            session.endpoint(),
            Some(("149.154.167.51".to_string(), 443))
        );

        session.server_address = Some("10.0.0.1".to_string());
        session.port = Some(8443);
        assert_eq!(session.endpoint(), Some(("10.0.0.1".to_string(), 8443)));
    }

    #[test]
    fn summary_masks_key() {
        let key = AuthKey::from_bytes(&[0xAA; 256]).unwrap();
        let session = AuthorizationSession::new(2, key.clone());
        let summary = session.summary();
        assert_eq!(summary.dc_id, 2);
        assert_eq!(summary.auth_key_fingerprint.len(), 16);
        assert_eq!(summary.auth_key_fingerprint, key.fingerprint());
    }

    #[test]
    fn equality_by_value() {
        let a = AuthorizationSession::new(2, AuthKey::from_bytes(&[0xAA; 256]).unwrap());
        let b = AuthorizationSession::new(2, AuthKey::from_bytes(&[0xAA; 256]).unwrap());
        assert_eq!(a, b);

        let c = AuthorizationSession::new(3, AuthKey::from_bytes(&[0xAA; 256]).unwrap());
        assert_ne!(a, c);
    }
}
