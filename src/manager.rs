//! Session manager facade
//!
//! Thin composition over the format codecs: every `from_*` operation decodes
//! into the canonical [`AuthorizationSession`], every `to_*` operation
//! encodes it out. Codecs never talk to each other directly, so any format
//! converts to any other through the one model.
//!
//! Codec errors pass through unchanged; the facade never downgrades them.

use std::path::Path;

use crate::api::{ApiData, ApiProfile};
use crate::relational::{self, Variant};
use crate::session::{AuthorizationSession, SessionSummary};
use crate::{strings, tdata, Error, Result};

/// Holds one canonical session and drives conversions over it
#[derive(Debug, Clone)]
pub struct SessionManager {
    session: AuthorizationSession,
}

impl SessionManager {
    /// Wrap a pre-built canonical session
    pub fn new(session: AuthorizationSession) -> Result<Self> {
        session.validate()?;
        Ok(Self { session })
    }

    /// Decode a Telethon `.session` file
    pub fn from_telethon_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(relational::decode_file(Variant::Telethon, path.as_ref())?)
    }

    /// Decode a Pyrogram/Kurigram `.session` file
    pub fn from_pyrogram_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(relational::decode_file(Variant::Pyrogram, path.as_ref())?)
    }

    /// Decode a Telegram Desktop tdata directory
    ///
    /// `passcode` is the Local Passcode when one is set.
    pub fn from_tdata_folder(path: impl AsRef<Path>, passcode: Option<&str>) -> Result<Self> {
        Self::new(tdata::decode(path.as_ref(), passcode)?)
    }

    /// Decode a Telethon session string
    pub fn from_telethon_string(string: &str) -> Result<Self> {
        Self::new(strings::decode_telethon(string)?)
    }

    /// Decode a Pyrogram session string
    pub fn from_pyrogram_string(string: &str) -> Result<Self> {
        Self::new(strings::decode_pyrogram(string)?)
    }

    /// Encode as a Telethon `.session` file
    ///
    /// If the target file already holds a session store, its cache tables
    /// are preserved and only the session row is rewritten.
    pub fn to_telethon_file(&self, path: impl AsRef<Path>) -> Result<()> {
        relational::encode_file(Variant::Telethon, &self.session, path.as_ref())
    }

    /// Encode as a Pyrogram/Kurigram `.session` file
    pub fn to_pyrogram_file(&self, path: impl AsRef<Path>) -> Result<()> {
        relational::encode_file(Variant::Pyrogram, &self.session, path.as_ref())
    }

    /// Encode as a tdata directory (best-effort layout)
    pub fn to_tdata_folder(&self, path: impl AsRef<Path>, passcode: Option<&str>) -> Result<()> {
        tdata::encode(&self.session, path.as_ref(), passcode)
    }

    /// Encode as a Telethon session string
    pub fn to_telethon_string(&self) -> Result<String> {
        strings::encode_telethon(&self.session)
    }

    /// Encode as a Pyrogram session string
    pub fn to_pyrogram_string(&self) -> Result<String> {
        strings::encode_pyrogram(&self.session)
    }

    /// Supply API credentials the source format lacked
    pub fn with_api(mut self, api: ApiData) -> Self {
        self.session.api_id = Some(api.api_id);
        self.session.api_hash = Some(api.api_hash);
        self
    }

    /// Select the profile used for default device/system metadata
    pub fn with_api_profile(mut self, profile: ApiProfile) -> Self {
        self.session.api_profile = profile;
        self
    }

    /// Attach the account id when the source format did not record it
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.session.user_id = Some(user_id);
        self
    }

    /// The canonical session
    pub fn session(&self) -> &AuthorizationSession {
        &self.session
    }

    /// Consume the manager, yielding the canonical session
    pub fn into_session(self) -> AuthorizationSession {
        self.session
    }

    /// Read-only summary for inspection layers
    pub fn summary(&self) -> SessionSummary {
        self.session.summary()
    }

    /// Full API credentials for collaborators that construct live clients
    ///
    /// Fails with [`Error::MissingApiCredentials`] when neither the source
    /// format nor a [`with_api`](Self::with_api) override supplied them;
    /// credentials are never invented here.
    pub fn api_credentials(&self) -> Result<ApiData> {
        match (&self.session.api_id, &self.session.api_hash) {
            (Some(api_id), Some(api_hash)) => {
                let mut api = ApiData::for_profile(self.session.api_profile);
                api.api_id = *api_id;
                api.api_hash = api_hash.clone();
                Ok(api)
            }
            _ => Err(Error::MissingApiCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthKey;

    fn sample_manager() -> SessionManager {
        let key = AuthKey::from_bytes(&[0xAA; 256]).unwrap();
        SessionManager::new(AuthorizationSession::new(2, key)).unwrap()
    }

    #[test]
    fn rejects_invalid_session() {
        let key = AuthKey::from_bytes(&[0xAA; 256]).unwrap();
        assert!(SessionManager::new(AuthorizationSession::new(0, key)).is_err());
    }

    #[test]
    fn api_credentials_require_explicit_supply() {
        let manager = sample_manager();
        assert!(matches!(
            manager.api_credentials(),
            Err(Error::MissingApiCredentials)
        ));

        let manager = manager.with_api(ApiData::for_profile(ApiProfile::Desktop));
        let api = manager.api_credentials().unwrap();
        assert_eq!(api.api_id, 17349);
    }

    #[test]
    fn string_conversion_through_manager() {
        let manager = sample_manager();
        let string = manager.to_telethon_string().unwrap();

        let back = SessionManager::from_telethon_string(&string).unwrap();
        assert_eq!(back.session().dc_id, 2);
        assert_eq!(back.session().auth_key, manager.session().auth_key);
    }

    #[test]
    fn summary_exposes_no_key_material() {
        let manager = sample_manager();
        let summary = manager.summary();
        assert_eq!(summary.dc_id, 2);
        assert_eq!(summary.auth_key_fingerprint.len(), 16);
    }
}
