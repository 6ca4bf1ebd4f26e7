//! API application profiles
//!
//! Each Telegram client family registers with its own api_id/api_hash and
//! reports platform-specific device metadata. When a target format embeds
//! such fields and the source session did not carry them, the values come
//! from this explicit table, keyed by [`ApiProfile`] - never from an implicit
//! global default.

use std::str::FromStr;

use crate::Error;

/// Client application profile selecting default device/system metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiProfile {
    /// Telegram Desktop
    #[default]
    Desktop,
    /// Telegram for Android
    Android,
    /// Telegram for iOS
    Ios,
    /// Telegram for macOS
    Macos,
    /// Telegram Web K
    Web,
}

impl FromStr for ApiProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "macos" => Ok(Self::Macos),
            "web" => Ok(Self::Web),
            other => Err(Error::invalid_format(format!(
                "unknown api profile: {other}"
            ))),
        }
    }
}

/// API credentials plus the device metadata a client reports at authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiData {
    pub api_id: i32,
    pub api_hash: String,
    pub device_model: String,
    pub system_version: String,
    pub app_version: String,
    pub lang_code: String,
    pub system_lang_code: String,
}

impl ApiData {
    /// Default API data for a profile
    pub fn for_profile(profile: ApiProfile) -> Self {
        match profile {
            ApiProfile::Desktop => Self::new(
                17349,
                "344583e45741c457fe1862106095a5eb",
                "Desktop",
                "Windows 10",
                "4.8.0",
            ),
            ApiProfile::Android => Self::new(
                4,
                "014b35b6184100b085b0d0572f9b5103",
                "Android",
                "SDK 23",
                "9.7.0",
            ),
            ApiProfile::Ios => Self::new(
                8,
                "7245de8e747a0d6fbe11f7cc14fcc0bb",
                "iPhone",
                "iOS 15.0",
                "9.7.0",
            ),
            ApiProfile::Macos => Self::new(
                946,
                "5f3fb04eac560c6a3d7dd5cacb85e8b0",
                "Mac",
                "macOS 12.0",
                "9.7.0",
            ),
            ApiProfile::Web => Self::new(
                2496,
                "8da85b0d5bfe62527e5b244c209159c3",
                "Web",
                "Browser",
                "1.0.1",
            ),
        }
    }

    fn new(
        api_id: i32,
        api_hash: &str,
        device_model: &str,
        system_version: &str,
        app_version: &str,
    ) -> Self {
        Self {
            api_id,
            api_hash: api_hash.to_string(),
            device_model: device_model.to_string(),
            system_version: system_version.to_string(),
            app_version: app_version.to_string(),
            lang_code: "en".to_string(),
            system_lang_code: "en-US".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_from_str() {
        assert_eq!("desktop".parse::<ApiProfile>().unwrap(), ApiProfile::Desktop);
        assert_eq!("iOS".parse::<ApiProfile>().unwrap(), ApiProfile::Ios);
        assert!("linux".parse::<ApiProfile>().is_err());
    }

    #[test]
    fn profile_defaults_are_distinct() {
        let desktop = ApiData::for_profile(ApiProfile::Desktop);
        let android = ApiData::for_profile(ApiProfile::Android);
        assert_eq!(desktop.api_id, 17349);
        assert_eq!(android.api_id, 4);
        assert_ne!(desktop.api_hash, android.api_hash);
    }
}
