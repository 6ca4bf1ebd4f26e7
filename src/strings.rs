//! Portable session-string codecs
//!
//! Telethon and Pyrogram can both export a session as a url-safe base64
//! string. These are fixed packed layouts in network byte order, parsed
//! through the shared wire primitives.
//!
//! Telethon: `'1'` + base64(dc_id u8, ip 4 or 16 bytes, port u16, key 256).
//! Pyrogram (current): base64 without padding of
//! (dc_id u8, api_id u32, test_mode u8, key 256, user_id u64, is_bot u8);
//! the two pre-api_id layouts are still accepted on decode.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::session::{AuthKey, AuthorizationSession};
use crate::wire::{QtReader, QtWriter};
use crate::{Error, Result, AUTH_KEY_SIZE};

/// Leading version character of a Telethon session string
const TELETHON_STRING_VERSION: char = '1';

/// Decoded payload sizes for the Pyrogram string layouts
const PYRO_OLD_LEN: usize = 1 + 1 + AUTH_KEY_SIZE + 4 + 1;
const PYRO_OLD_64_LEN: usize = 1 + 1 + AUTH_KEY_SIZE + 8 + 1;
const PYRO_CURRENT_LEN: usize = 1 + 4 + 1 + AUTH_KEY_SIZE + 8 + 1;

/// Decode a Telethon session string
pub fn decode_telethon(string: &str) -> Result<AuthorizationSession> {
    let mut chars = string.chars();
    match chars.next() {
        Some(TELETHON_STRING_VERSION) => {}
        _ => {
            return Err(Error::invalid_format(
                "telethon string must start with version '1'",
            ))
        }
    }

    let raw = URL_SAFE
        .decode(chars.as_str())
        .map_err(|_| Error::invalid_format("invalid base64 in telethon string"))?;

    // 1 (dc) + ip + 2 (port) + 256 (key)
    let ip_len = match raw.len() {
        len if len == 1 + 4 + 2 + AUTH_KEY_SIZE => 4,
        len if len == 1 + 16 + 2 + AUTH_KEY_SIZE => 16,
        len => {
            return Err(Error::invalid_format(format!(
                "unexpected telethon string payload length: {len}"
            )))
        }
    };

    let mut reader = QtReader::new(&raw);
    let dc_id = reader.read_u8()? as i32;
    let ip_bytes = reader.read_bytes(ip_len)?;
    let port = reader.read_u16()?;
    let key_bytes = reader.read_bytes(AUTH_KEY_SIZE)?;

    let address: IpAddr = if ip_len == 4 {
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&ip_bytes);
        IpAddr::V4(Ipv4Addr::from(octets))
    } else {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&ip_bytes);
        IpAddr::V6(Ipv6Addr::from(octets))
    };

    let mut session = AuthorizationSession::new(dc_id, AuthKey::from_bytes(&key_bytes)?);
    session.server_address = Some(address.to_string());
    session.port = Some(port);
    session.validate()?;
    Ok(session)
}

/// Encode the canonical model as a Telethon session string
pub fn encode_telethon(session: &AuthorizationSession) -> Result<String> {
    session.validate()?;
    let (address, port) = session
        .endpoint()
        .ok_or_else(|| Error::malformed(format!("no known endpoint for dc {}", session.dc_id)))?;
    let ip: IpAddr = address
        .parse()
        .map_err(|_| Error::invalid_format(format!("not an ip address: {address}")))?;

    let mut w = QtWriter::new();
    w.write_u8(session.dc_id as u8);
    match ip {
        IpAddr::V4(v4) => w.write_bytes(&v4.octets()),
        IpAddr::V6(v6) => w.write_bytes(&v6.octets()),
    }
    w.write_u16(port);
    w.write_bytes(session.auth_key.as_bytes());

    Ok(format!(
        "{}{}",
        TELETHON_STRING_VERSION,
        URL_SAFE.encode(w.into_bytes())
    ))
}

/// Decode a Pyrogram session string (any of the three known layouts)
pub fn decode_pyrogram(string: &str) -> Result<AuthorizationSession> {
    let raw = URL_SAFE_NO_PAD
        .decode(string.trim_end_matches('='))
        .map_err(|_| Error::invalid_format("invalid base64 in pyrogram string"))?;

    let mut reader = QtReader::new(&raw);
    let (dc_id, api_id, user_id) = match raw.len() {
        PYRO_CURRENT_LEN => {
            let dc_id = reader.read_u8()? as i32;
            let api_id = reader.read_u32()? as i32;
            reader.skip(1)?; // test_mode
            reader.skip(AUTH_KEY_SIZE)?;
            let user_id = reader.read_u64()? as i64;
            (dc_id, Some(api_id).filter(|id| *id != 0), user_id)
        }
        PYRO_OLD_LEN => {
            let dc_id = reader.read_u8()? as i32;
            reader.skip(1)?;
            reader.skip(AUTH_KEY_SIZE)?;
            let user_id = reader.read_u32()? as i64;
            (dc_id, None, user_id)
        }
        PYRO_OLD_64_LEN => {
            let dc_id = reader.read_u8()? as i32;
            reader.skip(1)?;
            reader.skip(AUTH_KEY_SIZE)?;
            let user_id = reader.read_u64()? as i64;
            (dc_id, None, user_id)
        }
        len => {
            return Err(Error::invalid_format(format!(
                "unexpected pyrogram string payload length: {len}"
            )))
        }
    };

    // The key sits after the header fields in every layout
    let key_offset = match raw.len() {
        PYRO_CURRENT_LEN => 6,
        _ => 2,
    };
    let key = AuthKey::from_bytes(&raw[key_offset..key_offset + AUTH_KEY_SIZE])?;

    let mut session = AuthorizationSession::new(dc_id, key);
    session.api_id = api_id;
    session.user_id = Some(user_id).filter(|id| *id != 0);
    session.validate()?;
    Ok(session)
}

/// Encode the canonical model as a Pyrogram session string (current layout)
pub fn encode_pyrogram(session: &AuthorizationSession) -> Result<String> {
    session.validate()?;

    let mut w = QtWriter::new();
    w.write_u8(session.dc_id as u8);
    w.write_u32(session.api_id.unwrap_or(0) as u32);
    w.write_u8(0); // test_mode
    w.write_bytes(session.auth_key.as_bytes());
    w.write_u64(session.user_id.unwrap_or(0) as u64);
    w.write_u8(0); // is_bot

    Ok(URL_SAFE_NO_PAD.encode(w.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> AuthorizationSession {
        let key = AuthKey::from_bytes(&[0xC3; 256]).unwrap();
        let mut session = AuthorizationSession::new(2, key);
        session.server_address = Some("149.154.167.51".to_string());
        session.port = Some(443);
        session.user_id = Some(112233445);
        session.api_id = Some(12345);
        session
    }

    #[test]
    fn telethon_string_round_trip() {
        let session = sample_session();
        let string = encode_telethon(&session).unwrap();
        assert!(string.starts_with('1'));

        let decoded = decode_telethon(&string).unwrap();
        assert_eq!(decoded.dc_id, 2);
        assert_eq!(decoded.auth_key, session.auth_key);
        assert_eq!(decoded.server_address.as_deref(), Some("149.154.167.51"));
        assert_eq!(decoded.port, Some(443));
    }

    #[test]
    fn telethon_string_length_matches_python_format() {
        // 263-byte ipv4 payload encodes to 352 base64 chars plus version char
        let string = encode_telethon(&sample_session()).unwrap();
        assert_eq!(string.len(), 1 + 352);
    }

    #[test]
    fn pyrogram_string_round_trip() {
        let session = sample_session();
        let string = encode_pyrogram(&session).unwrap();

        let decoded = decode_pyrogram(&string).unwrap();
        assert_eq!(decoded.dc_id, 2);
        assert_eq!(decoded.auth_key, session.auth_key);
        assert_eq!(decoded.api_id, Some(12345));
        assert_eq!(decoded.user_id, Some(112233445));
    }

    #[test]
    fn pyrogram_old_layout_accepted() {
        // dc 2, test_mode 0, key, user_id u32, is_bot 0
        let mut raw = Vec::with_capacity(PYRO_OLD_LEN);
        raw.push(2);
        raw.push(0);
        raw.extend_from_slice(&[0xC3; 256]);
        raw.extend_from_slice(&112233445u32.to_be_bytes());
        raw.push(0);
        let string = URL_SAFE_NO_PAD.encode(&raw);

        let decoded = decode_pyrogram(&string).unwrap();
        assert_eq!(decoded.dc_id, 2);
        assert_eq!(decoded.api_id, None);
        assert_eq!(decoded.user_id, Some(112233445));
    }

    #[test]
    fn garbage_string_is_rejected() {
        assert!(decode_telethon("2abcdef").is_err());
        assert!(decode_pyrogram("@@@@").is_err());
        assert!(decode_pyrogram("AAAA").is_err());
    }
}
