//! Cross-format conversion tests over the public facade

use std::fs;

use tgconv::{
    ApiData, ApiProfile, AuthKey, AuthorizationSession, Error, SessionManager,
};

fn session_with_endpoint() -> AuthorizationSession {
    let key = AuthKey::from_bytes(&[0xAA; 256]).unwrap();
    let mut session = AuthorizationSession::new(2, key);
    session.server_address = Some("149.154.167.51".to_string());
    session.port = Some(443);
    session
}

#[test]
fn telethon_to_pyrogram_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let telethon_path = dir.path().join("source.session");
    let pyrogram_path = dir.path().join("converted.session");

    // A Telethon store holding dc 2, an all-0xAA key and a literal endpoint
    SessionManager::new(session_with_endpoint())
        .unwrap()
        .to_telethon_file(&telethon_path)
        .unwrap();

    let source = SessionManager::from_telethon_file(&telethon_path).unwrap();
    assert_eq!(source.session().dc_id, 2);
    assert_eq!(source.session().auth_key.as_bytes(), &[0xAA; 256]);
    assert_eq!(source.session().api_id, None);

    source.to_pyrogram_file(&pyrogram_path).unwrap();
    let converted = SessionManager::from_pyrogram_file(&pyrogram_path).unwrap();

    assert_eq!(converted.session().dc_id, 2);
    assert_eq!(converted.session().auth_key.as_bytes(), &[0xAA; 256]);
    assert_eq!(
        converted.session().server_address.as_deref(),
        Some("149.154.167.51")
    );
    assert_eq!(converted.session().port, Some(443));

    // The source carried no API credentials: the file's api_id column holds
    // the desktop profile default, api_hash stays unknown, and anything that
    // needs full credentials keeps failing until they are supplied.
    assert_eq!(converted.session().api_id, Some(17349));
    assert!(matches!(
        source.api_credentials(),
        Err(Error::MissingApiCredentials)
    ));

    let supplied = source.with_api(ApiData::for_profile(ApiProfile::Desktop));
    assert!(supplied.api_credentials().is_ok());
}

#[test]
fn reencoded_bytes_decode_to_the_same_session() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.session");
    let second = dir.path().join("second.session");

    let mut session = session_with_endpoint();
    session.user_id = Some(112233445);
    SessionManager::new(session)
        .unwrap()
        .to_pyrogram_file(&first)
        .unwrap();

    let once = SessionManager::from_pyrogram_file(&first).unwrap();
    once.to_pyrogram_file(&second).unwrap();
    let twice = SessionManager::from_pyrogram_file(&second).unwrap();

    // Bytes may differ; the decoded canonical session may not
    assert_eq!(once.session(), twice.session());
}

#[test]
fn tdata_to_relational_chain() {
    let dir = tempfile::tempdir().unwrap();
    let tdata_dir = dir.path().join("tdata");
    let telethon_path = dir.path().join("out.session");

    let key = AuthKey::from_bytes(&[0x5C; 256]).unwrap();
    let mut session = AuthorizationSession::new(4, key);
    session.user_id = Some(998877660);

    SessionManager::new(session)
        .unwrap()
        .to_tdata_folder(&tdata_dir, None)
        .unwrap();

    let from_tdata = SessionManager::from_tdata_folder(&tdata_dir, None).unwrap();
    assert_eq!(from_tdata.session().dc_id, 4);
    assert_eq!(from_tdata.session().user_id, Some(998877660));

    from_tdata.to_telethon_file(&telethon_path).unwrap();
    let from_file = SessionManager::from_telethon_file(&telethon_path).unwrap();

    assert_eq!(from_file.session().dc_id, 4);
    assert_eq!(from_file.session().auth_key.as_bytes(), &[0x5C; 256]);
    // The telethon store embeds the default endpoint for dc 4
    assert_eq!(
        from_file.session().server_address.as_deref(),
        Some("149.154.167.91")
    );
}

#[test]
fn tampered_tdata_block_fails_integrity_check() {
    let dir = tempfile::tempdir().unwrap();
    let tdata_dir = dir.path().join("tdata");

    let key = AuthKey::from_bytes(&[0x11; 256]).unwrap();
    let mut session = AuthorizationSession::new(1, key);
    session.user_id = Some(42);
    SessionManager::new(session)
        .unwrap()
        .to_tdata_folder(&tdata_dir, None)
        .unwrap();

    // Flip one byte inside the encrypted account block
    let account_file = tdata_dir.join("D877F783D5D3EF8C");
    let mut bytes = fs::read(&account_file).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    fs::write(&account_file, bytes).unwrap();

    assert!(matches!(
        SessionManager::from_tdata_folder(&tdata_dir, None),
        Err(Error::IntegrityCheckFailed)
    ));
}

#[test]
fn takeout_id_round_trips_where_representable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("takeout.session");

    let mut session = session_with_endpoint();
    session.takeout_id = Some(777);
    SessionManager::new(session)
        .unwrap()
        .to_telethon_file(&path)
        .unwrap();

    let decoded = SessionManager::from_telethon_file(&path).unwrap();
    assert_eq!(decoded.session().takeout_id, Some(777));

    // Pyrogram has no such field: dropped silently, not an error
    let pyro_path = dir.path().join("takeout_pyro.session");
    decoded.to_pyrogram_file(&pyro_path).unwrap();
    let lossy = SessionManager::from_pyrogram_file(&pyro_path).unwrap();
    assert_eq!(lossy.session().takeout_id, None);
}

#[test]
fn string_and_file_formats_agree() {
    let mut session = session_with_endpoint();
    session.user_id = Some(112233445);
    session.api_id = Some(12345);
    let manager = SessionManager::new(session).unwrap();

    let from_string =
        SessionManager::from_pyrogram_string(&manager.to_pyrogram_string().unwrap()).unwrap();
    assert_eq!(from_string.session().dc_id, 2);
    assert_eq!(from_string.session().api_id, Some(12345));
    assert_eq!(from_string.session().user_id, Some(112233445));
    assert_eq!(
        from_string.session().auth_key,
        manager.session().auth_key
    );
}
