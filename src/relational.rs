//! Relational (SQLite) session codec
//!
//! One parameterized codec covering the two row-store variants: the Telethon
//! `.session` file and the Pyrogram/Kurigram `.session` file. The variants
//! differ in column names/order and schema version numbers, not in algorithm,
//! so each is described by a [`SchemaDescriptor`] selected once at entry.
//!
//! Both stores hold exactly one session row. On encode into an existing
//! file, auxiliary tables the codec does not understand (entity/peer caches)
//! are preserved and only the session row and schema version are rewritten,
//! so a converted file can be dropped back into a live client installation.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::api::ApiData;
use crate::session::{AuthKey, AuthorizationSession};
use crate::{Error, Result};

/// Which row-store dialect a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Telethon `.session` schema
    Telethon,
    /// Pyrogram/Kurigram `.session` schema
    Pyrogram,
}

/// Per-variant schema description, fixed at compile time
struct SchemaDescriptor {
    name: &'static str,
    create_sql: &'static str,
    version_table: &'static str,
    version_column: &'static str,
    write_version: u32,
    min_version: u32,
    max_version: u32,
}

/// Telethon schema, as created by telethon's SQLiteSession (version 7)
const TELETHON_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "telethon",
    create_sql: "\
        CREATE TABLE version (version integer primary key);

        CREATE TABLE sessions (
            dc_id integer primary key,
            server_address text,
            port integer,
            auth_key blob,
            takeout_id integer
        );

        CREATE TABLE entities (
            id integer primary key,
            hash integer not null,
            username text,
            phone integer,
            name text,
            date integer
        );

        CREATE TABLE sent_files (
            md5_digest blob,
            file_size integer,
            type integer,
            id integer,
            hash integer,
            primary key(md5_digest, file_size, type)
        );

        CREATE TABLE update_state (
            id integer primary key,
            pts integer,
            qts integer,
            date integer,
            seq integer
        );",
    version_table: "version",
    version_column: "version",
    write_version: 7,
    min_version: 4,
    max_version: 7,
};

/// Version stamped when rewriting a store that kept the classic pyrogram
/// layout (no endpoint columns)
const PYROGRAM_CLASSIC_VERSION: u32 = 3;

/// Pyrogram schema in its Kurigram form (version 7, with endpoint columns);
/// the classic version-3 layout without them is still accepted on decode
const PYROGRAM_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "pyrogram",
    create_sql: "\
        CREATE TABLE sessions
        (
            dc_id          INTEGER PRIMARY KEY,
            server_address TEXT,
            port           INTEGER,
            api_id         INTEGER,
            test_mode      INTEGER,
            auth_key       BLOB,
            date           INTEGER NOT NULL,
            user_id        INTEGER,
            is_bot         INTEGER
        );

        CREATE TABLE peers
        (
            id             INTEGER PRIMARY KEY,
            access_hash    INTEGER,
            type           INTEGER NOT NULL,
            phone_number   TEXT,
            last_update_on INTEGER NOT NULL DEFAULT (CAST(STRFTIME('%s', 'now') AS INTEGER))
        );

        CREATE TABLE usernames
        (
            id       INTEGER,
            username TEXT,
            FOREIGN KEY (id) REFERENCES peers(id)
        );

        CREATE TABLE update_state
        (
            id   INTEGER PRIMARY KEY,
            pts  INTEGER,
            qts  INTEGER,
            date INTEGER,
            seq  INTEGER
        );

        CREATE TABLE version
        (
            number INTEGER PRIMARY KEY
        );

        CREATE INDEX idx_peers_id ON peers (id);
        CREATE INDEX idx_peers_phone_number ON peers (phone_number);
        CREATE INDEX idx_usernames_id ON usernames (id);
        CREATE INDEX idx_usernames_username ON usernames (username);

        CREATE TRIGGER trg_peers_last_update_on
            AFTER UPDATE
            ON peers
        BEGIN
            UPDATE peers
            SET last_update_on = CAST(STRFTIME('%s', 'now') AS INTEGER)
            WHERE id = NEW.id;
        END;",
    version_table: "version",
    version_column: "number",
    write_version: 7,
    min_version: 3,
    max_version: 7,
};

impl Variant {
    fn descriptor(&self) -> &'static SchemaDescriptor {
        match self {
            Variant::Telethon => &TELETHON_SCHEMA,
            Variant::Pyrogram => &PYROGRAM_SCHEMA,
        }
    }
}

/// Decode a relational session file into the canonical model
pub fn decode_file(variant: Variant, path: &Path) -> Result<AuthorizationSession> {
    let desc = variant.descriptor();
    if !path.is_file() {
        return Err(Error::FileNotFound {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            folder: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        });
    }

    let conn = Connection::open(path)?;

    check_version(&conn, desc)?;
    check_single_row(&conn)?;

    tracing::debug!("decoding {} session store: {:?}", desc.name, path);

    let session = match variant {
        Variant::Telethon => read_telethon_row(&conn)?,
        Variant::Pyrogram => read_pyrogram_row(&conn)?,
    };
    session.validate()?;
    Ok(session)
}

/// Encode the canonical model into a relational session file
///
/// If `path` already holds a session store, only the session row and schema
/// version are overwritten and every other table is preserved; otherwise a
/// minimal valid store is synthesized.
pub fn encode_file(variant: Variant, session: &AuthorizationSession, path: &Path) -> Result<()> {
    session.validate()?;
    let desc = variant.descriptor();

    let exists = path.is_file() && std::fs::metadata(path)?.len() > 0;
    let conn = Connection::open(path)?;

    if exists {
        if !table_exists(&conn, "sessions")? {
            return Err(Error::invalid_format(format!(
                "existing file is not a {} session store: {:?}",
                desc.name, path
            )));
        }
        tracing::debug!("rewriting session row in existing {} store", desc.name);
    } else {
        conn.execute_batch(desc.create_sql)?;
    }

    match variant {
        Variant::Telethon => write_telethon_row(&conn, session)?,
        Variant::Pyrogram => write_pyrogram_row(&conn, session)?,
    }

    // The stamped version must describe the layout actually present: a
    // preserved classic pyrogram store keeps its own version number.
    let version = match variant {
        Variant::Pyrogram if exists && !sessions_have_endpoint_columns(&conn)? => {
            PYROGRAM_CLASSIC_VERSION
        }
        _ => desc.write_version,
    };
    write_version(&conn, desc, version)?;
    Ok(())
}

fn check_version(conn: &Connection, desc: &SchemaDescriptor) -> Result<()> {
    if !table_exists(conn, desc.version_table)? {
        return Err(Error::invalid_format(format!(
            "not a {} session store: no version table",
            desc.name
        )));
    }

    let sql = format!(
        "SELECT {} FROM {}",
        desc.version_column, desc.version_table
    );
    let version: Option<i64> = conn.query_row(&sql, [], |row| row.get(0)).optional()?;
    let version = version.unwrap_or(0) as u32;

    if version < desc.min_version || version > desc.max_version {
        return Err(Error::UnsupportedSchemaVersion { version });
    }
    Ok(())
}

fn check_single_row(conn: &Connection) -> Result<()> {
    if !table_exists(conn, "sessions")? {
        return Err(Error::MissingSessionRow { count: 0 });
    }
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
    if count != 1 {
        return Err(Error::MissingSessionRow {
            count: count as usize,
        });
    }
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn sessions_have_endpoint_columns(conn: &Connection) -> Result<bool> {
    Ok(table_columns(conn, "sessions")?
        .iter()
        .any(|c| c == "server_address"))
}

fn table_columns(conn: &Connection, name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{name}\")"))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(cols)
}

fn port_from_column(port: Option<i64>) -> Result<Option<u16>> {
    port.map(|p| {
        u16::try_from(p).map_err(|_| Error::malformed(format!("port out of range: {p}")))
    })
    .transpose()
}

fn auth_key_from_blob(blob: Option<Vec<u8>>) -> Result<AuthKey> {
    let blob = blob.ok_or_else(|| Error::malformed("session row has no auth_key"))?;
    AuthKey::from_bytes(&blob)
}

fn read_telethon_row(conn: &Connection) -> Result<AuthorizationSession> {
    let cols = table_columns(conn, "sessions")?;
    let has_takeout = cols.iter().any(|c| c == "takeout_id");

    let (dc_id, server_address, port, key_blob, takeout_id) = conn.query_row(
        "SELECT * FROM sessions",
        [],
        |row| {
            let dc_id: Option<i64> = row.get("dc_id")?;
            let server_address: Option<String> = row.get("server_address")?;
            let port: Option<i64> = row.get("port")?;
            let key_blob: Option<Vec<u8>> = row.get("auth_key")?;
            let takeout_id: Option<i64> = if has_takeout {
                row.get("takeout_id")?
            } else {
                None
            };
            Ok((dc_id, server_address, port, key_blob, takeout_id))
        },
    )?;

    let dc_id = dc_id.ok_or_else(|| Error::malformed("session row has no dc_id"))?;
    let mut session =
        AuthorizationSession::new(dc_id as i32, auth_key_from_blob(key_blob)?);
    session.server_address = server_address.filter(|s| !s.is_empty());
    session.port = port_from_column(port)?;
    session.takeout_id = takeout_id;

    // Telethon does not store the account id in the session row, but the
    // entity cache usually holds the own-user row.
    if table_exists(conn, "entities")? {
        session.user_id = conn
            .query_row(
                "SELECT id FROM entities WHERE id != 0 LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
    }

    Ok(session)
}

fn write_telethon_row(conn: &Connection, session: &AuthorizationSession) -> Result<()> {
    let (server_address, port) = session
        .endpoint()
        .ok_or_else(|| Error::malformed(format!("no known endpoint for dc {}", session.dc_id)))?;

    conn.execute("DELETE FROM sessions", [])?;
    conn.execute(
        "INSERT INTO sessions (dc_id, server_address, port, auth_key, takeout_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.dc_id,
            server_address,
            port,
            session.auth_key.as_bytes().to_vec(),
            session.takeout_id,
        ],
    )?;
    Ok(())
}

fn read_pyrogram_row(conn: &Connection) -> Result<AuthorizationSession> {
    let has_endpoint = sessions_have_endpoint_columns(conn)?;

    // test_mode and is_bot have no canonical slot and are discarded here.
    let (dc_id, server_address, port, api_id, key_blob, user_id) = conn.query_row(
        "SELECT * FROM sessions",
        [],
        |row| {
            let dc_id: Option<i64> = row.get("dc_id")?;
            let (server_address, port): (Option<String>, Option<i64>) = if has_endpoint {
                (row.get("server_address")?, row.get("port")?)
            } else {
                (None, None)
            };
            let api_id: Option<i64> = row.get("api_id")?;
            let key_blob: Option<Vec<u8>> = row.get("auth_key")?;
            let user_id: Option<i64> = row.get("user_id")?;
            Ok((dc_id, server_address, port, api_id, key_blob, user_id))
        },
    )?;

    let dc_id = dc_id.ok_or_else(|| Error::malformed("session row has no dc_id"))?;
    let mut session =
        AuthorizationSession::new(dc_id as i32, auth_key_from_blob(key_blob)?);
    session.server_address = server_address.filter(|s| !s.is_empty());
    session.port = port_from_column(port)?;
    session.api_id = api_id.filter(|id| *id != 0).map(|id| id as i32);
    session.user_id = user_id.filter(|id| *id != 0);

    Ok(session)
}

fn write_pyrogram_row(conn: &Connection, session: &AuthorizationSession) -> Result<()> {
    let (server_address, port) = session
        .endpoint()
        .ok_or_else(|| Error::malformed(format!("no known endpoint for dc {}", session.dc_id)))?;

    // The api_id column comes from the session when the source recorded it
    // and from the named profile default table otherwise, mirroring the
    // client library's own registration data.
    let api_id = session
        .api_id
        .unwrap_or_else(|| ApiData::for_profile(session.api_profile).api_id);

    let date = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let has_endpoint = sessions_have_endpoint_columns(conn)?;

    conn.execute("DELETE FROM sessions", [])?;
    if has_endpoint {
        conn.execute(
            "INSERT INTO sessions
                 (dc_id, server_address, port, api_id, test_mode, auth_key, date, user_id, is_bot)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, 0)",
            params![
                session.dc_id,
                server_address,
                port,
                api_id,
                session.auth_key.as_bytes().to_vec(),
                date,
                session.user_id,
            ],
        )?;
    } else {
        // Classic pyrogram layout preserved from the existing file
        conn.execute(
            "INSERT INTO sessions
                 (dc_id, api_id, test_mode, auth_key, date, user_id, is_bot)
             VALUES (?1, ?2, 0, ?3, ?4, ?5, 0)",
            params![
                session.dc_id,
                api_id,
                session.auth_key.as_bytes().to_vec(),
                date,
                session.user_id,
            ],
        )?;
    }
    Ok(())
}

fn write_version(conn: &Connection, desc: &SchemaDescriptor, version: u32) -> Result<()> {
    conn.execute(&format!("DELETE FROM {}", desc.version_table), [])?;
    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES (?1)",
            desc.version_table, desc.version_column
        ),
        params![version],
    )?;
    Ok(())
}
