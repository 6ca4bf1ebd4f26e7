//! # tgconv
//!
//! Convert a Telegram client authorization session between the formats the
//! major client families persist on disk:
//!
//! - Telethon `.session` files (SQLite)
//! - Pyrogram/Kurigram `.session` files (SQLite)
//! - Telegram Desktop `tdata` directories (encrypted local storage)
//! - Telethon/Pyrogram portable session strings
//!
//! Every conversion pivots through one canonical
//! [`AuthorizationSession`], so any format converts to any other without
//! per-pair code. Nothing here performs network I/O or validates key
//! material against Telegram; the tool preserves and re-encodes whatever
//! authorization the source holds.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tgconv::SessionManager;
//!
//! fn main() -> tgconv::Result<()> {
//!     let manager = SessionManager::from_tdata_folder("/path/to/tdata", None)?;
//!
//!     let info = manager.summary();
//!     println!("DC {}, key {}", info.dc_id, info.auth_key_fingerprint);
//!
//!     manager.to_telethon_file("converted.session")?;
//!     Ok(())
//! }
//! ```

mod api;
mod error;
mod manager;
mod session;

pub mod relational;
pub mod strings;
pub mod tdata;
pub mod wire;

pub(crate) mod crypto;

pub use api::{ApiData, ApiProfile};
pub use error::{Error, Result};
pub use manager::SessionManager;
pub use relational::Variant;
pub use session::{AuthKey, AuthorizationSession, SessionSummary};

/// Auth key size in bytes (256 bytes = 2048 bits)
pub const AUTH_KEY_SIZE: usize = 256;

/// Default tdata key file name
pub const DEFAULT_KEY_FILE: &str = "data";

/// Maximum number of accounts supported by Telegram Desktop
pub const MAX_ACCOUNTS: usize = 3;
