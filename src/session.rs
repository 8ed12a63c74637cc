//! Loads session material (cookies, extra headers) for the replay engine.

use std::path::Path;

use anyhow::Result;

use crate::errors::ErrorCode;
use crate::io::read_json;
use crate::model::{CookieEntry, SessionMaterial};

pub fn load_session(
    cookies_path: Option<&Path>,
    headers_path: Option<&Path>,
) -> Result<SessionMaterial> {
    let mut session = SessionMaterial::default();

    if let Some(path) = cookies_path {
        let entries: Vec<CookieEntry> = read_json(path, ErrorCode::MALFORMED_SESSION_FILE)?;
        for entry in entries {
            session.cookies.insert(entry.name, entry.value);
        }
    }

    if let Some(path) = headers_path {
        session.headers = read_json(path, ErrorCode::MALFORMED_SESSION_FILE)?;
    }

    Ok(session)
}
