//! Client-held slot storage backed by HTTP cookies
//!
//! A `CookieJar` is built from one request's `Cookie` headers and collects the
//! `Set-Cookie` headers that should go out with the response. Values are
//! percent-encoded so that JSON envelopes survive as cookie values.

use axum::http::{header::COOKIE, HeaderMap};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{SlotStorage, StorageError, MAX_SLOT_AGE_SECS};

/// Browsers only guarantee 4096 bytes for a cookie's name and value
pub const MAX_COOKIE_BYTES: usize = 4096;

/// Characters that may not appear raw in a cookie value
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'\\');

#[derive(Debug, Default)]
struct JarState {
    values: HashMap<String, String>,
    pending: Vec<String>,
}

/// Request-scoped cookie storage
#[derive(Debug, Default)]
pub struct CookieJar {
    state: Mutex<JarState>,
}

impl CookieJar {
    /// Creates an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a jar from every `Cookie` header on a request
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for header in headers.get_all(COOKIE) {
            match header.to_str() {
                Ok(header) => parse_cookie_header(header, &mut values),
                Err(_) => tracing::debug!("Skipping non-ASCII Cookie header"),
            }
        }
        Self {
            state: Mutex::new(JarState {
                values,
                pending: Vec::new(),
            }),
        }
    }

    /// Builds a jar from a single `Cookie` header value
    pub fn parse(header: &str) -> Self {
        let mut values = HashMap::new();
        parse_cookie_header(header, &mut values);
        Self {
            state: Mutex::new(JarState {
                values,
                pending: Vec::new(),
            }),
        }
    }

    /// Takes the `Set-Cookie` header values queued by `set`
    pub fn set_cookie_headers(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().pending)
    }

    fn lock(&self) -> MutexGuard<'_, JarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SlotStorage for CookieJar {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError> {
        let encoded = utf8_percent_encode(value, COOKIE_VALUE).to_string();
        let size = key.len() + 1 + encoded.len();
        if size > MAX_COOKIE_BYTES {
            return Err(StorageError::TooLarge {
                key: key.to_string(),
                size,
                limit: MAX_COOKIE_BYTES,
            });
        }

        let header = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            key,
            encoded,
            max_age_secs.min(MAX_SLOT_AGE_SECS)
        );

        let name_prefix = format!("{}=", key);
        let mut state = self.lock();
        state.values.insert(key.to_string(), value.to_string());
        // Only the last write to a name within one response matters
        state
            .pending
            .retain(|queued| !queued.starts_with(&name_prefix));
        state.pending.push(header);
        Ok(())
    }
}

/// Parses `name=value; name2=value2` into `values`, percent-decoding values
fn parse_cookie_header(header: &str, values: &mut HashMap<String, String>) {
    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
        values.insert(name.to_string(), decoded);
    }
}
