//! Storage-safe file names.
//!
//! A stored name is `<token>_<cleaned>` where `token` is a millisecond epoch
//! that never repeats within the process and `cleaned` is the declared name
//! with every byte outside `[A-Za-z0-9.-]` replaced by `_`. The result can
//! not contain a path separator, so joining it onto the upload directory
//! always stays inside that directory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;

/// Longest cleaned name kept after the token.
pub const MAX_NAME_BYTES: usize = 200;

/// Longest extension (including the dot) preserved when truncating.
const MAX_EXTENSION_BYTES: usize = 16;

/// Derives unique, storage-safe names from client-declared ones.
pub struct NameSanitizer {
    clock: Arc<dyn Clock>,
    last_token: AtomicU64,
}

impl NameSanitizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_token: AtomicU64::new(0),
        }
    }

    /// Produce the stored name for `declared`.
    ///
    /// Two calls never return the same name, even within one clock tick.
    pub fn sanitize(&self, declared: &str) -> String {
        let token = self.next_token();
        let cleaned = clean_name(declared);
        if cleaned.is_empty() {
            token.to_string()
        } else {
            format!("{token}_{cleaned}")
        }
    }

    /// Current time in milliseconds, bumped past the last issued token.
    fn next_token(&self) -> u64 {
        let now = self.clock.now_millis();
        let previous = self
            .last_token
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }
}

/// Replace disallowed characters and cap the length.
pub fn clean_name(declared: &str) -> String {
    let cleaned: String = declared
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.len() <= MAX_NAME_BYTES {
        return cleaned;
    }

    // ASCII only from here on, so byte slicing is safe.
    match cleaned.rfind('.') {
        Some(dot) if dot > 0 && cleaned.len() - dot <= MAX_EXTENSION_BYTES => {
            let extension = &cleaned[dot..];
            format!("{}{}", &cleaned[..MAX_NAME_BYTES - extension.len()], extension)
        }
        _ => cleaned[..MAX_NAME_BYTES].to_string(),
    }
}
