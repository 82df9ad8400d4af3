//! Room-name normalization and user text checks.

use crate::error::RoomNameError;

/// Longest accepted room name, in characters.
pub const MAX_ROOM_NAME_LEN: usize = 64;

const SPECIAL_CHARS: &[char] = &['-', '_', '.', '#'];

/// Canonical wire form of a room name: trimmed and lowercased.
#[must_use]
pub fn normalize_room(room: &str) -> String {
    room.trim().to_lowercase()
}

/// Normalize a room name and check it against the naming rules.
///
/// Rules after normalization: 1–64 characters, no whitespace, only
/// alphanumerics and `-_.#`, at least one alphanumeric, no leading or
/// trailing dot, and no two special characters in a row.
pub fn validate_room_name(room: &str) -> Result<String, RoomNameError> {
    let r = normalize_room(room);

    if r.is_empty() {
        return Err(RoomNameError::Empty);
    }
    if r.chars().any(char::is_whitespace) {
        return Err(RoomNameError::Whitespace);
    }
    if r.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(RoomNameError::TooLong {
            max: MAX_ROOM_NAME_LEN,
        });
    }
    if let Some(bad) = r
        .chars()
        .find(|c| !c.is_alphanumeric() && !SPECIAL_CHARS.contains(c))
    {
        return Err(RoomNameError::InvalidChar(bad));
    }
    if !r.chars().any(char::is_alphanumeric) {
        return Err(RoomNameError::NoAlphanumeric);
    }
    if r.starts_with('.') || r.ends_with('.') {
        return Err(RoomNameError::DotBoundary);
    }
    let chars: Vec<char> = r.chars().collect();
    if chars
        .windows(2)
        .any(|w| SPECIAL_CHARS.contains(&w[0]) && SPECIAL_CHARS.contains(&w[1]))
    {
        return Err(RoomNameError::ConsecutiveSpecial);
    }

    Ok(r)
}

/// Trim user text and strip control characters other than newline and tab.
///
/// Returns `None` when nothing printable remains or the trimmed input is
/// longer than `max_len` characters.
#[must_use]
pub fn sanitize_text(text: &str, max_len: usize) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_len {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
