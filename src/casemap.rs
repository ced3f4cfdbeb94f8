//! RFC 1459 case mapping for nick comparison.
//!
//! Servers treat `[]\~` as the uppercase forms of `{}|^`. The engine only
//! needs equality (acknowledgment matching), so no allocation is done.

#[inline]
const fn fold(b: u8) -> u8 {
    match b {
        b'[' => b'{',
        b']' => b'}',
        b'\\' => b'|',
        b'~' => b'^',
        _ => b.to_ascii_lowercase(),
    }
}

/// Compare two names under RFC 1459 case mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .all(|(x, y)| fold(x) == fold(y))
}

/// Whether a target name is a channel (`#`, `&`, `+` or `!` prefix).
pub fn is_channel_name(name: &str) -> bool {
    matches!(name.as_bytes().first(), Some(b'#' | b'&' | b'+' | b'!'))
}
