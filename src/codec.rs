//! Handshake parameter codec
//!
//! The H5 player endpoint expects the `_paramStr_` value in an obfuscated
//! form: the plaintext is rotated around its character midpoint, passed
//! through a literal backslash-escape resolution step, base64-encoded, and
//! prefixed with a fixed header. The escape pass is a legacy artifact of the
//! vendor player (a no-op for ordinary parameter values) and is applied in
//! BOTH directions; it is kept exactly as the endpoint expects it rather
//! than made mathematically symmetric.

use std::borrow::Cow;
use std::str::Chars;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{AppError, Result};

/// Fixed token header. Leftover base64 text of a once randomly generated
/// numeric header in the vendor player; the endpoint only checks length, so
/// it is a constant, never recomputed.
pub const TOKEN_PREFIX: &str = "MTc2NDAxND";

/// Obfuscate a plaintext parameter into its wire token.
pub fn encode(plaintext: &str) -> String {
    let rotated = rotate(plaintext);
    let resolved = resolve_escapes(&rotated);
    format!("{}{}", TOKEN_PREFIX, BASE64.encode(resolved.as_bytes()))
}

/// Recover the plaintext parameter from a wire token.
///
/// Only reachable errors are foreign/corrupted tokens: too short for the
/// header, malformed base64, or payload bytes that are not UTF-8.
pub fn decode(token: &str) -> Result<String> {
    let payload = token
        .get(TOKEN_PREFIX.len()..)
        .ok_or_else(|| AppError::Codec("token shorter than header".into()))?;
    let raw = BASE64
        .decode(payload)
        .map_err(|e| AppError::Codec(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(raw)
        .map_err(|e| AppError::Codec(format!("invalid UTF-8 payload: {}", e)))?;
    // The escape pass runs on decode as well; the endpoint does the same.
    let resolved = resolve_escapes(&text);
    let unquoted = urlencoding::decode(&resolved)
        .map_err(|e| AppError::Codec(format!("invalid percent encoding: {}", e)))?;
    Ok(unrotate(&unquoted))
}

/// Split point for the midpoint rotation: ceil(chars / 2).
fn split_point(char_count: usize) -> usize {
    char_count.div_ceil(2)
}

/// Byte index of the nth character, or the string length past the end.
fn char_boundary(s: &str, nth: usize) -> usize {
    s.char_indices().nth(nth).map(|(i, _)| i).unwrap_or(s.len())
}

/// Move the first ceil(n/2) characters to the back.
fn rotate(s: &str) -> String {
    let t = split_point(s.chars().count());
    let at = char_boundary(s, t);
    format!("{}{}", &s[at..], &s[..at])
}

/// Inverse of [`rotate`]: the original head (ceil(n/2) characters) sits at
/// the tail, so split n - ceil(n/2) characters in. Distinct from `rotate`
/// for odd lengths.
fn unrotate(s: &str) -> String {
    let n = s.chars().count();
    let at = char_boundary(s, n - split_point(n));
    format!("{}{}", &s[at..], &s[..at])
}

/// Resolve literal backslash escape sequences to the characters they
/// represent, leaving anything unrecognized (including malformed hex
/// escapes) verbatim. Borrows when there is nothing to do, which is the
/// case for every ordinary parameter value.
fn resolve_escapes(s: &str) -> Cow<'_, str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => match take_hex(&mut chars, 2) {
                Some(ch) => out.push(ch),
                None => out.push_str("\\x"),
            },
            Some('u') => match take_hex(&mut chars, 4) {
                Some(ch) => out.push(ch),
                None => out.push_str("\\u"),
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

/// Consume exactly `n` hex digits and return the character they encode.
/// Leaves the iterator untouched when the digits are missing or invalid.
fn take_hex(chars: &mut Chars<'_>, n: usize) -> Option<char> {
    let mut probe = chars.clone();
    let mut value = 0u32;
    for _ in 0..n {
        value = value * 16 + probe.next()?.to_digit(16)?;
    }
    let ch = char::from_u32(value)?;
    *chars = probe;
    Some(ch)
}
