//! Hints Module
//!
//! Decoding of the ICCCM properties the core reads from clients:
//! window names, WM_CLASS and WM_PROTOCOLS.

use crate::wm::display::{Atom, ClassHint, Handle};

/// Sentinel for clients that publish no usable title/class
pub const BROKEN: &str = "broken";

/// Longest title/class string kept, in bytes
pub const MAX_TEXT_LEN: usize = 255;

/// Decode a text property value.
///
/// STRING is Latin-1 and UTF8_STRING is UTF-8; anything else is decoded
/// lossily. Trailing NULs are dropped and the result is bounded to
/// [`MAX_TEXT_LEN`] bytes on a character boundary. Returns `None` for an
/// empty value.
pub fn decode_text(value: &[u8], is_latin1: bool) -> Option<String> {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    let raw = &value[..end];
    if raw.is_empty() {
        return None;
    }

    let mut text = if is_latin1 {
        raw.iter().map(|&b| b as char).collect::<String>()
    } else {
        String::from_utf8_lossy(raw).into_owned()
    };
    truncate_to(&mut text, MAX_TEXT_LEN);
    Some(text)
}

fn truncate_to(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Parse WM_CLASS: `instance\0class\0`
pub fn parse_wm_class(value: &[u8]) -> ClassHint {
    let mut parts = value.split(|&b| b == 0);
    let mut next = || parts.next().and_then(|part| decode_text(part, true));
    let instance = next();
    let class = next();
    ClassHint { instance, class }
}

/// Whether a WM_PROTOCOLS list advertises `protocol`
pub fn has_protocol(protocols: impl IntoIterator<Item = Atom>, protocol: Atom) -> bool {
    protocols.into_iter().any(|p| p == protocol)
}

/// WM_TRANSIENT_FOR value as a parent window; None (0) means no parent
pub fn transient_parent(value: Option<u32>) -> Option<Handle> {
    value.filter(|&parent| parent != 0)
}

/// Title/class/instance as reported to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub class: String,
    pub instance: String,
}

impl Metadata {
    /// Resolve the reported strings, falling back to [`BROKEN`] for each
    /// field independently.
    pub fn resolve(
        net_wm_name: Option<String>,
        wm_name: Option<String>,
        class_hint: Option<ClassHint>,
    ) -> Self {
        let title = net_wm_name
            .or(wm_name)
            .unwrap_or_else(|| BROKEN.to_string());
        let ClassHint { instance, class } = class_hint.unwrap_or_default();
        Self {
            title,
            class: class.unwrap_or_else(|| BROKEN.to_string()),
            instance: instance.unwrap_or_else(|| BROKEN.to_string()),
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::resolve(None, None, None)
    }
}
