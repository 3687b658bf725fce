//! Userscript metablock extraction.

/// Opening marker of a userscript metablock.
pub const META_START: &str = "==UserScript==";
/// Closing marker of a userscript metablock.
pub const META_END: &str = "==/UserScript==";

/// Fields extracted from a script source's metablock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMeta {
    /// Declared `@version` value, if any.
    pub version: Option<String>,
    /// Raw metablock text including both marker lines. Empty when the
    /// source has no complete block.
    pub meta_text: String,
}

/// Extract the `==UserScript==` block and its `@version` value.
///
/// A block counts only when both marker lines are present; otherwise the
/// result has an empty `meta_text` and no version.
pub fn parse_meta(code: &str) -> ParsedMeta {
    let Some(span) = metablock_span(code) else {
        return ParsedMeta::default();
    };
    let meta_text = code[span].to_owned();

    let mut version = None;
    for line in meta_text.lines() {
        let Some(rest) = line.trim_start().strip_prefix("//") else {
            continue;
        };
        if let Some(value) = rest.trim_start().strip_prefix("@version")
            && value.starts_with(char::is_whitespace)
        {
            let value = value.trim();
            if !value.is_empty() && version.is_none() {
                version = Some(value.to_owned());
            }
        }
    }

    ParsedMeta { version, meta_text }
}

/// Remove `meta_text` from `code`, returning the remainder.
///
/// An empty `meta_text` leaves the code untouched.
pub fn strip_metablock(code: &str, meta_text: &str) -> String {
    if meta_text.is_empty() {
        code.to_owned()
    } else {
        code.replacen(meta_text, "", 1)
    }
}

/// Byte range from the start of the line holding [`META_START`] through
/// the end of the line holding [`META_END`].
fn metablock_span(code: &str) -> Option<std::ops::Range<usize>> {
    let start_marker = code.find(META_START)?;
    let line_start = code[..start_marker].rfind('\n').map_or(0, |i| i + 1);
    let end_marker = code[start_marker..].find(META_END)? + start_marker;
    let line_end = code[end_marker..]
        .find('\n')
        .map_or(code.len(), |i| end_marker + i);
    Some(line_start..line_end)
}
