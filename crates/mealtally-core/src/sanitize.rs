//! File-name sanitizing for group names.
//!
//! Group names are free text chosen by chat users; they end up in ledger
//! and transcript file names, so characters that are invalid in a path
//! component on common filesystems are replaced.

/// Characters not allowed in a file name component.
const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace path-unsafe characters in `name` with `_`.
pub fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect()
}
