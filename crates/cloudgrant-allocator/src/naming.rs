//! Project Name Generator
//!
//! `<title truncated>-f<6 hex digits>`. The suffix comes from the OS random
//! source; collisions are negligible but possible and are not retried.

use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes in the suffix
const SUFFIX_BYTES: usize = 3;

/// Rendered width of `-f` plus six hex digits
pub const SUFFIX_WIDTH: usize = "-f".len() + 2 * SUFFIX_BYTES;

/// Generate a project name no longer than `max_length` characters.
///
/// The title is cut to leave exactly [`SUFFIX_WIDTH`] characters for the
/// suffix. Length is counted in characters, not bytes.
pub fn unique_project_name(title: &str, max_length: Option<usize>) -> String {
    let mut bytes = [0u8; SUFFIX_BYTES];
    OsRng.fill_bytes(&mut bytes);

    let base: String = match max_length {
        Some(max) => title.chars().take(max.saturating_sub(SUFFIX_WIDTH)).collect(),
        None => title.to_string(),
    };

    format!("{}-f{}", base, hex::encode(bytes))
}
