//! Placeholder token vocabulary and literal substitution
//!
//! Templates in stage configuration are plain strings with literal
//! placeholder tokens. Substitution is exact substring replacement,
//! applied left-to-right over an ordered pair list. There is no escaping
//! and no pattern syntax; user templates rely on exact literal matching.

use std::env;
use std::path::PathBuf;

/// Per-item placeholder inside a category format template.
pub const FILE_TOKEN: &str = "{File}";

/// List placeholder for the included category in the master template.
pub const INCLUDED_FILE_LIST_TOKEN: &str = "{IncludedFileList}";

/// List placeholder for the excluded category in the master template.
pub const EXCLUDED_FILE_LIST_TOKEN: &str = "{ExcludedFileList}";

/// List placeholder for the external category in the master template.
pub const EXTERNAL_FILE_LIST_TOKEN: &str = "{ExternalFileList}";

/// Current user name.
pub const USER_TOKEN: &str = "{User}";

/// User-profile (home) directory.
pub const USER_DATA_TOKEN: &str = "{UserData}";

/// Program-files directory.
pub const PROGRAM_DATA_TOKEN: &str = "{ProgramData}";

/// Tokens that must never appear inside a user-supplied `commandValues`
/// key or value. A collision would make user substitutions ambiguous with
/// the pipeline's own list and per-item substitutions.
pub const RESERVED_TOKENS: [&str; 4] = [
    INCLUDED_FILE_LIST_TOKEN,
    EXCLUDED_FILE_LIST_TOKEN,
    EXTERNAL_FILE_LIST_TOKEN,
    FILE_TOKEN,
];

/// Applies an ordered list of `(token, replacement)` pairs to a template.
///
/// Each pair is a literal, non-regex substring replacement; pairs are
/// applied left-to-right, so an earlier replacement's output is visible to
/// later pairs.
pub fn substitute<K, V>(template: &str, pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = template.to_string();
    for (token, replacement) in pairs {
        out = out.replace(token.as_ref(), replacement.as_ref());
    }
    out
}

/// Substitutes the fixed environment tokens `{User}`, `{UserData}` and
/// `{ProgramData}` in a template.
pub fn substitute_environment(template: &str) -> String {
    substitute(
        template,
        &[
            (USER_TOKEN, user_name()),
            (USER_DATA_TOKEN, path_str(user_profile_dir())),
            (PROGRAM_DATA_TOKEN, path_str(program_files_dir())),
        ],
    )
}

fn user_name() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_default()
}

fn user_profile_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

fn program_files_dir() -> PathBuf {
    // Windows exposes this directly; elsewhere the closest analogue is the
    // local install prefix.
    env::var_os("ProgramFiles")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/usr/local"))
}

fn path_str(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
