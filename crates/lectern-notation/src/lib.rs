//! Math notation conversion for the Lectern tutor.
//!
//! Users type shorthand like `x^2` or `a_1`; the renderer consumes
//! delimited canonical markup like `$x^{2}$`. This crate provides the two
//! transforms between those forms:
//!
//! - [`shorthand_to_canonical`] — shorthand in, delimited markup out
//! - [`canonical_to_raw`] — strips one layer of delimiters for the renderer
//!
//! Both are pure string transforms with no I/O. Malformed shorthand fails
//! soft: the converter never errors, and any markup the renderer cannot
//! parse surfaces as a renderer-level error in the consuming component.

use once_cell::sync::Lazy;
use regex::Regex;

/// `base^exp` where base and exp are maximal alphanumeric runs.
static EXPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9]+)\^([A-Za-z0-9]+)").unwrap());

/// `base_sub` where base and sub are maximal alphanumeric runs.
static SUBSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9]+)_([A-Za-z0-9]+)").unwrap());

/// Delimiter pairs recognized by [`canonical_to_raw`].
const DELIMITER_PAIRS: &[(&str, &str)] = &[("$", "$"), ("\\(", "\\)"), ("\\[", "\\]")];

/// Converts user-typed math shorthand to delimited canonical markup.
///
/// Caret-exponent patterns (`x^2`) become braced exponents (`x^{2}`) and
/// underscore-subscript patterns (`a_1`) become braced subscripts
/// (`a_{1}`); the result is wrapped in `$ … $`. Input that already carries
/// a recognized delimiter pair is unwrapped first and re-wrapped after, so
/// the conversion is idempotent on canonical input.
///
/// Empty (or whitespace-only) input maps to the empty string with no
/// delimiters added.
pub fn shorthand_to_canonical(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let inner = strip_delimiters(trimmed);
    // ${1} instead of $1: a bare $1 before `_` would parse as the group
    // name "1_" in regex replacement syntax.
    let with_exponents = EXPONENT.replace_all(inner, "${1}^{${2}}");
    let with_subscripts = SUBSCRIPT.replace_all(&with_exponents, "${1}_{${2}}");

    format!("${}$", with_subscripts)
}

/// Strips exactly one layer of math delimiters for the renderer.
///
/// Recognizes `$ … $`, `\( … \)`, and `\[ … \]`. Input with no
/// recognized delimiter pair is returned unchanged (after trimming). Exact
/// inverse of the wrapping step in [`shorthand_to_canonical`] for
/// well-formed input.
pub fn canonical_to_raw(input: &str) -> String {
    strip_delimiters(input.trim()).to_string()
}

/// Returns the content inside the first recognized delimiter pair, or the
/// input unchanged when no pair matches.
fn strip_delimiters(trimmed: &str) -> &str {
    for (open, close) in DELIMITER_PAIRS {
        if trimmed.len() >= open.len() + close.len()
            && trimmed.starts_with(open)
            && trimmed.ends_with(close)
        {
            return &trimmed[open.len()..trimmed.len() - close.len()];
        }
    }
    trimmed
}
