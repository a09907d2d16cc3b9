//! Forward declarations from generated bodies.
//!
//! Headers and bodies are compiled separately, so the declaration must
//! match the definition exactly. It is derived textually from the body's
//! first line: qualifiers are dropped, the underscore-prefixed internal
//! name is mapped to the public one and the line becomes an `extern`
//! statement.

use crate::RenderError;

const QUALIFIERS: [&str; 4] = [
    "static ",
    "inline ",
    "HEDLEY_NEVER_INLINE ",
    "NUITKA_MAY_BE_UNUSED ",
];

const HELPER_PREFIXES: [&str; 3] = ["BINARY_OPERATION", "INPLACE_OPERATION", "RICH_COMPARE"];

/// `extern <signature>;` for the function defined by `body`.
pub fn extract_declaration(body: &str) -> Result<String, RenderError> {
    let first = body.lines().next().unwrap_or_default().trim();
    let mut signature = first.trim_end_matches('{').trim_end().to_owned();
    for qualifier in QUALIFIERS {
        signature = signature.replace(qualifier, "");
    }
    for prefix in HELPER_PREFIXES {
        signature = signature
            .replace(&format!("__{prefix}"), prefix)
            .replace(&format!("_{prefix}"), prefix);
    }
    if signature.is_empty() {
        return Err(RenderError::MissingSignature);
    }
    Ok(format!("extern {signature};"))
}
