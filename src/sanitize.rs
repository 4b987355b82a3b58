//! Input sanitization for textual record fields.
//!
//! Log messages often carry user-controlled text. Before a field is written
//! anywhere it is rewritten so a single log call always produces a single
//! line of printable ASCII: newline runs collapse to one space (log-injection
//! guard), ANSI SGR escape sequences are stripped, and remaining
//! non-printable runs are removed.

use once_cell::sync::Lazy;
use regex::Regex;

static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").unwrap());
static ANSI_SGR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
static NON_PRINTABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x20-\x7E]+").unwrap());

/// Sanitize a text field for inclusion in a log record.
pub fn sanitize(input: &str) -> String {
    let s = NEWLINES.replace_all(input, " ");
    let s = ANSI_SGR.replace_all(&s, "");
    NON_PRINTABLE.replace_all(&s, "").into_owned()
}
