//! Import of the status file written by earlier, properties-based releases.
//!
//! That file maps each module's local path to its fingerprint and sits next
//! to the current record as `modules-statuses.properties`. It is only read
//! while no current record exists; the first successful publish then writes
//! the current format and the legacy file is no longer consulted.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AutopublishError, Result};
use crate::logging::Logger;
use crate::state::{ModuleStatus, StatusRecord};

/// File name of the legacy status file.
pub const LEGACY_STATUS_FILE: &str = "modules-statuses.properties";

/// Version recorded for imported entries, which never stored one.
pub const IMPORTED_VERSION: u64 = 0;

/// Location of the legacy status file belonging to `status_path`.
pub fn legacy_status_path(status_path: &Path) -> PathBuf {
    status_path.with_file_name(LEGACY_STATUS_FILE)
}

/// Read the legacy status file next to `status_path`, if there is one.
///
/// A file that cannot be parsed is reported and ignored, which makes every
/// module republish once.
pub(crate) fn load_legacy_statuses(status_path: &Path, log: Logger) -> Result<Option<StatusRecord>> {
    let path = legacy_status_path(status_path);
    if !path.is_file() {
        return Ok(None);
    }

    let bytes = fs::read(&path).map_err(|source| AutopublishError::IoError {
        path: path.clone(),
        source,
    })?;

    let entries = match parse_properties(&decode(bytes)) {
        Ok(entries) => entries,
        Err(message) => {
            log.warn(format!(
                "Ignoring unreadable legacy status file at {} ({message}); every module will be \
                 republished.",
                path.display()
            ));
            return Ok(None);
        }
    };

    let mut record = StatusRecord::new();
    for (local_path, fingerprint) in entries {
        record.upsert(
            &local_path,
            ModuleStatus {
                fingerprint,
                version: IMPORTED_VERSION,
            },
        );
    }

    log.verbose(
        1,
        format!(
            "Imported {} module status(es) from {}",
            record.len(),
            path.display()
        ),
    );
    Ok(Some(record))
}

/// Files written through a character writer are UTF-8; files written
/// through a byte stream are ISO-8859-1 with everything else escaped.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

/// Parse a Java properties document into its entries, in file order.
///
/// Follows `java.util.Properties::load`: `\n`, `\r` and `\r\n` end natural
/// lines, an odd run of trailing backslashes continues a line, `#` and `!`
/// start comments, and the key ends at the first unescaped `=`, `:` or
/// blank. Later duplicates win, as they do there.
pub(crate) fn parse_properties(contents: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut entries: Vec<(String, String)> = Vec::new();

    for line in logical_lines(contents) {
        let (key, value) = split_key_value(&line);
        let key = unescape(key)?;
        let value = unescape(value)?;
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    Ok(entries)
}

/// Join continuation lines and drop comments and blank lines.
fn logical_lines(contents: &str) -> Vec<String> {
    let mut natural = Vec::new();
    let mut rest = contents;
    while !rest.is_empty() {
        match rest.find(['\n', '\r']) {
            Some(end) => {
                natural.push(&rest[..end]);
                let skip = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[end + skip..];
            }
            None => {
                natural.push(rest);
                rest = "";
            }
        }
    }

    let mut logical = Vec::new();
    let mut current: Option<String> = None;
    for line in natural {
        let trimmed = line.trim_start_matches(is_blank);
        let mut text = match current.take() {
            Some(pending) => pending + trimmed,
            None => {
                if trimmed.is_empty() || trimmed.starts_with(['#', '!']) {
                    continue;
                }
                trimmed.to_string()
            }
        };

        let trailing = text.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            text.pop();
            current = Some(text);
        } else {
            logical.push(text);
        }
    }
    if let Some(pending) = current {
        logical.push(pending);
    }
    logical
}

/// Split a logical line into its raw, still escaped, key and value.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    let mut has_separator = false;

    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = index;
                has_separator = true;
                break;
            }
            c if is_blank(c) => {
                key_end = index;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut value = &line[key_end..];
    if has_separator {
        value = &value[1..];
    }
    value = value.trim_start_matches(is_blank);
    if !has_separator {
        if let Some(stripped) = value.strip_prefix(['=', ':']) {
            value = stripped.trim_start_matches(is_blank);
        }
    }
    (key, value)
}

fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == 4)
                    .ok_or_else(|| format!("malformed \\uxxxx escape '\\u{digits}'"))?;
                // Surrogate halves cannot appear in fingerprints or paths.
                let decoded = char::from_u32(code)
                    .ok_or_else(|| format!("unsupported escape '\\u{digits}'"))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_entries() {
        let entries = parse_properties("#comment\n\n../lib=abc\n/abs/path : def\n").unwrap();
        assert_eq!(
            entries,
            vec![
                ("../lib".to_string(), "abc".to_string()),
                ("/abs/path".to_string(), "def".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_escapes_written_by_store() {
        // `Properties.store` escapes separators, leading blanks and control
        // characters; other Latin-1 characters are written as they are.
        let entries =
            parse_properties("../my\\ lib=\\ \\:\\=\\t\\n\\r\\f\\\\\u{ff}\u{1}\\u00e9\n").unwrap();
        assert_eq!(entries[0].0, "../my lib");
        assert_eq!(entries[0].1, " :=\t\n\r\u{c}\\\u{ff}\u{1}\u{e9}");
    }

    #[test]
    fn test_parse_continuation_and_line_endings() {
        let entries = parse_properties("a=one\\\n    two\rb=x\r\nc=\\\\\n").unwrap();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), "onetwo".to_string()),
                ("b".to_string(), "x".to_string()),
                ("c".to_string(), "\\".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_trailing_blanks_and_last_duplicate() {
        let entries = parse_properties("a=x \na=y\t\n").unwrap();
        assert_eq!(entries, vec![("a".to_string(), "y\t".to_string())]);
    }

    #[test]
    fn test_parse_rejects_malformed_unicode_escape() {
        assert!(parse_properties("a=\\u12\n").is_err());
        assert!(parse_properties("a=\\uzzzz\n").is_err());
    }

    #[test]
    fn test_decode_falls_back_to_latin1() {
        assert_eq!(decode(vec![b'a', 0xff, b'b']), "a\u{ff}b");
        assert_eq!(decode("é".as_bytes().to_vec()), "é");
    }
}
