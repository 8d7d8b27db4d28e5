//! Cheap structural sanity check for downloaded pricing documents.
//!
//! Runs before full deserialization so that payloads damaged on the
//! provider side (truncated uploads, documents stored byte-by-byte as an
//! index-keyed object) are rejected without paying the parse cost.

/// Why a payload was judged structurally corrupt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("payload is empty")]
    Empty,

    #[error("payload does not start with a JSON object")]
    NotAnObject,

    #[error("payload is stored byte-by-byte as an index-keyed object")]
    ByteIndexed,

    #[error("unbalanced '{open}{close}' delimiters (depth {depth} at end of payload)")]
    Unbalanced { open: char, close: char, depth: i64 },

    #[error("unexpected '{0}' before its opening delimiter")]
    UnexpectedClose(char),

    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Check that `payload` looks like a single, complete JSON object.
///
/// Counts `{}` and `[]` outside of string literals; any imbalance is
/// reported as [`StructureError`]. This never allocates.
pub fn check_structure(payload: &[u8]) -> Result<(), StructureError> {
    let body = trim_leading(payload);
    if body.is_empty() {
        return Err(StructureError::Empty);
    }
    if body[0] != b'{' {
        return Err(StructureError::NotAnObject);
    }
    if is_byte_indexed(body) {
        return Err(StructureError::ByteIndexed);
    }

    let mut braces: i64 = 0;
    let mut brackets: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for &b in body {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => braces += 1,
            b'}' => {
                braces -= 1;
                if braces < 0 {
                    return Err(StructureError::UnexpectedClose('}'));
                }
            }
            b'[' => brackets += 1,
            b']' => {
                brackets -= 1;
                if brackets < 0 {
                    return Err(StructureError::UnexpectedClose(']'));
                }
            }
            _ => {}
        }
    }

    if in_string {
        return Err(StructureError::UnterminatedString);
    }
    if braces != 0 {
        return Err(StructureError::Unbalanced {
            open: '{',
            close: '}',
            depth: braces,
        });
    }
    if brackets != 0 {
        return Err(StructureError::Unbalanced {
            open: '[',
            close: ']',
            depth: brackets,
        });
    }
    Ok(())
}

/// Skip a UTF-8 BOM and leading ASCII whitespace.
fn trim_leading(payload: &[u8]) -> &[u8] {
    let payload = payload.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(payload);
    let start = payload
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(payload.len());
    &payload[start..]
}

/// Detect `{"0":"{","1":"\"",...}`: a document serialized one byte per key.
fn is_byte_indexed(body: &[u8]) -> bool {
    let rest = trim_leading(&body[1..]);
    rest.starts_with(b"\"0\"") && trim_leading(&rest[3..]).first() == Some(&b':')
}
