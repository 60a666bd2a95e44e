//! Canonical payload encoding.
//!
//! Issuer and verifier must produce the exact same bytes for the same
//! logical payload, otherwise every signature fails. The encoding is JSON
//! with:
//! - object keys sorted lexicographically at every level
//! - `", "` between elements and `": "` between key and value
//! - everything outside printable ASCII escaped as `\uXXXX`
//!
//! For example `{"binds": {}, "customer": "Acme", "expiry": "2099-01-01"}`.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Serializer, Value};

use crate::error::LicenseResult;
use crate::license::LicensePayload;

/// Encodes a license payload into its canonical signing bytes.
pub fn encode_payload(payload: &LicensePayload) -> LicenseResult<Vec<u8>> {
    encode(payload)
}

/// Encodes any serializable value canonically.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> LicenseResult<Vec<u8>> {
    let value = sort_keys(serde_json::to_value(value)?);
    let mut serializer = Serializer::with_formatter(Vec::new(), CanonicalFormatter);
    value.serialize(&mut serializer)?;
    Ok(serializer.into_inner())
}

/// Rebuilds every object with its keys inserted in sorted order, so the
/// output does not depend on how `serde_json::Map` orders entries.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}
