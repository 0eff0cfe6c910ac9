//! Loads signature definitions from JSON
//!
//! The file is a JSON array of objects:
//!
//! ```json
//! [
//!   { "name": "PDF", "type": "binary", "hex_head": "25504446" },
//!   { "name": "HTML", "type": "text", "pattern": "<html" }
//! ]
//! ```
//!
//! Entries are decoded one by one so a single malformed object only costs
//! that signature. The result has already been through
//! [`signature::sanitize`](crate::signature::sanitize).

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, ScanError};
use crate::events::{Event, EventSink, Severity, Subject};
use crate::signature::{SignatureDefinition, sanitize};

const BUILTIN_SIGNATURES: &str = include_str!("../signatures.json");

/// Reads and validates a signature file.
pub fn load_signatures(path: &Path, sink: &dyn EventSink) -> Result<Vec<SignatureDefinition>> {
    let text = fs::read_to_string(path)?;
    parse_signatures(&text, sink)
}

/// Parses and validates signature JSON.
///
/// Fails only if the text is not JSON or the root is not an array.
pub fn parse_signatures(json: &str, sink: &dyn EventSink) -> Result<Vec<SignatureDefinition>> {
    let root: Value = serde_json::from_str(json)?;
    let Value::Array(items) = root else {
        return Err(ScanError::InvalidConfig(
            "signature file root must be an array".to_string(),
        ));
    };

    let mut signatures = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let name = item.get("name").and_then(Value::as_str).map(str::to_string);
        let Some(name) = name else {
            sink.emit(Event::new(
                Severity::Warn,
                Subject::Run,
                format!("signature entry #{index} has no name, skipped"),
            ));
            continue;
        };
        match serde_json::from_value::<SignatureDefinition>(item) {
            Ok(sig) => signatures.push(sig),
            Err(e) => sink.emit(Event::signature_warning(
                &name,
                format!("malformed entry skipped: {e}"),
            )),
        }
    }

    Ok(sanitize(signatures, sink))
}

/// The signature set shipped with the crate.
pub fn builtin_signatures(sink: &dyn EventSink) -> Result<Vec<SignatureDefinition>> {
    parse_signatures(BUILTIN_SIGNATURES, sink)
}
