//! Signature definitions
//!
//! A signature names one file format and describes how to recognise it from
//! content alone: a hex header and/or trailer for binary formats, or a
//! regular expression for text formats. The correction pipeline also reads
//! the relational fields (`deduct_from`, `exclusive_with`, `priority`).

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{Event, EventSink, Severity, Subject};

/// How a signature's pattern is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    /// Hex magic bytes, optionally with a text/hex marker
    #[default]
    Binary,
    /// Case-insensitive regular expression over the raw bytes
    Text,
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureKind::Binary => f.write_str("binary"),
            SignatureKind::Text => f.write_str("text"),
        }
    }
}

/// One declarative signature
///
/// Read-only to the scanning core. Empty strings mean "field not set".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignatureDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: SignatureKind,
    #[serde(default)]
    pub hex_head: String,
    #[serde(default)]
    pub hex_tail: String,
    #[serde(rename = "pattern", default)]
    pub text_pattern: String,
    /// Informational only
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduct_from: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub min_file_size: u64,
    #[serde(default)]
    pub exclusive_with: Vec<String>,
}

impl SignatureDefinition {
    /// Creates a binary signature from a hex header
    pub fn binary(name: impl Into<String>, hex_head: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SignatureKind::Binary,
            hex_head: hex_head.into(),
            ..Self::default()
        }
    }

    /// Creates a text signature from a regular expression
    pub fn text(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SignatureKind::Text,
            text_pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn with_tail(mut self, hex_tail: impl Into<String>) -> Self {
        self.hex_tail = hex_tail.into();
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.text_pattern = pattern.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_min_file_size(mut self, min_file_size: u64) -> Self {
        self.min_file_size = min_file_size;
        self
    }

    pub fn deducted_from(mut self, parent: impl Into<String>) -> Self {
        self.deduct_from = Some(parent.into());
        self
    }

    pub fn exclusive_with(mut self, other: impl Into<String>) -> Self {
        self.exclusive_with.push(other.into());
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// True if no field can produce a pattern
    pub fn is_empty(&self) -> bool {
        self.hex_head.is_empty() && self.hex_tail.is_empty() && self.text_pattern.is_empty()
    }
}

/// Checks that a hex field has even length and only hex digits.
///
/// Whitespace between byte pairs is accepted (`"50 4B 03 04"`).
pub fn decode_hex(field: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact)
}

/// True for a non-empty, even-length, all-hex string.
///
/// Used to decide whether a binary signature's `pattern` is a hex marker
/// (UTF-16 stream names inside OLE files) or plain text.
pub fn looks_like_hex(field: &str) -> bool {
    !field.is_empty() && field.len() % 2 == 0 && field.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Repairs a signature set in place
///
/// * hex fields that fail [`decode_hex`] are cleared and reported
/// * signatures left with no usable field are dropped
/// * duplicate names keep the first occurrence
/// * dangling `deduct_from`/`exclusive_with` references are reported at
///   info level and kept; the correction passes treat them as no-ops
pub fn sanitize(
    signatures: Vec<SignatureDefinition>,
    sink: &dyn EventSink,
) -> Vec<SignatureDefinition> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(signatures.len());

    for mut sig in signatures {
        if sig.name.trim().is_empty() {
            sink.emit(Event::new(
                Severity::Warn,
                Subject::Run,
                "skipping signature without a name",
            ));
            continue;
        }
        if !seen.insert(sig.name.clone()) {
            sink.emit(Event::signature_warning(
                &sig.name,
                "duplicate signature name, keeping the first definition",
            ));
            continue;
        }

        clear_invalid_hex(&mut sig, sink);

        if sig.is_empty() {
            sink.emit(Event::signature_warning(
                &sig.name,
                "no usable pattern fields left, signature dropped",
            ));
            continue;
        }
        kept.push(sig);
    }

    report_dangling(&kept, sink);
    kept
}

fn clear_invalid_hex(sig: &mut SignatureDefinition, sink: &dyn EventSink) {
    if sig.kind != SignatureKind::Binary {
        return;
    }
    let name = sig.name.clone();
    for (label, field) in [("hex_head", &mut sig.hex_head), ("hex_tail", &mut sig.hex_tail)] {
        if field.is_empty() {
            continue;
        }
        if let Err(e) = decode_hex(field) {
            sink.emit(Event::signature_warning(
                &name,
                format!("invalid {label} {field:?} cleared: {e}"),
            ));
            field.clear();
        }
    }
}

fn report_dangling(signatures: &[SignatureDefinition], sink: &dyn EventSink) {
    let names: HashSet<&str> = signatures.iter().map(|s| s.name.as_str()).collect();

    for sig in signatures {
        let references = sig
            .deduct_from
            .iter()
            .chain(sig.exclusive_with.iter())
            .filter(|r| !names.contains(r.as_str()));
        for missing in references {
            sink.emit(Event::new(
                Severity::Info,
                Subject::Signature(sig.name.clone()),
                format!("references unknown signature {missing}"),
            ));
        }
    }
}
