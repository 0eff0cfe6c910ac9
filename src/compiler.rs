//! Signature → pattern expression compiler
//!
//! Every backend consumes the same expression text. Exact bytes are written
//! as `\xNN` escapes, which both the Rust regex syntax (with Unicode mode
//! off) and the Hyperscan/Vectorscan dialect read as a single raw byte.
//! Flags are not embedded; each backend applies dot-all and, for text
//! signatures, case-insensitivity in its own way.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::events::{Event, EventSink};
use crate::signature::{SignatureDefinition, SignatureKind, decode_hex, looks_like_hex};

/// Where binary headers are allowed to match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchoring {
    /// Headers must sit at offset 0
    #[default]
    Start,
    /// Headers match anywhere in the buffer, for captured byte streams
    /// where objects do not begin at offset 0
    Unanchored,
}

/// One signature, ready to feed a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPattern {
    pub name: String,
    pub expression: String,
    pub caseless: bool,
    pub priority: i32,
    pub min_file_size: u64,
}

impl CompiledPattern {
    /// True if a buffer of `len` bytes is long enough for this signature
    #[inline]
    pub fn applies_to(&self, len: usize) -> bool {
        len as u64 >= self.min_file_size
    }
}

/// Compiled signatures in scan order (priority descending, ties keep input order)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    pub fn new(mut patterns: Vec<CompiledPattern>) -> Self {
        patterns.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { patterns }
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CompiledPattern> {
        self.patterns.get(index)
    }
}

/// Writes each byte as a `\xNN` escape
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4);
    for b in bytes {
        // writing into a String cannot fail
        let _ = write!(out, "\\x{b:02X}");
    }
    out
}

/// Builds the expression for one signature.
///
/// Returns `None` when no field yields a pattern. Invalid hex fields are
/// reported to `sink` and treated as absent.
pub fn compile_signature(
    sig: &SignatureDefinition,
    anchoring: Anchoring,
    sink: &dyn EventSink,
) -> Option<CompiledPattern> {
    let expression = match sig.kind {
        SignatureKind::Text => non_empty(sig.text_pattern.clone())?,
        SignatureKind::Binary => binary_expression(sig, anchoring, sink)?,
    };

    Some(CompiledPattern {
        name: sig.name.clone(),
        expression,
        caseless: sig.kind == SignatureKind::Text,
        priority: sig.priority,
        min_file_size: sig.min_file_size,
    })
}

fn binary_expression(
    sig: &SignatureDefinition,
    anchoring: Anchoring,
    sink: &dyn EventSink,
) -> Option<String> {
    let head = hex_field(sig, "hex_head", &sig.hex_head, sink);
    let tail = hex_field(sig, "hex_tail", &sig.hex_tail, sink);
    let marker = if looks_like_hex(&sig.text_pattern) {
        hex_field(sig, "pattern", &sig.text_pattern, sink)
    } else {
        non_empty(sig.text_pattern.clone())
    };

    let Some(head) = head else {
        return marker.or(tail);
    };

    let anchor = match anchoring {
        Anchoring::Start => "^",
        Anchoring::Unanchored => "",
    };
    // lazy gap keeps the match local instead of spanning to the last trailer
    Some(match tail.or(marker) {
        Some(rest) => format!("{anchor}{head}.*?{rest}"),
        None => format!("{anchor}{head}"),
    })
}

fn hex_field(
    sig: &SignatureDefinition,
    label: &str,
    field: &str,
    sink: &dyn EventSink,
) -> Option<String> {
    if field.is_empty() {
        return None;
    }
    match decode_hex(field) {
        Ok(bytes) if !bytes.is_empty() => Some(escape_bytes(&bytes)),
        Ok(_) => None,
        Err(e) => {
            sink.emit(Event::signature_warning(
                &sig.name,
                format!("ignoring invalid {label}: {e}"),
            ));
            None
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Compiles a whole set, excluding signatures with nothing usable
pub fn compile_set(
    signatures: &[SignatureDefinition],
    anchoring: Anchoring,
    sink: &dyn EventSink,
) -> PatternSet {
    let patterns = signatures
        .iter()
        .filter_map(|sig| {
            let compiled = compile_signature(sig, anchoring, sink);
            if compiled.is_none() {
                sink.emit(Event::signature_warning(
                    &sig.name,
                    "no usable pattern, excluded from scanning",
                ));
            }
            compiled
        })
        .collect();
    PatternSet::new(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingSink, NullSink, Severity};

    fn expr(sig: &SignatureDefinition) -> Option<String> {
        compile_signature(sig, Anchoring::Unanchored, &NullSink).map(|c| c.expression)
    }

    #[test]
    fn test_escape_bytes() {
        assert_eq!(escape_bytes(&[0x25, 0x50, 0x00, 0xFF]), r"\x25\x50\x00\xFF");
    }

    #[test]
    fn test_head_only() {
        let sig = SignatureDefinition::binary("PDF", "25504446");
        assert_eq!(expr(&sig).as_deref(), Some(r"\x25\x50\x44\x46"));
    }

    #[test]
    fn test_head_and_tail_uses_lazy_gap() {
        let sig = SignatureDefinition::binary("JPG", "FFD8FF").with_tail("FFD9");
        assert_eq!(expr(&sig).as_deref(), Some(r"\xFF\xD8\xFF.*?\xFF\xD9"));
    }

    #[test]
    fn test_head_with_text_marker() {
        let sig = SignatureDefinition::binary("DOCX", "504B0304").with_pattern("word/document.xml");
        assert_eq!(
            expr(&sig).as_deref(),
            Some(r"\x50\x4B\x03\x04.*?word/document.xml")
        );
    }

    #[test]
    fn test_hex_marker_is_converted() {
        let sig = SignatureDefinition::binary("DOC", "D0CF").with_pattern("5700");
        assert_eq!(expr(&sig).as_deref(), Some(r"\xD0\xCF.*?\x57\x00"));
    }

    #[test]
    fn test_tail_wins_over_marker() {
        let sig = SignatureDefinition::binary("X", "AA").with_tail("BB").with_pattern("marker");
        assert_eq!(expr(&sig).as_deref(), Some(r"\xAA.*?\xBB"));
    }

    #[test]
    fn test_fallback_without_head() {
        let marker_only = SignatureDefinition::binary("M", "").with_pattern("ustar");
        assert_eq!(expr(&marker_only).as_deref(), Some("ustar"));

        let tail_only = SignatureDefinition::binary("T", "").with_tail("FFD9");
        assert_eq!(expr(&tail_only).as_deref(), Some(r"\xFF\xD9"));
    }

    #[test]
    fn test_default_anchors_binary_heads_only() {
        assert_eq!(Anchoring::default(), Anchoring::Start);
        let pdf = SignatureDefinition::binary("PDF", "25504446");
        let compiled = compile_signature(&pdf, Anchoring::default(), &NullSink).unwrap();
        assert_eq!(compiled.expression, r"^\x25\x50\x44\x46");

        let html = SignatureDefinition::text("HTML", "<html");
        let compiled = compile_signature(&html, Anchoring::default(), &NullSink).unwrap();
        assert_eq!(compiled.expression, "<html");
    }

    #[test]
    fn test_anchored_head() {
        let sig = SignatureDefinition::binary("PDF", "25504446");
        let compiled = compile_signature(&sig, Anchoring::Start, &NullSink).unwrap();
        assert_eq!(compiled.expression, r"^\x25\x50\x44\x46");
    }

    #[test]
    fn test_text_kind_is_verbatim_and_caseless() {
        let sig = SignatureDefinition::text("HTML", "<html");
        let compiled = compile_signature(&sig, Anchoring::Start, &NullSink).unwrap();
        assert_eq!(compiled.expression, "<html");
        assert!(compiled.caseless);
    }

    #[test]
    fn test_invalid_head_falls_back_to_tail() {
        let sink = CollectingSink::new();
        let sig = SignatureDefinition::binary("PDF", "255").with_tail("2525454F46");
        let compiled = compile_signature(&sig, Anchoring::Unanchored, &sink).unwrap();
        assert_eq!(compiled.expression, r"\x25\x25\x45\x4F\x46");
        assert_eq!(sink.count(Severity::Warn), 1);
    }

    #[test]
    fn test_compile_set_excludes_empty_and_sorts_by_priority() {
        let sink = CollectingSink::new();
        let sigs = vec![
            SignatureDefinition::binary("RAR4", "526172211A0700").with_priority(1),
            SignatureDefinition::binary("EMPTY", ""),
            SignatureDefinition::binary("RAR5", "526172211A070100").with_priority(2),
        ];
        let set = compile_set(&sigs, Anchoring::Unanchored, &sink);

        let names: Vec<_> = set.patterns().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["RAR5", "RAR4"]);
        assert_eq!(sink.for_signature("EMPTY").len(), 1);
    }

    #[test]
    fn test_min_file_size_gate() {
        let sig = SignatureDefinition::binary("PNG", "89504E47").with_min_file_size(64);
        let compiled = compile_signature(&sig, Anchoring::Unanchored, &NullSink).unwrap();
        assert!(!compiled.applies_to(63));
        assert!(compiled.applies_to(64));
    }
}
