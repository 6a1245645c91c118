//! Tagged-field payload parser
//!
//! Legacy interchange records are UTF-8 byte payloads, one field per line:
//! a tag (three digits plus optional indicator characters) followed by
//! either a bare value (control fields) or `$$`-coded subfields:
//!
//! ```text
//! 001 666
//! 245 $$aThis is a citer record
//! 980 $$aHEP
//! 999C5 $$0667$$hAchasov, M.N.$$sPhys.Rev.,D97,012008$$y2018$$z0$$z1
//! ```

use thiserror::Error;

/// Why a legacy payload failed validation.
///
/// These never abort a batch; the offending record is skipped and the
/// error recorded on its mirror row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("missing control number (tag 001)")]
    MissingControlNumber,

    #[error("invalid control number: {0:?}")]
    InvalidControlNumber(String),

    #[error("missing collection (tag 980)")]
    MissingCollection,

    #[error("unknown collection: {0:?}")]
    UnknownCollection(String),

    #[error("invalid year in reference: {0:?}")]
    InvalidYear(String),

    #[error("malformed field on line {line}: {reason}")]
    MalformedField { line: usize, reason: String },
}

/// The value part of a field: bare for control fields, coded subfields otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bare(String),
    Subfields(Vec<(char, String)>),
}

/// One parsed field: tag (with indicators) plus its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub tag: String,
    pub value: FieldValue,
}

impl RawField {
    /// First subfield with the given code, if any
    pub fn subfield(&self, code: char) -> Option<&str> {
        match &self.value {
            FieldValue::Subfields(subs) => subs
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, v)| v.as_str()),
            FieldValue::Bare(_) => None,
        }
    }

    /// All subfields with the given code, in payload order
    pub fn subfields(&self, code: char) -> Vec<&str> {
        match &self.value {
            FieldValue::Subfields(subs) => subs
                .iter()
                .filter(|(c, _)| *c == code)
                .map(|(_, v)| v.as_str())
                .collect(),
            FieldValue::Bare(_) => Vec::new(),
        }
    }

    /// The bare value of a control field
    pub fn bare(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Bare(v) => Some(v.as_str()),
            FieldValue::Subfields(_) => None,
        }
    }
}

/// Parse a raw payload into its fields.
///
/// Field-level structure only; record-level validation (control number,
/// collection) happens in the transformer.
pub fn parse_fields(raw: &[u8]) -> Result<Vec<RawField>, ValidationError> {
    let text = std::str::from_utf8(raw).map_err(|_| ValidationError::InvalidUtf8)?;

    let mut fields = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (tag, rest) = match line.split_once(char::is_whitespace) {
            Some((tag, rest)) => (tag, rest.trim()),
            None => (line, ""),
        };

        if tag.len() < 3 || !tag.chars().take(3).all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::MalformedField {
                line: idx + 1,
                reason: format!("bad tag {:?}", tag),
            });
        }

        let value = if let Some(coded) = rest.strip_prefix("$$") {
            let mut subs = Vec::new();
            for part in coded.split("$$") {
                let mut chars = part.chars();
                let code = chars.next().ok_or_else(|| ValidationError::MalformedField {
                    line: idx + 1,
                    reason: "empty subfield".into(),
                })?;
                subs.push((code, chars.as_str().trim().to_string()));
            }
            FieldValue::Subfields(subs)
        } else {
            FieldValue::Bare(rest.to_string())
        };

        fields.push(RawField {
            tag: tag.to_string(),
            value,
        });
    }

    Ok(fields)
}

/// Split a legacy dump into per-record payloads (records separated by blank lines).
pub fn split_payloads(dump: &[u8]) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for line in dump.split(|b| *b == b'\n') {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            if !current.is_empty() {
                payloads.push(std::mem::take(&mut current));
            }
        } else {
            current.extend_from_slice(line);
            current.push(b'\n');
        }
    }
    if !current.is_empty() {
        payloads.push(current);
    }

    payloads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_and_data_fields() {
        let raw = b"001 666\n245 $$aThis is a title\n980 $$aHEP\n";
        let fields = parse_fields(raw).unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].tag, "001");
        assert_eq!(fields[0].bare(), Some("666"));
        assert_eq!(fields[1].subfield('a'), Some("This is a title"));
        assert_eq!(fields[2].subfield('a'), Some("HEP"));
    }

    #[test]
    fn parses_repeating_subfields_in_reference_block() {
        let raw = b"999C5 $$0667$$hAchasov, M.N.$$sPhys.Rev.,D97,012008$$y2018$$z0$$z1\n";
        let fields = parse_fields(raw).unwrap();

        let reference = &fields[0];
        assert_eq!(reference.tag, "999C5");
        assert_eq!(reference.subfield('0'), Some("667"));
        assert_eq!(reference.subfield('h'), Some("Achasov, M.N."));
        assert_eq!(reference.subfield('y'), Some("2018"));
        assert_eq!(reference.subfields('z'), vec!["0", "1"]);
    }

    #[test]
    fn rejects_non_utf8_payload() {
        let raw = [0x30, 0x30, 0x31, 0x20, 0xff, 0xfe];
        assert_eq!(parse_fields(&raw), Err(ValidationError::InvalidUtf8));
    }

    #[test]
    fn rejects_garbled_tag() {
        let err = parse_fields(b"zz 1\n").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedField { line: 1, .. }));
    }

    #[test]
    fn splits_dump_on_blank_lines() {
        let dump = b"001 1\n980 $$aHEP\n\n001 2\n980 $$aHEP\n\n\n001 3\n";
        let payloads = split_payloads(dump);
        assert_eq!(payloads.len(), 3);
        assert!(payloads[0].starts_with(b"001 1"));
        assert!(payloads[2].starts_with(b"001 3"));
    }
}
