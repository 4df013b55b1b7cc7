//! Legacy text key lists
//!
//! ```text
//! <scheme-0 fingerprint>
//!
//! label one
//! label two
//! ```
//!
//! The oldest lists have no header at all, only labels. Labels are taken
//! verbatim (a trailing space changes the derived password), blank lines
//! are skipped.

use passgen_core::{
    DocumentError, Entry, KeyListDocument, MasterFingerprint, SchemeVersion,
    DEFAULT_ITERATION_COUNT,
};

/// Build a document from the contents of a legacy `.keys` file.
///
/// With a header the document starts on scheme 0 and is migrated by the
/// next verification. Without one there is no fingerprint to migrate, so
/// the document starts on the current scheme.
pub fn parse_legacy(text: &str) -> Result<KeyListDocument, DocumentError> {
    let lines: Vec<&str> = text.lines().collect();
    let has_header = lines.get(1).is_some_and(|line| line.is_empty());

    let (version, hash, labels) = if has_header {
        let hash = Some(lines[0].trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        (SchemeVersion::HmacCheck, hash, &lines[2..])
    } else {
        (SchemeVersion::CURRENT, None, &lines[..])
    };

    let entries = labels
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| Entry::new(*line))
        .collect();

    KeyListDocument::from_parts(
        version,
        MasterFingerprint::from_parts(hash, None, DEFAULT_ITERATION_COUNT),
        entries,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use passgen_core::OutputMode;

    const V0_HUNTER2: &str = "Zyw5EYrZNCf4fkQMHwU5cPB+sXgg95sYjOnyETfy+3E=";

    #[test]
    fn test_parse_with_header() {
        let text = format!("{V0_HUNTER2}\n\nexample.com\ngithub\n");
        let doc = parse_legacy(&text).unwrap();

        assert_eq!(doc.scheme_version(), SchemeVersion::HmacCheck);
        assert_eq!(doc.master().hash(), Some(V0_HUNTER2));
        assert!(doc.master().salt().is_none());
        assert_eq!(doc.master().iteration_count(), DEFAULT_ITERATION_COUNT);

        let labels: Vec<&str> = doc.labels().collect();
        assert_eq!(labels, ["example.com", "github"]);
        for entry in doc.entries() {
            assert_eq!(entry.output_mode, OutputMode::Base64);
            assert_eq!(entry.max_length, None);
            assert_eq!(entry.change_counter, None);
        }
    }

    #[test]
    fn test_parse_crlf() {
        let text = format!("{V0_HUNTER2}\r\n\r\nexample.com\r\ngithub\r\n");
        let doc = parse_legacy(&text).unwrap();
        assert_eq!(doc.master().hash(), Some(V0_HUNTER2));
        let labels: Vec<&str> = doc.labels().collect();
        assert_eq!(labels, ["example.com", "github"]);
    }

    #[test]
    fn test_labels_are_verbatim_and_blank_lines_skipped() {
        let text = format!("{V0_HUNTER2}\n\n with space \n\nlast");
        let doc = parse_legacy(&text).unwrap();
        let labels: Vec<&str> = doc.labels().collect();
        assert_eq!(labels, [" with space ", "last"]);
    }

    #[test]
    fn test_header_with_blank_fingerprint() {
        let doc = parse_legacy("\n\nexample.com\n").unwrap();
        assert_eq!(doc.scheme_version(), SchemeVersion::HmacCheck);
        assert!(doc.master().hash().is_none());
        assert_eq!(doc.entries().len(), 1);
    }

    #[test]
    fn test_parse_without_header() {
        let doc = parse_legacy("example.com\ngithub\n").unwrap();
        assert_eq!(doc.scheme_version(), SchemeVersion::CURRENT);
        assert!(doc.master().hash().is_none());
        let labels: Vec<&str> = doc.labels().collect();
        assert_eq!(labels, ["example.com", "github"]);
    }

    #[test]
    fn test_parse_empty() {
        let doc = parse_legacy("").unwrap();
        assert!(doc.entries().is_empty());
        assert!(doc.master().hash().is_none());
    }

    #[test]
    fn test_garbage_fingerprint_rejected() {
        let result = parse_legacy("not-a-fingerprint\n\nexample.com\n");
        assert!(matches!(result, Err(DocumentError::Malformed(_))));
    }
}
