use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every scalar rewrite compiles down to one of these. The span is located by
/// the YAML editor; applying it is plain splicing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until applied"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in text of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("overlapping edits at bytes {first_start} and {second_start}")]
    Overlap {
        first_start: usize,
        second_start: usize,
    },

    #[error("edit splits a UTF-8 character at byte {0}")]
    NotCharBoundary(usize),
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    /// Edit was spliced into the text
    Applied { bytes_changed: usize },
    /// Current text already equals new_text
    AlreadyApplied,
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Validate the edit against the given text.
    ///
    /// Returns the current text at [byte_start, byte_end) if validation succeeds.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }
        for offset in [self.byte_start, self.byte_end] {
            if !content.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary(offset));
            }
        }

        let current = &content[self.byte_start..self.byte_end];

        // Idempotency: already holds the new text
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Apply multiple edits to the same text in one pass.
    ///
    /// Edits are applied bottom-to-top so earlier offsets stay valid. Results
    /// come back in the order the edits were given.
    pub fn apply_batch(
        content: &str,
        edits: Vec<Edit>,
    ) -> Result<(String, Vec<EditResult>), EditError> {
        let mut order: Vec<usize> = (0..edits.len()).collect();
        order.sort_by(|&a, &b| edits[b].byte_start.cmp(&edits[a].byte_start));

        for edit in &edits {
            edit.validate(content)?;
        }

        for window in order.windows(2) {
            let (later, earlier) = (&edits[window[0]], &edits[window[1]]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::Overlap {
                    first_start: earlier.byte_start,
                    second_start: later.byte_start,
                });
            }
        }

        let mut updated = content.to_string();
        let mut results = vec![EditResult::AlreadyApplied; edits.len()];

        for index in order {
            let edit = &edits[index];
            if updated[edit.byte_start..edit.byte_end] == edit.new_text {
                continue;
            }
            updated.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
            results[index] = EditResult::Applied {
                bytes_changed: edit.new_text.len(),
            };
        }

        Ok((updated, results))
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write lands at `path` or nothing there changes. An existing
/// file keeps its permissions.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("hello world".to_string());
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&text));
        assert!(!verify.matches("x"));
    }

    fn apply_one(edit: Edit, content: &str) -> Result<(String, EditResult), EditError> {
        let (updated, mut results) = Edit::apply_batch(content, vec![edit])?;
        Ok((updated, results.remove(0)))
    }

    #[test]
    fn test_edit_validation_invalid_range() {
        let result = apply_one(Edit::new(5, 20, "replacement", ""), "hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_validation_inverted_range() {
        let result = apply_one(Edit::new(10, 5, "replacement", ""), "hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_rejects_split_character() {
        let result = apply_one(Edit::new(1, 2, "x", ""), "héllo");
        assert!(matches!(result, Err(EditError::NotCharBoundary(2))));
    }

    #[test]
    fn test_edit_before_text_mismatch() {
        let result = apply_one(Edit::new(0, 5, "HELLO", "howdy"), "hello world");
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_edit_apply_and_idempotency() {
        let edit = Edit::new(0, 5, "HELLO", "hello");
        let (updated, result) = apply_one(edit.clone(), "hello world").unwrap();
        assert_eq!(updated, "HELLO world");
        assert_eq!(result, EditResult::Applied { bytes_changed: 5 });

        let (again, result) = apply_one(edit, &updated).unwrap();
        assert_eq!(again, "HELLO world");
        assert_eq!(result, EditResult::AlreadyApplied);
    }

    #[test]
    fn test_batch_edits_out_of_order() {
        let content = "line1\nline2\nline3\n";
        let edits = vec![
            Edit::new(6, 11, "second line", "line2"),
            Edit::new(0, 5, "L1", "line1"),
            Edit::new(12, 17, "LINE3", "line3"),
        ];

        let (updated, results) = Edit::apply_batch(content, edits).unwrap();
        assert_eq!(updated, "L1\nsecond line\nLINE3\n");
        assert_eq!(
            results,
            [
                EditResult::Applied { bytes_changed: 11 },
                EditResult::Applied { bytes_changed: 2 },
                EditResult::Applied { bytes_changed: 5 },
            ]
        );
    }

    #[test]
    fn test_batch_reports_already_applied_per_edit() {
        let content = "a: \"x\"\nb: y\n";
        let edits = vec![Edit::new(3, 6, "\"x\"", "\"x\""), Edit::new(10, 11, "\"y\"", "y")];
        let (updated, results) = Edit::apply_batch(content, edits).unwrap();
        assert_eq!(updated, "a: \"x\"\nb: \"y\"\n");
        assert_eq!(
            results,
            [
                EditResult::AlreadyApplied,
                EditResult::Applied { bytes_changed: 3 },
            ]
        );
    }

    #[test]
    fn test_batch_edits_overlap() {
        let edits = vec![Edit::new(0, 6, "a", "line1\n"), Edit::new(4, 8, "b", "1\nli")];
        let result = Edit::apply_batch("line1\nline2\n", edits);
        assert!(matches!(result, Err(EditError::Overlap { .. })));
    }

    #[test]
    fn test_atomic_write_replaces_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("out.yaml");
        fs::write(&file_path, b"original content that is longer").unwrap();

        atomic_write(&file_path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new");
    }

    #[test]
    fn test_atomic_write_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("missing").join("out.yaml");
        assert!(atomic_write(&file_path, b"data").is_err());
        assert!(!file_path.exists());
    }
}
