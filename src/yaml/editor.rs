use crate::edit::{Edit, EditResult};
use crate::yaml::document::{Document, Node};
use crate::yaml::errors::YamlError;
use crate::yaml::query::KeyPath;
use std::fmt;

/// Outcome of planning a rewrite for one key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlPlan {
    /// Replace the scalar's source text; `value` is the new logical value.
    Edit { edit: Edit, value: String },
    NoOp(NoOpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    PathMissing,
    NotScalar,
    NotString,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NoOpReason::PathMissing => "path not present",
            NoOpReason::NotScalar => "not a scalar",
            NoOpReason::NotString => "not a string scalar",
        };
        f.write_str(text)
    }
}

/// Planned change to a single field, kept for post-edit verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRewrite {
    pub path: KeyPath,
    pub value: String,
    pub edit: Edit,
}

/// Layout-preserving YAML editor.
///
/// Edits are byte-span replacements of individual scalars; the rest of the
/// text, comments included, is never re-emitted.
pub struct YamlEditor {
    content: String,
    document: Document,
}

impl YamlEditor {
    pub fn parse(content: &str) -> Result<Self, YamlError> {
        let document = Document::parse(content)?;
        Ok(Self {
            content: content.to_string(),
            document,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Plan replacing the string scalar at `path` with `rewrite(current)`.
    ///
    /// The replacement is rendered double-quoted whatever the original style,
    /// even when `rewrite` returns the value unchanged.
    pub fn plan_rewrite<F>(&self, path: &KeyPath, rewrite: F) -> YamlPlan
    where
        F: FnOnce(&str) -> String,
    {
        let scalar = match self.document.lookup(path) {
            None => return YamlPlan::NoOp(NoOpReason::PathMissing),
            Some(Node::Scalar(scalar)) => scalar,
            Some(_) => return YamlPlan::NoOp(NoOpReason::NotScalar),
        };
        if !scalar.is_string() {
            return YamlPlan::NoOp(NoOpReason::NotString);
        }

        let value = rewrite(&scalar.value);
        let current = &self.content[scalar.span.start..scalar.span.end];
        let edit = Edit::new(
            scalar.span.start,
            scalar.span.end,
            double_quoted(&value),
            current,
        );
        YamlPlan::Edit { edit, value }
    }

    /// Splice all planned rewrites into the text and check the result.
    ///
    /// The updated text must parse and every rewritten path must now hold its
    /// planned value. Results line up with `rewrites`; a field whose source
    /// already read as the rendered text comes back `AlreadyApplied`.
    pub fn apply(
        &self,
        rewrites: &[PlannedRewrite],
    ) -> Result<(String, Vec<EditResult>), YamlError> {
        let edits = rewrites.iter().map(|r| r.edit.clone()).collect();
        let (updated, results) = Edit::apply_batch(&self.content, edits)?;

        let reparsed = Document::parse(&updated)?;
        for rewrite in rewrites {
            let holds = reparsed
                .lookup(&rewrite.path)
                .and_then(Node::as_scalar)
                .is_some_and(|scalar| scalar.value == rewrite.value);
            if !holds {
                return Err(YamlError::VerificationFailed {
                    path: rewrite.path.as_string(),
                    expected: rewrite.value.clone(),
                });
            }
        }

        Ok((updated, results))
    }
}

/// Render `value` as a YAML double-quoted scalar.
pub fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
