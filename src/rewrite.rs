//! The hostname rewrite pass: placeholders in target fields become the load
//! balancer DNS name.

use crate::edit::{atomic_write, EditResult};
use crate::targets::{EXAMPLE_PLACEHOLDER, LOAD_BALANCER_PLACEHOLDER};
use crate::yaml::{KeyPath, NoOpReason, PlannedRewrite, YamlEditor, YamlError, YamlPlan};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Yaml(#[from] YamlError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    /// String target, now double-quoted. `changed` is false when the source
    /// already read exactly that way.
    Rewritten { value: String, changed: bool },
    Skipped(NoOpReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    pub path: KeyPath,
    pub status: FieldStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// The rewritten document text.
    pub output: String,
    /// One entry per target path, in target order.
    pub fields: Vec<FieldOutcome>,
}

impl RewriteReport {
    pub fn rewritten(&self) -> impl Iterator<Item = (&KeyPath, &str)> {
        self.fields.iter().filter_map(|field| match &field.status {
            FieldStatus::Rewritten { value, .. } => Some((&field.path, value.as_str())),
            FieldStatus::Skipped(_) => None,
        })
    }
}

/// Replace the load balancer placeholder, then `example.com`, with `dns`.
///
/// The second pass runs on the output of the first, so a `dns` that itself
/// contains `example.com` is rewritten again.
pub fn substitute_placeholders(value: &str, dns: &str) -> String {
    value
        .replace(LOAD_BALANCER_PLACEHOLDER, dns)
        .replace(EXAMPLE_PLACEHOLDER, dns)
}

/// Rewrite every target field of `content` and return the new text.
///
/// Every string target is substituted and re-rendered double-quoted. Missing
/// fields and fields that are not string scalars are skipped. Text outside
/// the rewritten scalars is returned unchanged.
pub fn rewrite_document(
    content: &str,
    targets: &[KeyPath],
    dns: &str,
) -> Result<RewriteReport, RewriteError> {
    let editor = YamlEditor::parse(content)?;

    let mut planned = Vec::new();
    let mut planned_fields = Vec::new();
    let mut fields = Vec::with_capacity(targets.len());
    for path in targets {
        let status = match editor.plan_rewrite(path, |value| substitute_placeholders(value, dns)) {
            YamlPlan::Edit { edit, value } => {
                planned_fields.push(fields.len());
                planned.push(PlannedRewrite {
                    path: path.clone(),
                    value: value.clone(),
                    edit,
                });
                FieldStatus::Rewritten {
                    value,
                    changed: true,
                }
            }
            YamlPlan::NoOp(reason) => {
                debug!(%path, %reason, "field left as is");
                FieldStatus::Skipped(reason)
            }
        };
        fields.push(FieldOutcome {
            path: path.clone(),
            status,
        });
    }

    let (output, results) = if planned.is_empty() {
        (content.to_string(), Vec::new())
    } else {
        editor.apply(&planned)?
    };

    let mut unchanged = 0;
    for (&index, result) in planned_fields.iter().zip(&results) {
        if *result != EditResult::AlreadyApplied {
            continue;
        }
        let field = &mut fields[index];
        if let FieldStatus::Rewritten { changed, .. } = &mut field.status {
            *changed = false;
        }
        unchanged += 1;
        debug!(path = %field.path, "already up to date");
    }

    let report = RewriteReport { output, fields };
    for (path, value) in report.rewritten() {
        info!("Updated {path} -> {value}");
    }
    debug!(
        rewritten = planned.len() - unchanged,
        up_to_date = unchanged,
        skipped = targets.len() - planned.len(),
        "rewrite pass complete"
    );

    Ok(report)
}

pub fn read_input(path: &Path) -> Result<String, RewriteError> {
    fs::read_to_string(path).map_err(|source| RewriteError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_output(path: &Path, content: &str) -> Result<(), RewriteError> {
    atomic_write(path, content.as_bytes()).map_err(|source| RewriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::{full_dns, target_paths};

    const DNS: &str = "lb-abc123.upcloudlb.com";

    fn rewrite(content: &str) -> RewriteReport {
        rewrite_document(content, &target_paths(), DNS).unwrap()
    }

    #[test]
    fn substitutes_load_balancer_placeholder() {
        assert_eq!(
            substitute_placeholders("http://REPLACEME.upcloudlb.com", DNS),
            "http://lb-abc123.upcloudlb.com"
        );
    }

    #[test]
    fn substitutes_every_occurrence_of_both_placeholders() {
        assert_eq!(
            substitute_placeholders("https://example.com,https://api.example.com/x", DNS),
            "https://lb-abc123.upcloudlb.com,https://api.lb-abc123.upcloudlb.com/x"
        );
        assert_eq!(
            substitute_placeholders("REPLACEME.upcloudlb.com REPLACEME.upcloudlb.com", DNS),
            "lb-abc123.upcloudlb.com lb-abc123.upcloudlb.com"
        );
    }

    #[test]
    fn second_pass_sees_first_pass_output() {
        let dns = full_dns("lb.example.com");
        assert_eq!(
            substitute_placeholders("http://REPLACEME.upcloudlb.com", &dns),
            "http://lb.lb.example.com.upcloudlb.com.upcloudlb.com"
        );
    }

    #[test]
    fn rewrites_kong_public_url() {
        let input = "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: \"http://REPLACEME.upcloudlb.com\"\n";
        let report = rewrite(input);
        assert_eq!(
            report.output,
            "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: \"http://lb-abc123.upcloudlb.com\"\n"
        );
        let rewritten: Vec<_> = report.rewritten().collect();
        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].0.as_string(), "kong.environment.SUPABASE_PUBLIC_URL");
    }

    #[test]
    fn non_target_fields_untouched() {
        let input = "\
# manifest
auth:
  environment:
    GOTRUE_SITE_URL: http://example.com   # site
    GOTRUE_URI_ALLOW_LIST: http://example.com
  image: supabase/gotrue
other:
  environment:
    GOTRUE_SITE_URL: http://example.com
";
        let report = rewrite(input);
        assert_eq!(
            report.output,
            input.replacen(
                "GOTRUE_SITE_URL: http://example.com   # site",
                "GOTRUE_SITE_URL: \"http://lb-abc123.upcloudlb.com\"   # site",
                1
            )
        );
    }

    #[test]
    fn absent_and_non_string_targets_are_skipped() {
        let input = "\
kong:
  environment:
    SUPABASE_PUBLIC_URL: 8000
    SUPABASE_STUDIO_URL:
      nested: http://example.com
rest: {}
";
        let report = rewrite(input);
        assert_eq!(report.output, input);
        assert_eq!(report.rewritten().count(), 0);

        let statuses: Vec<_> = report.fields.iter().map(|f| &f.status).collect();
        assert_eq!(statuses[6], &FieldStatus::Skipped(NoOpReason::NotString));
        assert_eq!(statuses[7], &FieldStatus::Skipped(NoOpReason::NotScalar));
        assert_eq!(statuses[3], &FieldStatus::Skipped(NoOpReason::PathMissing));
    }

    #[test]
    fn rerun_is_noop_once_placeholders_are_gone() {
        let input = "studio:\n  environment:\n    SUPABASE_PUBLIC_URL: http://REPLACEME.upcloudlb.com\n";
        let first = rewrite(input);
        let second = rewrite(&first.output);
        assert_eq!(second.output, first.output);
        assert_eq!(
            second.fields[0].status,
            FieldStatus::Rewritten {
                value: "http://lb-abc123.upcloudlb.com".to_string(),
                changed: false,
            }
        );
    }

    #[test]
    fn string_target_without_placeholder_is_requoted() {
        let input = "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: http://foo.bar\n";
        let report = rewrite(input);
        assert_eq!(
            report.output,
            "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: \"http://foo.bar\"\n"
        );
        assert_eq!(
            report.rewritten().collect::<Vec<_>>()[0].1,
            "http://foo.bar"
        );
    }

    #[test]
    fn block_scalar_targets_are_replaced_whole() {
        let cases = [
            ("|\n      http://example.com\n", "\"http://lb-abc123.upcloudlb.com\\n\""),
            ("|-\n      http://example.com\n", "\"http://lb-abc123.upcloudlb.com\""),
            (
                "|- # public\n      http://example.com\n",
                "\"http://lb-abc123.upcloudlb.com\"",
            ),
            (
                ">\n      http://example.com\n\n      http://REPLACEME.upcloudlb.com\n",
                "\"http://lb-abc123.upcloudlb.com\\nhttp://lb-abc123.upcloudlb.com\\n\"",
            ),
            (
                ">-\n      http://example.com\n      /studio\n",
                "\"http://lb-abc123.upcloudlb.com /studio\"",
            ),
        ];
        for (block, rendered) in cases {
            let input = format!(
                "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: {block}    SUPABASE_STUDIO_URL: http://x.io\n"
            );
            let report = rewrite_document(&input, &target_paths(), DNS)
                .unwrap_or_else(|err| panic!("{block:?}: {err}"));
            assert_eq!(
                report.output,
                format!(
                    "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: {rendered}\n    SUPABASE_STUDIO_URL: \"http://x.io\"\n"
                ),
                "{block:?}"
            );
        }
    }

    #[test]
    fn byte_order_mark_does_not_hide_first_key() {
        let input = "\u{feff}kong:\n  environment:\n    SUPABASE_PUBLIC_URL: http://example.com\n";
        let report = rewrite(input);
        assert_eq!(
            report.output,
            "\u{feff}kong:\n  environment:\n    SUPABASE_PUBLIC_URL: \"http://lb-abc123.upcloudlb.com\"\n"
        );
    }

    #[test]
    fn rerun_with_placeholder_in_dns_keeps_growing() {
        let input = "studio:\n  environment:\n    SUPABASE_PUBLIC_URL: http://example.com\n";
        let dns = full_dns("lb.example.com");
        let first = rewrite_document(input, &target_paths(), &dns).unwrap();
        let second = rewrite_document(&first.output, &target_paths(), &dns).unwrap();
        assert_ne!(second.output, first.output);
    }

    #[test]
    fn parse_failure_is_reported() {
        let err = rewrite_document("a: [1, 2\n", &target_paths(), DNS).unwrap_err();
        assert!(err.to_string().contains("failed to parse YAML"));
    }

    #[test]
    fn empty_document_is_reported() {
        let err = rewrite_document("\n# nothing\n", &target_paths(), DNS).unwrap_err();
        assert!(matches!(err, RewriteError::Yaml(YamlError::EmptyDocument)));
    }

    #[test]
    fn read_input_reports_path() {
        let err = read_input(Path::new("/nonexistent/values.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/values.yaml"));
    }
}
