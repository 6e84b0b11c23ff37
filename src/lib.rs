//! Supabase DNS: point a Supabase deployment manifest at its load balancer.
//!
//! Known URL fields of a YAML manifest hold placeholder hostnames
//! (`REPLACEME.upcloudlb.com`, `example.com`). This crate swaps them for the
//! real load balancer DNS name while leaving every other byte of the file,
//! comments and key order included, exactly as it was.
//!
//! # Architecture
//!
//! Rewrites compile down to [`Edit`], a verified byte-span replacement. The
//! span of each target scalar comes from a source-mapped parse of the
//! document ([`yaml::Document`]); the edited text is re-parsed to confirm
//! every field holds its new value before anything is written.
//!
//! # Example
//!
//! ```
//! use supabase_dns::{full_dns, rewrite_document, target_paths};
//!
//! let input = "kong:\n  environment:\n    SUPABASE_PUBLIC_URL: http://REPLACEME.upcloudlb.com\n";
//! let report = rewrite_document(input, &target_paths(), &full_dns("lb-abc123")).unwrap();
//! assert!(report.output.contains("\"http://lb-abc123.upcloudlb.com\""));
//! ```

pub mod edit;
pub mod rewrite;
pub mod targets;
pub mod yaml;

// Re-exports
pub use edit::{atomic_write, Edit, EditError, EditResult, EditVerification};
pub use rewrite::{
    read_input, rewrite_document, substitute_placeholders, write_output, FieldOutcome,
    FieldStatus, RewriteError, RewriteReport,
};
pub use targets::{full_dns, target_paths, DNS_SUFFIX, TARGET_FIELDS};
pub use yaml::{KeyPath, YamlEditor, YamlError};
