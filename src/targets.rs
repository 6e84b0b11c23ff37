//! Fields that may carry a placeholder hostname, and the placeholders themselves.

use crate::yaml::KeyPath;

/// Domain appended to the operator-supplied load balancer prefix.
pub const DNS_SUFFIX: &str = ".upcloudlb.com";

/// Replaced first.
pub const LOAD_BALANCER_PLACEHOLDER: &str = "REPLACEME.upcloudlb.com";

/// Replaced second, on the output of the first substitution.
pub const EXAMPLE_PLACEHOLDER: &str = "example.com";

/// Every key path whose value is a URL that must point at the load balancer.
pub const TARGET_FIELDS: &[&[&str]] = &[
    &["studio", "environment", "SUPABASE_PUBLIC_URL"],
    &["auth", "environment", "GOTRUE_SITE_URL"],
    &["auth", "environment", "API_EXTERNAL_URL"],
    &["rest", "environment", "POSTGREST_SITE_URL"],
    &["realtime", "environment", "PORTAL_URL"],
    &["storage", "environment", "FILE_STORAGE_BACKEND_URL"],
    &["kong", "environment", "SUPABASE_PUBLIC_URL"],
    &["kong", "environment", "SUPABASE_STUDIO_URL"],
];

/// [`TARGET_FIELDS`] as key paths, in table order.
pub fn target_paths() -> Vec<KeyPath> {
    TARGET_FIELDS
        .iter()
        .filter_map(|segments| KeyPath::new(segments.iter().copied()).ok())
        .collect()
}

/// `lb-abc123` -> `lb-abc123.upcloudlb.com`. The prefix is not validated.
pub fn full_dns(prefix: &str) -> String {
    format!("{prefix}{DNS_SUFFIX}")
}
