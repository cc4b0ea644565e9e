//! Core data model for dashgate
//!
//! A [`TenantDashboard`] is one named, per-tenant bucket of static content.
//! The table of dashboards is built once at startup and only read afterwards.

use crate::constants::INDEX_DOCUMENT;
use serde::{Deserialize, Serialize};

/// Raw tenant entry as written in the YAML tenant table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardEntry {
    /// Bucket holding the tenant's content
    #[serde(rename = "gcs_bucket", alias = "bucket")]
    pub bucket: String,

    /// Serve the root document for unknown paths
    pub single_page_app: bool,

    /// Key prefix inside the bucket
    pub prefix: String,

    /// Skip authentication entirely
    pub public: bool,

    /// Canonical mount is `<slug>.<base-domain>` instead of `<base-domain>/<slug>/`
    pub subdomain: bool,
}

/// A tenant's static site, immutable after load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantDashboard {
    pub name: String,
    pub slug: String,
    pub bucket: String,
    pub prefix: Option<String>,
    pub single_page_app: bool,
    pub public: bool,
    pub subdomain: bool,
}

impl TenantDashboard {
    /// Build a dashboard from its table entry, falling back to `default_bucket`
    pub fn from_entry(slug: &str, entry: DashboardEntry, default_bucket: &str) -> Self {
        let bucket = if entry.bucket.is_empty() {
            default_bucket.to_string()
        } else {
            entry.bucket
        };
        let prefix = entry.prefix.trim_matches('/');

        Self {
            name: titleize(slug),
            slug: slug.to_string(),
            bucket,
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            single_page_app: entry.single_page_app,
            public: entry.public,
            subdomain: entry.subdomain,
        }
    }

    /// Path mount under the base domain, e.g. `/docs/`
    pub fn path_mount(&self) -> String {
        format!("/{}/", self.slug)
    }

    /// Host of the subdomain mount, e.g. `docs.example.com`
    pub fn subdomain_host(&self, base_domain: &str) -> String {
        format!("{}.{}", self.slug, base_domain)
    }

    /// Scheme-relative URL of the canonical mount
    pub fn canonical_url(&self, base_domain: &str) -> String {
        if self.subdomain {
            format!("//{}/", self.subdomain_host(base_domain))
        } else {
            format!("//{}{}", base_domain, self.path_mount())
        }
    }

    /// Object key for the remainder of a request path after the mount prefix
    ///
    /// Directory paths resolve to their `index.html`. Returns `None` for
    /// remainders containing dot segments.
    pub fn object_key(&self, remainder: &str) -> Option<String> {
        if remainder.split('/').any(is_dot_segment) {
            return None;
        }

        let mut key = remainder.to_string();
        if key.is_empty() || key.ends_with('/') {
            key.push_str(INDEX_DOCUMENT);
        }
        Some(self.prefixed(&key))
    }

    /// Key of the tenant's root document
    pub fn index_key(&self) -> String {
        self.prefixed(INDEX_DOCUMENT)
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | ".." | "%2e" | "%2e%2e" | ".%2e" | "%2e."
    )
}

/// Turn a slug like `my-dash` into a display name like `My Dash`
pub fn titleize(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "model_test.rs"]
mod model_test;
