//! Dashboard-managed settings documents

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub label: String,
    pub url: String,
}

/// `site.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    pub footer_text: String,
    pub nav_links: Vec<NavLink>,
    pub comments_enabled: bool,
    /// Approve new comments without moderation
    pub comments_auto_approve: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Paperdesk".to_string(),
            tagline: "Free PDF and image tools".to_string(),
            contact_email: String::new(),
            footer_text: String::new(),
            nav_links: Vec::new(),
            comments_enabled: true,
            comments_auto_approve: false,
        }
    }
}

impl SiteSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.site_name.trim().is_empty() {
            return Err("site_name cannot be empty".to_string());
        }
        if !self.contact_email.is_empty() && !self.contact_email.contains('@') {
            return Err("contact_email is not a valid email address".to_string());
        }
        for link in &self.nav_links {
            if link.label.trim().is_empty() || link.url.trim().is_empty() {
                return Err("nav links need both a label and a url".to_string());
            }
        }
        Ok(())
    }
}

/// `tools.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Slugs that answer 403
    pub disabled: Vec<String>,
    /// Slugs promoted on the home page, in order
    pub featured: Vec<String>,
    /// Per-tool upload limit in bytes, overriding `upload.max_file_size`
    pub max_file_size: BTreeMap<String, u64>,
}

impl ToolSettings {
    pub fn is_disabled(&self, slug: &str) -> bool {
        self.disabled.iter().any(|s| s == slug)
    }

    pub fn max_size_for(&self, slug: &str, default: u64) -> u64 {
        self.max_file_size.get(slug).copied().unwrap_or(default)
    }

    /// Every slug mentioned must name a known tool
    pub fn validate(&self, known: impl Fn(&str) -> bool) -> Result<(), String> {
        let mentioned = self
            .disabled
            .iter()
            .chain(self.featured.iter())
            .chain(self.max_file_size.keys());
        for slug in mentioned {
            if !known(slug) {
                return Err(format!("Unknown tool: {}", slug));
            }
        }
        if self.max_file_size.values().any(|&v| v == 0) {
            return Err("max_file_size overrides must be positive".to_string());
        }
        Ok(())
    }
}

/// `analytics.json`; only identifiers are kept here
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// GA4 measurement id, `G-XXXXXXX`
    pub ga4_measurement_id: Option<String>,
    pub gsc_site_url: Option<String>,
    /// Content of the `google-site-verification` meta tag
    pub gsc_verification: Option<String>,
}

impl AnalyticsSettings {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = self.ga4_measurement_id.as_deref().filter(|s| !s.is_empty()) {
            let valid = id.starts_with("G-")
                && id.len() > 2
                && id[2..].chars().all(|c| c.is_ascii_alphanumeric());
            if !valid {
                return Err(format!("Invalid GA4 measurement id: {}", id));
            }
        }
        if let Some(url) = self.gsc_site_url.as_deref().filter(|s| !s.is_empty()) {
            if !(url.starts_with("https://") || url.starts_with("http://") || url.starts_with("sc-domain:")) {
                return Err(format!("Invalid Search Console property: {}", url));
            }
        }
        Ok(())
    }
}
