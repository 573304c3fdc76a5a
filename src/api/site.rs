//! Public site information API
//!
//! - GET /api/v1/site - Site settings safe to expose, plus featured tools
//!   and the analytics identifiers the frontend embeds

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::store::NavLink;
use crate::tools::registry;

#[derive(Debug, Serialize)]
pub struct FeaturedTool {
    pub slug: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub version: &'static str,
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    pub footer_text: String,
    pub nav_links: Vec<NavLink>,
    pub comments_enabled: bool,
    pub featured_tools: Vec<FeaturedTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ga4_measurement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsc_verification: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_site_info))
}

/// GET /api/v1/site
async fn get_site_info(State(state): State<AppState>) -> Json<SiteInfoResponse> {
    let site = state.stores.site.get().await;
    let tools = state.stores.tools.get().await;
    let analytics = state.stores.analytics.get().await;

    // Featured order is kept; disabled or unknown slugs are skipped
    let featured_tools = tools
        .featured
        .iter()
        .filter(|slug| !tools.is_disabled(slug))
        .filter_map(|slug| registry::find(slug))
        .map(|t| FeaturedTool {
            slug: t.slug,
            name: t.name,
        })
        .collect();

    Json(SiteInfoResponse {
        version: env!("CARGO_PKG_VERSION"),
        site_name: site.site_name,
        tagline: site.tagline,
        contact_email: site.contact_email,
        footer_text: site.footer_text,
        nav_links: site.nav_links,
        comments_enabled: site.comments_enabled,
        featured_tools,
        ga4_measurement_id: analytics.ga4_measurement_id.filter(|s| !s.is_empty()),
        gsc_verification: analytics.gsc_verification.filter(|s| !s.is_empty()),
    })
}
