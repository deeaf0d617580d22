//! Example links for a fresh install.

use deeplinker_protocol::LinkRecord;
use tracing::info;

use crate::error::Result;
use crate::traits::LinkStore;

const EXAMPLE_WEB_BASE: &str = "https://example.com";

/// Which example slugs were written and which already existed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// The five example links, with app URLs under `scheme`.
///
/// `settings` has no Android URL and `profile` has no iOS URL, so both
/// exercise the web fallback on the other platform.
pub fn example_links(scheme: &str) -> Vec<LinkRecord> {
    let app = |slug: &str| format!("{scheme}://{slug}");
    let web = |slug: &str| format!("{EXAMPLE_WEB_BASE}/{slug}");
    let fallback = format!("{EXAMPLE_WEB_BASE}/fallback");

    let mut links = Vec::new();
    for slug in ["hello", "welcome", "product"] {
        links.push(
            LinkRecord::new(slug)
                .with_ios_url(app(slug))
                .with_android_url(app(slug))
                .with_web_url(web(slug))
                .with_fallback_url(fallback.clone()),
        );
    }
    links.push(
        LinkRecord::new("settings")
            .with_ios_url(app("settings"))
            .with_web_url(web("settings"))
            .with_fallback_url(fallback.clone()),
    );
    links.push(
        LinkRecord::new("profile")
            .with_android_url(app("profile"))
            .with_web_url(web("profile"))
            .with_fallback_url(fallback),
    );
    links
}

/// Insert the example links. Existing records are left untouched.
pub async fn seed_examples<S>(store: &S, scheme: &str) -> Result<SeedReport>
where
    S: LinkStore + ?Sized,
{
    let mut report = SeedReport::default();
    for link in example_links(scheme) {
        let slug = link.slug.clone();
        if store.insert_if_absent(link).await? {
            report.created.push(slug);
        } else {
            report.skipped.push(slug);
        }
    }
    info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        "Seeded example links"
    );
    Ok(report)
}
