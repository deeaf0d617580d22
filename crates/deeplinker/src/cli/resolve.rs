//! `resolve`: dry run of the resolution endpoint against the link file.

use anyhow::{Context, Result};
use deeplinker_protocol::defaults::DIRECT_REDIRECT_CACHE_CONTROL;
use deeplinker_protocol::{DeeplinkerConfig, ErrorResponse, Platform};
use deeplinker_resolver::{first_query_param, resolve_platform, LinkResolver};
use deeplinker_store::{JsonFileLinkStore, ReadLinkStore};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    pub slug: String,
    pub platform: Option<String>,
    pub user_agent: Option<String>,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub json: bool,
}

/// What the server would answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub status: u16,
    pub platform: Platform,
    pub request_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<ErrorResponse>,
}

pub async fn run(config: &DeeplinkerConfig, args: ResolveArgs) -> Result<()> {
    let path = config.storage.links_path();
    let store = JsonFileLinkStore::open(&path)
        .await
        .with_context(|| format!("Failed to open link store {}", path.display()))?;

    let report = dry_run(config, &store, &args).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("GET {}", report.request_url);
    println!("Platform: {}", report.platform);
    println!("Status:   {}", report.status);
    if let Some(location) = &report.location {
        println!("Location: {}", location);
    }
    if let Some(cache_control) = report.cache_control {
        println!("Cache-Control: {}", cache_control);
    }
    if let Some(body) = &report.body {
        println!("Body:     {}", serde_json::to_string(body)?);
    }
    Ok(())
}

pub async fn dry_run<S: ReadLinkStore + ?Sized>(
    config: &DeeplinkerConfig,
    store: &S,
    args: &ResolveArgs,
) -> Result<ResolveReport> {
    let query = args.query.as_deref().unwrap_or("").trim_start_matches('?');
    let mut request_url = format!(
        "{}/{}/{}",
        config.server.public_base_url.trim_end_matches('/'),
        config.routes.canonical_prefix,
        args.slug
    );
    if !query.is_empty() {
        request_url.push('?');
        request_url.push_str(query);
    }

    // An explicit --platform wins over one carried in the query.
    let override_raw = args
        .platform
        .clone()
        .or_else(|| first_query_param(query, "platform"));
    let platform = resolve_platform(override_raw.as_deref(), args.user_agent.as_deref().unwrap_or(""));
    let access_code = first_query_param(query, "access_code").filter(|code| !code.is_empty());

    let link = store
        .find_active(&args.slug)
        .await
        .context("Failed to look up link")?;
    let resolver = LinkResolver::new(config.stores.clone());

    let report = match resolver.decide(link.as_ref(), platform) {
        Ok(decision) => {
            let location = decision.location(
                &request_url,
                &config.routes.smart_redirect_path,
                &args.slug,
                access_code.as_deref(),
            );
            ResolveReport {
                status: 302,
                platform,
                request_url,
                location: Some(location),
                cache_control: (!decision.is_smart()).then_some(DIRECT_REDIRECT_CACHE_CONTROL),
                body: None,
            }
        }
        Err(err) => ResolveReport {
            status: 404,
            platform,
            request_url,
            location: None,
            cache_control: None,
            body: Some(ErrorResponse::new(err.to_string())),
        },
    };
    Ok(report)
}
