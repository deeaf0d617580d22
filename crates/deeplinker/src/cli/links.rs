//! Link administration: `add-link`, `seed`, `links`.

use anyhow::{Context, Result};
use deeplinker_protocol::{DeeplinkerConfig, LinkRecord};
use deeplinker_store::{
    seed_examples, validate_new_link, JsonFileLinkStore, LinkStore, ReadLinkStore, UpsertOutcome,
};

use super::error::HelpfulError;
use super::output::print_table;

#[derive(Debug, Clone)]
pub struct AddLinkArgs {
    pub slug: String,
    pub ios: Option<String>,
    pub android: Option<String>,
    pub web: Option<String>,
    pub fallback: Option<String>,
}

impl AddLinkArgs {
    fn into_record(self) -> LinkRecord {
        let mut link = LinkRecord::new(self.slug);
        link.ios_url = self.ios;
        link.android_url = self.android;
        link.web_url = self.web;
        link.fallback_url = self.fallback;
        link
    }
}

async fn open_store(config: &DeeplinkerConfig) -> Result<JsonFileLinkStore> {
    let path = config.storage.links_path();
    JsonFileLinkStore::open(&path)
        .await
        .with_context(|| format!("Failed to open link store {}", path.display()))
}

pub async fn add_link(config: &DeeplinkerConfig, args: AddLinkArgs) -> Result<()> {
    let link = args.into_record();
    validate_new_link(&link).map_err(|err| HelpfulError::invalid_link(&err))?;

    println!("Adding/updating deep link: {}", link.slug);
    for (label, url) in [
        ("iOS", &link.ios_url),
        ("Android", &link.android_url),
        ("Web", &link.web_url),
        ("Fallback", &link.fallback_url),
    ] {
        if let Some(url) = url {
            println!("  {}: {}", label, url);
        }
    }

    let slug = link.slug.clone();
    let has_ios = link.ios_url.is_some();
    let has_android = link.android_url.is_some();
    let has_web = link.web_url.is_some();

    let store = open_store(config).await?;
    let outcome = store.upsert(link).await.context("Failed to save link")?;
    match outcome {
        UpsertOutcome::Created => println!("\nCreated link '{}'", slug),
        UpsertOutcome::Updated => println!("\nUpdated link '{}'", slug),
    }

    let routes = &config.routes;
    println!("\nTest with:");
    println!("  GET /{}/{}", routes.canonical_prefix, slug);
    println!("  GET /{}/{} (shorter URL)", routes.short_prefix, slug);
    if has_ios {
        println!("  GET /{}/{}?platform=ios", routes.canonical_prefix, slug);
    }
    if has_android {
        println!("  GET /{}/{}?platform=android", routes.canonical_prefix, slug);
    }
    if has_web {
        println!("  GET /{}/{}?platform=web", routes.canonical_prefix, slug);
    }
    Ok(())
}

pub async fn seed(config: &DeeplinkerConfig) -> Result<()> {
    let store = open_store(config).await?;
    let report = seed_examples(&store, &config.app.scheme)
        .await
        .context("Failed to seed example links")?;

    for slug in &report.created {
        println!("  created  /{}/{}", config.routes.canonical_prefix, slug);
    }
    for slug in &report.skipped {
        println!("  exists   /{}/{} (left unchanged)", config.routes.canonical_prefix, slug);
    }
    println!(
        "\nSeeded {} example links into {}",
        report.created.len(),
        store.path().display()
    );
    Ok(())
}

pub async fn list(config: &DeeplinkerConfig, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let links = store.list().await.context("Failed to read links")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&links)?);
        return Ok(());
    }
    if links.is_empty() {
        println!("No links yet. TRY: deeplinker seed");
        return Ok(());
    }

    let dash = || "-".to_string();
    let rows = links
        .into_iter()
        .map(|link| {
            vec![
                link.slug,
                if link.is_active { "yes" } else { "no" }.to_string(),
                link.ios_url.unwrap_or_else(dash),
                link.android_url.unwrap_or_else(dash),
                link.web_url.unwrap_or_else(dash),
                link.fallback_url.unwrap_or_else(dash),
                link.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(
        &["SLUG", "ACTIVE", "IOS", "ANDROID", "WEB", "FALLBACK", "UPDATED"],
        rows,
    );
    Ok(())
}
