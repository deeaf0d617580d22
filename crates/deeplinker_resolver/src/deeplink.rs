//! Helpers for apps and scripts that build or read deep links.

use std::collections::BTreeMap;

use deeplinker_protocol::defaults::{DEFAULT_CANONICAL_PREFIX, DEFAULT_SHORT_PREFIX};
use url::{form_urlencoded, Url};

/// A deep link taken apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDeeplink {
    /// Empty when the URL has no `l`/`d` segment or fails to parse.
    pub slug: String,
    pub params: BTreeMap<String, String>,
}

/// Build `<base_url>/l/<slug>?<params>`.
///
/// A trailing slash on `base_url` is dropped. Parameters with a `None` value
/// are skipped; the query is omitted entirely when nothing remains.
pub fn build_deeplink<I, K, V>(base_url: &str, slug: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: ToString,
{
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    let mut url = format!("{}/{}/{}", base, DEFAULT_CANONICAL_PREFIX, slug);

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key.as_ref(), &value.to_string());
            any = true;
        }
    }
    if any {
        url.push('?');
        url.push_str(&serializer.finish());
    }
    url
}

/// Extract the slug and query parameters from a deep link.
///
/// The slug is the segment after the first `l` segment, or after the first
/// `d` segment when there is no `l`. Repeated parameters keep their last
/// value.
pub fn parse_deeplink(url: &str) -> ParsedDeeplink {
    let Ok(parsed) = Url::parse(url) else {
        return ParsedDeeplink::default();
    };

    let parts: Vec<&str> = parsed.path().split('/').collect();
    let anchor = parts
        .iter()
        .position(|part| *part == DEFAULT_CANONICAL_PREFIX)
        .or_else(|| parts.iter().position(|part| *part == DEFAULT_SHORT_PREFIX));
    let slug = anchor
        .and_then(|index| parts.get(index + 1))
        .map(|part| part.to_string())
        .unwrap_or_default();

    let params = parsed.query_pairs().into_owned().collect();
    ParsedDeeplink { slug, params }
}
