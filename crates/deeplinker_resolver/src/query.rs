//! Query parameter propagation from the inbound request to the destination.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("invalid destination url: {0}")]
    InvalidDestinationUrl(String),
    #[error("invalid source url: {0}")]
    InvalidSourceUrl(String),
}

/// Copy every query parameter of `source_url` onto `destination_url`.
///
/// Source parameters overwrite same-named destination parameters, destination
/// only parameters survive, and a repeated source parameter keeps only its
/// final value. Fails closed: if either URL does not parse, the destination
/// string is returned unchanged.
pub fn merge_query_params(destination_url: &str, source_url: &str) -> String {
    match try_merge_query_params(destination_url, source_url) {
        Ok(merged) => merged,
        Err(err) => {
            tracing::debug!(error = %err, "query merge skipped");
            destination_url.to_string()
        }
    }
}

/// Fallible form of [`merge_query_params`].
pub fn try_merge_query_params(destination_url: &str, source_url: &str) -> Result<String, MergeError> {
    let mut destination = Url::parse(destination_url)
        .map_err(|e| MergeError::InvalidDestinationUrl(format!("{}: {}", destination_url, e)))?;
    let source = Url::parse(source_url)
        .map_err(|e| MergeError::InvalidSourceUrl(format!("{}: {}", source_url, e)))?;

    let mut pairs: Vec<(String, String)> = destination.query_pairs().into_owned().collect();
    let mut changed = false;
    for (key, value) in source.query_pairs() {
        set_param(&mut pairs, &key, &value);
        changed = true;
    }

    // An untouched query keeps its original encoding.
    if changed {
        destination.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    Ok(destination.to_string())
}

/// `URLSearchParams.set`: the first `key` takes `value` in place, later
/// occurrences are dropped; a missing key is appended.
fn set_param(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    let Some(first) = pairs.iter().position(|(k, _)| k == key) else {
        pairs.push((key.to_string(), value.to_string()));
        return;
    };

    pairs[first].1 = value.to_string();
    let mut index = 0;
    pairs.retain(|(k, _)| {
        let keep = index <= first || k != key;
        index += 1;
        keep
    });
}

/// First decoded value of `key` in a raw query string, like
/// `URLSearchParams.get`.
pub fn first_query_param(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}
