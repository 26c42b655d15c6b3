//! Request URL composition.
//!
//! Path pairs fill `{name}` placeholders of the base URL (names compared
//! case-insensitively, values escaped, several values joined with `/`).
//! Query pairs are escaped and appended after any query the base URL
//! already carries. Placeholders without a value become empty.

use restbind_client::{Error, ErrorKind, Result};

use crate::cache::MetadataCache;
use crate::classify::BindingTarget;
use crate::convert::{BoundPair, Converter};
use crate::model::Model;
use crate::profile::Owner;

/// Compose the request URL for `model` against `base_url`.
pub fn compose_url<M: Model>(
    cache: &MetadataCache,
    owner: &Owner,
    model: Option<&M>,
    base_url: &str,
) -> Result<String> {
    let Some(model) = model else {
        return Ok(base_url.to_string());
    };
    let descriptor = cache.descriptor::<M>(owner)?;
    if descriptor.ignore_for_url() {
        return Ok(base_url.to_string());
    }

    let build_error = |source: Option<Error>| {
        let kind = ErrorKind::UrlBuild {
            base_url: restbind_client::security::redact_url(base_url),
            model_type: std::any::type_name::<M>().to_string(),
        };
        match source {
            Some(source) => Error::with_source(kind, source),
            None => Error::new(kind),
        }
    };

    let pairs = Converter::new(cache, owner)
        .convert(&descriptor, model, |target| target.is_url())
        .map_err(|e| build_error(Some(e)))?;
    let composed = merge(base_url, &pairs);

    if composed.contains("://") {
        url::Url::parse(&composed).map_err(|e| build_error(Some(e.into())))?;
    }
    Ok(composed)
}

/// Merge converted pairs into `base_url`.
pub(crate) fn merge(base_url: &str, pairs: &[BoundPair]) -> String {
    let (rest, fragment) = match base_url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (base_url, None),
    };
    let (rest, existing_query) = match rest.split_once('?') {
        Some((rest, query)) => (rest, Some(query)),
        None => (rest, None),
    };
    let (prefix, path) = split_authority(rest);

    let placeholders = placeholders(path);
    let mut path_pairs: Vec<(&str, &str)> = Vec::new();
    let mut query_pairs: Vec<(&str, &str)> = Vec::new();
    for (target, key, value) in pairs {
        let in_path = match target {
            BindingTarget::UrlPath => true,
            BindingTarget::UrlPathOrQuery => placeholders
                .iter()
                .any(|name| name.eq_ignore_ascii_case(key)),
            _ => false,
        };
        if in_path {
            path_pairs.push((key, value));
        } else {
            query_pairs.push((key, value));
        }
    }

    let path = substitute(path, &path_pairs);

    let mut query: Vec<String> = existing_query
        .filter(|q| !q.is_empty())
        .map(|q| vec![q.to_string()])
        .unwrap_or_default();
    query.extend(
        query_pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))),
    );

    let mut url = prefix.to_string();
    if !path.is_empty() {
        if !prefix.is_empty() {
            url.push('/');
        }
        url.push_str(&path);
    }
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Split `scheme://authority` from the path. The path loses its leading
/// slash. Strings without a scheme (UNC and relative paths) are all path.
fn split_authority(url: &str) -> (&str, &str) {
    let Some(scheme_end) = url.find("://") else {
        return ("", url);
    };
    let after = scheme_end + 3;
    match url[after..].find('/') {
        Some(slash) => {
            let split = after + slash;
            (&url[..split], &url[split + 1..])
        }
        None => (url, ""),
    }
}

fn placeholders(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        names.push(&rest[open + 1..open + close]);
        rest = &rest[open + close + 1..];
    }
    names
}

fn substitute(path: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..open + close];
        let values: Vec<String> = pairs
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| urlencoding::encode(value).into_owned())
            .collect();
        out.push_str(&values.join("/"));
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}
