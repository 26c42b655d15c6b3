//! Header and credential mapping.

use std::collections::HashSet;
use std::sync::Arc;

use restbind_client::{
    authority_of, Credential, CredentialCache, Credentials, DecoderRegistry, EndpointConfig,
    Error, ErrorKind, KeyValues, Result,
};

use crate::classify::{BindingTarget, ModelDescriptor};
use crate::convert::BoundPair;
use crate::value::ValueView;

/// Endpoint headers overlaid with model headers.
///
/// A model header replaces every endpoint header of the same name (compared
/// ignoring case). `Accept-Encoding` lists the registered decoders when the
/// endpoint asks for it and no header set one.
pub fn compose_headers(
    endpoint: &EndpointConfig,
    model_headers: &[BoundPair],
    decoders: &DecoderRegistry,
) -> KeyValues {
    let mut headers = KeyValues::new();
    for entry in &endpoint.headers {
        headers.add(entry.name.clone(), entry.value.clone());
    }

    let mut replaced = HashSet::new();
    for (_, name, value) in model_headers {
        if replaced.insert(name.to_ascii_lowercase()) {
            headers.remove_ignore_case(name);
        }
        headers.add(name.clone(), value.clone());
    }

    if endpoint.auto_accept_encoding && !headers.contains_key_ignore_case("accept-encoding") {
        if let Some(accept) = decoders.accept_encoding() {
            headers.add("Accept-Encoding", accept);
        }
    }
    headers
}

/// Credentials for one request.
///
/// No credential field falls back to the endpoint's configured credentials;
/// one field is used directly; several become a [`CredentialCache`] keyed by
/// the request authority and each field's effective name.
pub fn resolve_credentials<M>(
    descriptor: &ModelDescriptor<M>,
    model: &M,
    endpoint: &EndpointConfig,
    request_url: &str,
) -> Result<Option<Credentials>> {
    let mut found: Vec<(String, Arc<dyn Credential>)> = descriptor
        .fields_for(BindingTarget::Credentials)
        .filter_map(|field| match (field.accessor)(model) {
            ValueView::Credentials(credential) => Some((field.effective_name.clone(), credential)),
            _ => None,
        })
        .collect();

    match found.len() {
        0 => Ok(endpoint
            .credentials
            .as_ref()
            .map(|spec| Credentials::Single(spec.to_credential()))),
        1 => Ok(found.pop().map(|(_, credential)| Credentials::Single(credential))),
        _ => {
            let authority = authority_of(request_url).ok_or_else(|| {
                Error::new(ErrorKind::Composition(format!(
                    "Cannot key credentials: no authority in '{}'",
                    restbind_client::security::redact_url(request_url)
                )))
            })?;
            let mut cache = CredentialCache::new();
            for (label, credential) in found {
                cache.add(authority.clone(), label, credential);
            }
            Ok(Some(Credentials::Cache(cache)))
        }
    }
}
