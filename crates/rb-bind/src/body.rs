//! Request body serialization.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use restbind_client::{EndpointConfig, Error, ErrorKind, RequestMethod, Result};
use serde::Serialize;

use crate::classify::{BindingTarget, ModelDescriptor};
use crate::model::Model;
use crate::profile::Owner;
use crate::value::ValueView;

/// Serializer for a custom body format.
pub trait BodyEncoder: Send + Sync {
    /// Content type of the encoded body.
    fn content_type(&self) -> &str;

    /// Encode the value, given as a JSON tree.
    fn encode(&self, value: serde_json::Value) -> Result<Vec<u8>>;
}

/// How a request body is serialized.
#[derive(Clone)]
pub enum BodyFormat {
    Json,
    Xml,
    /// `application/x-www-form-urlencoded`
    Form,
    Custom(Arc<dyn BodyEncoder>),
}

impl fmt::Debug for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyFormat::Json => f.write_str("Json"),
            BodyFormat::Xml => f.write_str("Xml"),
            BodyFormat::Form => f.write_str("Form"),
            BodyFormat::Custom(encoder) => f
                .debug_tuple("Custom")
                .field(&encoder.content_type())
                .finish(),
        }
    }
}

/// Encoded body and its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub content_type: String,
    pub bytes: Bytes,
}

fn serialization_error(e: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::with_source(ErrorKind::Serialization(e.to_string()), e)
}

/// Serialize `value` with `format`.
pub fn encode<T: Serialize + ?Sized>(format: &BodyFormat, value: &T) -> Result<RequestBody> {
    let (content_type, bytes) = match format {
        BodyFormat::Json => (
            "application/json; charset=utf-8".to_string(),
            serde_json::to_vec(value).map_err(serialization_error)?,
        ),
        BodyFormat::Xml => (
            "application/xml; charset=utf-8".to_string(),
            quick_xml::se::to_string(value)
                .map_err(serialization_error)?
                .into_bytes(),
        ),
        BodyFormat::Form => (
            "application/x-www-form-urlencoded".to_string(),
            serde_urlencoded::to_string(value)
                .map_err(serialization_error)?
                .into_bytes(),
        ),
        BodyFormat::Custom(encoder) => {
            let tree = serde_json::to_value(value).map_err(serialization_error)?;
            (encoder.content_type().to_string(), encoder.encode(tree)?)
        }
    };
    Ok(RequestBody {
        content_type,
        bytes: Bytes::from(bytes),
    })
}

/// Resolved method and body of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPlan {
    pub method: RequestMethod,
    pub body: Option<RequestBody>,
    /// Zero when no body was resolved for a method that needs one.
    pub content_length: Option<u64>,
}

/// Resolve the body for `model`: a body field first, then the model's type
/// marker, then the client profile's marker.
///
/// The method is `pinned`, else the endpoint default, else POST with a body
/// and GET without.
pub fn plan<M: Model>(
    descriptor: &ModelDescriptor<M>,
    owner: &Owner,
    endpoint: &EndpointConfig,
    model: &M,
    pinned: Option<RequestMethod>,
) -> Result<BodyPlan> {
    let body = resolve(descriptor, owner, model)?;
    let method = pinned.or(endpoint.method).unwrap_or(if body.is_some() {
        RequestMethod::Post
    } else {
        RequestMethod::Get
    });
    let content_length = match &body {
        None if method.requires_body() => Some(0),
        _ => None,
    };
    Ok(BodyPlan {
        method,
        body,
        content_length,
    })
}

fn resolve<M: Model>(
    descriptor: &ModelDescriptor<M>,
    owner: &Owner,
    model: &M,
) -> Result<Option<RequestBody>> {
    for field in descriptor.fields_for(BindingTarget::Body) {
        if let Some(writer) = &field.body_writer {
            return writer(model).map(Some);
        }
        if let ValueView::Stream(bytes) = (field.accessor)(model) {
            return Ok(Some(RequestBody {
                content_type: "application/octet-stream".to_string(),
                bytes,
            }));
        }
    }

    let Some(writer) = descriptor.model_writer() else {
        return Ok(None);
    };
    match descriptor.body_format().or(owner.body_format.as_ref()) {
        Some(format) => writer(model, format).map(Some),
        None => Ok(None),
    }
}
