//! Field classification into binding targets.
//!
//! Precedence, first match wins:
//!
//! 1. ignored field or type: [`BindingTarget::Ignore`]
//! 2. body field or byte stream: [`BindingTarget::Body`]
//! 3. explicit path / query / header annotation (first declared wins)
//! 4. credential typed field, unless suppressed: [`BindingTarget::Credentials`]
//! 5. body marker on the model type or the client profile: [`BindingTarget::Body`]
//! 6. header collection type: [`BindingTarget::Header`]
//! 7. anything else: [`BindingTarget::UrlPathOrQuery`]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use restbind_client::{Error, Result};
use tracing::warn;

use crate::body::BodyFormat;
use crate::model::{
    Accessor, BodyWriter, ExplicitTarget, FieldSpec, Model, ModelWriter, Schema,
};
use crate::profile::Owner;
use crate::value::{FieldKind, FormatSpec, ValueConverter};

/// Where a field's value goes in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingTarget {
    Ignore,
    UrlPath,
    UrlQuery,
    /// Path if the key names a placeholder of the base URL, else query.
    UrlPathOrQuery,
    Header,
    Credentials,
    Body,
}

impl BindingTarget {
    /// Returns true for the URL targets.
    pub fn is_url(&self) -> bool {
        matches!(
            self,
            BindingTarget::UrlPath | BindingTarget::UrlQuery | BindingTarget::UrlPathOrQuery
        )
    }
}

/// Classified field: target, effective name and conversion settings.
pub struct FieldBinding<M> {
    /// Registered name.
    pub name: String,
    /// Name used for keys.
    pub effective_name: String,
    /// True if the name was explicitly overridden.
    pub name_overridden: bool,
    pub target: BindingTarget,
    pub kind: FieldKind,
    pub format: Option<FormatSpec>,
    pub(crate) converter: Option<Arc<dyn ValueConverter>>,
    pub(crate) accessor: Accessor<M>,
    pub(crate) body_writer: Option<BodyWriter<M>>,
}

impl<M> fmt::Debug for FieldBinding<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("effective_name", &self.effective_name)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("custom_converter", &self.converter.is_some())
            .finish()
    }
}

/// Classified fields of one model type for one client profile.
pub struct ModelDescriptor<M> {
    fields: Vec<FieldBinding<M>>,
    ignore_for_url: bool,
    body: Option<BodyFormat>,
    writer: Option<ModelWriter<M>>,
}

impl<M> fmt::Debug for ModelDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("model", &std::any::type_name::<M>())
            .field("fields", &self.fields)
            .field("ignore_for_url", &self.ignore_for_url)
            .field("body", &self.body)
            .field("serializable", &self.writer.is_some())
            .finish()
    }
}

impl<M: Model> ModelDescriptor<M> {
    /// Classify `M`'s fields for the client profile `owner`.
    pub fn classify(owner: &Owner) -> Result<Self> {
        let schema = Schema::<M>::of();
        let type_name = std::any::type_name::<M>();
        let type_body =
            schema.body.is_some() || (owner.body_format.is_some() && schema.writer.is_some());

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(schema.fields.len());
        for spec in schema.fields {
            if !seen.insert(spec.name.clone()) {
                return Err(Error::config(format!(
                    "field '{}' registered twice on {type_name}",
                    spec.name
                )));
            }
            validate(&spec, type_name)?;
            let target = target_of(&spec, schema.ignore_all, type_body, type_name)?;
            fields.push(FieldBinding {
                effective_name: spec.rename.clone().unwrap_or_else(|| spec.name.clone()),
                name_overridden: spec.rename.is_some(),
                name: spec.name,
                target,
                kind: spec.kind,
                format: spec.format,
                converter: spec.converter,
                accessor: spec.accessor,
                body_writer: spec.body_writer,
            });
        }

        Ok(Self {
            fields,
            ignore_for_url: schema.ignore_for_url,
            body: schema.body,
            writer: schema.writer,
        })
    }
}

impl<M> ModelDescriptor<M> {
    /// Classified fields in registration order.
    pub fn fields(&self) -> &[FieldBinding<M>] {
        &self.fields
    }

    /// Fields bound to `target`.
    pub fn fields_for(&self, target: BindingTarget) -> impl Iterator<Item = &FieldBinding<M>> {
        self.fields.iter().filter(move |f| f.target == target)
    }

    /// True if the type asked to leave the URL alone.
    pub fn ignore_for_url(&self) -> bool {
        self.ignore_for_url
    }

    /// Body format declared on the model type.
    pub fn body_format(&self) -> Option<&BodyFormat> {
        self.body.as_ref()
    }

    /// Serializer of the whole model, if the model registered one.
    pub(crate) fn model_writer(&self) -> Option<&ModelWriter<M>> {
        self.writer.as_ref()
    }

    /// `(name, effective name, target)` for every field.
    pub fn summary(&self) -> Vec<(String, String, BindingTarget)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.effective_name.clone(), f.target))
            .collect()
    }
}

fn validate<M>(spec: &FieldSpec<M>, type_name: &str) -> Result<()> {
    if matches!(&spec.rename, Some(name) if name.trim().is_empty()) {
        return Err(Error::config(format!(
            "field '{}' on {type_name} renamed to an empty name",
            spec.name
        )));
    }
    if matches!(&spec.separator, Some(sep) if sep.is_empty()) {
        return Err(Error::config(format!(
            "field '{}' on {type_name} has an empty separator",
            spec.name
        )));
    }
    if let Some(format) = &spec.format {
        format.validate().map_err(|message| {
            Error::config(format!("field '{}' on {type_name}: {message}", spec.name))
        })?;
    }
    if spec.credentials == Some(true) && spec.kind != FieldKind::Credentials {
        return Err(Error::config(format!(
            "field '{}' on {type_name} is marked as credentials but is not a credential type",
            spec.name
        )));
    }
    Ok(())
}

fn target_of<M>(
    spec: &FieldSpec<M>,
    ignore_all: bool,
    type_body: bool,
    type_name: &str,
) -> Result<BindingTarget> {
    if spec.ignore || ignore_all {
        return Ok(BindingTarget::Ignore);
    }
    if spec.body_writer.is_some() || spec.kind == FieldKind::Stream {
        return Ok(BindingTarget::Body);
    }
    if let Some(first) = spec.explicit.first() {
        if spec.explicit.iter().any(|t| t != first) {
            warn!(
                model = type_name,
                field = %spec.name,
                chosen = ?first,
                "Conflicting binding annotations, using the first declared"
            );
        }
        return Ok(match first {
            ExplicitTarget::Path => BindingTarget::UrlPath,
            ExplicitTarget::Query => BindingTarget::UrlQuery,
            ExplicitTarget::Header => BindingTarget::Header,
        });
    }
    if spec.kind == FieldKind::Credentials && spec.credentials != Some(false) {
        return Ok(BindingTarget::Credentials);
    }
    if type_body {
        return Ok(BindingTarget::Body);
    }
    if spec.kind == FieldKind::HeaderCollection {
        return Ok(BindingTarget::Header);
    }
    if spec.kind == FieldKind::Credentials {
        return Ok(BindingTarget::Ignore);
    }
    Ok(BindingTarget::UrlPathOrQuery)
}
