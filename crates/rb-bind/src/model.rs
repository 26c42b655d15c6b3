//! Request model registration.
//!
//! A model describes its fields once through [`Model::describe`]. The
//! resulting [`Schema`] is classified into binding targets and cached per
//! `(client profile, model)` pair.
//!
//! ```rust,ignore
//! use restbind_bind::{Model, Schema};
//!
//! struct GetUser {
//!     id: u64,
//!     expand: Vec<String>,
//!     tenant: String,
//! }
//!
//! impl Model for GetUser {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema.field("id", |m| &m.id);
//!         schema.field("expand", |m| &m.expand).separated(",");
//!         schema.field("tenant", |m| &m.tenant).header().rename("X-Tenant");
//!     }
//! }
//! ```

use std::sync::Arc;

use restbind_client::Result;
use serde::Serialize;

use crate::body::{self, BodyFormat, RequestBody};
use crate::value::{
    BindValue, FieldKind, FormatSpec, ObjectRef, SeparatedConverter, ValueConverter, ValueView,
};

/// A type that can be bound to an HTTP request.
pub trait Model: Sized + Send + Sync + 'static {
    /// Register this model's fields.
    fn describe(schema: &mut Schema<Self>);
}

/// The empty request.
impl Model for () {
    fn describe(_schema: &mut Schema<Self>) {}
}

pub(crate) type Accessor<M> = Arc<dyn for<'a> Fn(&'a M) -> ValueView<'a> + Send + Sync>;
pub(crate) type BodyWriter<M> = Arc<dyn Fn(&M) -> Result<RequestBody> + Send + Sync>;
pub(crate) type ModelWriter<M> = Arc<dyn Fn(&M, &BodyFormat) -> Result<RequestBody> + Send + Sync>;

fn accessor<M, F>(f: F) -> Accessor<M>
where
    F: for<'a> Fn(&'a M) -> ValueView<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An explicitly requested binding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExplicitTarget {
    Path,
    Query,
    Header,
}

/// One registered field and its annotations.
pub struct FieldSpec<M> {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) accessor: Accessor<M>,
    pub(crate) body_writer: Option<BodyWriter<M>>,
    pub(crate) explicit: Vec<ExplicitTarget>,
    pub(crate) ignore: bool,
    pub(crate) rename: Option<String>,
    pub(crate) format: Option<FormatSpec>,
    pub(crate) converter: Option<Arc<dyn ValueConverter>>,
    pub(crate) separator: Option<String>,
    pub(crate) credentials: Option<bool>,
}

impl<M> FieldSpec<M> {
    fn new(name: &str, kind: FieldKind, accessor: Accessor<M>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            accessor,
            body_writer: None,
            explicit: Vec::new(),
            ignore: false,
            rename: None,
            format: None,
            converter: None,
            separator: None,
            credentials: None,
        }
    }

    /// Never bind this field.
    pub fn ignore(&mut self) -> &mut Self {
        self.ignore = true;
        self
    }

    /// Bind into a `{name}` placeholder of the URL path.
    pub fn path(&mut self) -> &mut Self {
        self.explicit.push(ExplicitTarget::Path);
        self
    }

    /// Bind into the query string.
    pub fn query(&mut self) -> &mut Self {
        self.explicit.push(ExplicitTarget::Query);
        self
    }

    /// Bind as a request header.
    pub fn header(&mut self) -> &mut Self {
        self.explicit.push(ExplicitTarget::Header);
        self
    }

    /// Bind under `name` instead of the registered name.
    pub fn rename(&mut self, name: impl Into<String>) -> &mut Self {
        self.rename = Some(name.into());
        self
    }

    /// Format values with `format`.
    pub fn format(&mut self, format: FormatSpec) -> &mut Self {
        self.format = Some(format);
        self
    }

    /// Convert values with a custom converter.
    pub fn converter(&mut self, converter: Arc<dyn ValueConverter>) -> &mut Self {
        self.converter = Some(converter);
        self
    }

    /// Join list items with `separator` under one key.
    pub fn separated(&mut self, separator: impl Into<String>) -> &mut Self {
        let separator = separator.into();
        self.converter = Some(Arc::new(SeparatedConverter::new(separator.clone())));
        self.separator = Some(separator);
        self
    }

    /// Force (`true`) or suppress (`false`) credential use of a credential
    /// typed field.
    pub fn credentials(&mut self, use_as_credentials: bool) -> &mut Self {
        self.credentials = Some(use_as_credentials);
        self
    }
}

/// Field registrations and type-level options of one model type.
pub struct Schema<M> {
    pub(crate) fields: Vec<FieldSpec<M>>,
    pub(crate) ignore_all: bool,
    pub(crate) ignore_for_url: bool,
    pub(crate) body: Option<BodyFormat>,
    pub(crate) writer: Option<ModelWriter<M>>,
}

impl<M: Model> Schema<M> {
    pub(crate) fn of() -> Self {
        let mut schema = Self {
            fields: Vec::new(),
            ignore_all: false,
            ignore_for_url: false,
            body: None,
            writer: None,
        };
        M::describe(&mut schema);
        schema
    }

    /// Register a field read through `get`.
    pub fn field<V>(&mut self, name: &str, get: fn(&M) -> &V) -> &mut FieldSpec<M>
    where
        V: BindValue + 'static,
    {
        let spec = FieldSpec::new(name, V::field_kind(), accessor(move |m| get(m).view()));
        self.push(spec)
    }

    /// Register a nested model borrowed from this one.
    pub fn nested<N: Model>(&mut self, name: &str, get: fn(&M) -> Option<&N>) -> &mut FieldSpec<M> {
        let spec = FieldSpec::new(
            name,
            FieldKind::Object,
            accessor(move |m| match get(m) {
                Some(nested) => ValueView::Object(ObjectRef::Borrowed(nested)),
                None => ValueView::Null,
            }),
        );
        self.push(spec)
    }

    /// Register a shared nested model. Shared models may form cycles; a
    /// repeated instance is skipped during conversion.
    pub fn shared<N: Model>(
        &mut self,
        name: &str,
        get: fn(&M) -> Option<Arc<N>>,
    ) -> &mut FieldSpec<M> {
        let spec = FieldSpec::new(
            name,
            FieldKind::Object,
            accessor(move |m| match get(m) {
                Some(nested) => ValueView::Object(ObjectRef::Shared(nested)),
                None => ValueView::Null,
            }),
        );
        self.push(spec)
    }

    /// Register a field serialized as the request body.
    pub fn body_field<V>(
        &mut self,
        name: &str,
        get: fn(&M) -> &V,
        format: BodyFormat,
    ) -> &mut FieldSpec<M>
    where
        V: Serialize + Send + Sync + 'static,
    {
        let mut spec = FieldSpec::new(name, FieldKind::Object, accessor(|_| ValueView::Null));
        spec.body_writer = Some(Arc::new(move |m: &M| body::encode(&format, get(m))));
        self.push(spec)
    }

    /// Ignore every field of this type.
    pub fn ignore_all(&mut self) -> &mut Self {
        self.ignore_all = true;
        self
    }

    /// Leave the base URL untouched for this type.
    pub fn ignore_for_url(&mut self) -> &mut Self {
        self.ignore_for_url = true;
        self
    }

    fn push(&mut self, spec: FieldSpec<M>) -> &mut FieldSpec<M> {
        self.fields.push(spec);
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }
}

impl<M: Model + Serialize> Schema<M> {
    /// Serialize the whole model as the request body.
    pub fn body(&mut self, format: BodyFormat) -> &mut Self {
        self.body = Some(format);
        self.serializable()
    }

    /// Let a client profile's body format serialize the whole model.
    ///
    /// Models that never call this (or [`Schema::body`]) are not affected by
    /// a profile body format.
    pub fn serializable(&mut self) -> &mut Self {
        self.writer = Some(Arc::new(|model: &M, format: &BodyFormat| body::encode(format, model)));
        self
    }
}
