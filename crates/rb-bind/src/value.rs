//! Field values as seen by the binding pipeline.
//!
//! Every field registered on a [`Schema`](crate::Schema) is read through an
//! accessor that produces a [`ValueView`]. The static [`FieldKind`] of the
//! field's type drives classification; the view drives conversion.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use restbind_client::{
    BasicCredentials, BearerToken, Credential, Error, ErrorKind, KeyValues, Result,
};
use uuid::Uuid;

use crate::model::Model;

/// What kind of value a field type holds, known without an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A single simple value.
    Scalar,
    /// A sequence of simple values.
    List,
    /// Keys with one or more values each.
    KeyValues,
    /// A header collection type.
    HeaderCollection,
    /// A nested model.
    Object,
    /// A credential.
    Credentials,
    /// Raw bytes sent as the request body.
    Stream,
}

/// A simple value, kept typed until it is formatted.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i128),
    UInt(u128),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Uuid(Uuid),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    /// Locale-invariant round-trip form.
    pub fn to_invariant(&self) -> String {
        match self {
            ScalarValue::Int(v) => v.to_string(),
            ScalarValue::UInt(v) => v.to_string(),
            ScalarValue::F32(v) => v.to_string(),
            ScalarValue::F64(v) => v.to_string(),
            ScalarValue::Bool(v) => v.to_string(),
            ScalarValue::Char(v) => v.to_string(),
            ScalarValue::Str(v) => v.clone(),
            ScalarValue::Uuid(v) => v.hyphenated().to_string(),
            ScalarValue::DateTime(v) => v.to_rfc3339(),
            ScalarValue::NaiveDateTime(v) => v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            ScalarValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            ScalarValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
            ScalarValue::Bytes(v) => base64::engine::general_purpose::STANDARD.encode(v),
        }
    }

    /// Format with an optional format spec.
    pub fn render(&self, format: Option<&FormatSpec>) -> Result<String> {
        match format {
            None => Ok(self.to_invariant()),
            Some(FormatSpec::Template(template)) => {
                Ok(template.replacen("{}", &self.to_invariant(), 1))
            }
            Some(FormatSpec::Temporal(pattern)) => self.render_temporal(pattern),
            Some(FormatSpec::Precision(digits)) => Ok(match self {
                ScalarValue::F32(v) => format!("{v:.digits$}"),
                ScalarValue::F64(v) => format!("{v:.digits$}"),
                other => other.to_invariant(),
            }),
        }
    }

    fn render_temporal(&self, pattern: &str) -> Result<String> {
        let mut out = String::new();
        let written = match self {
            ScalarValue::DateTime(v) => write!(out, "{}", v.format(pattern)),
            ScalarValue::NaiveDateTime(v) => write!(out, "{}", v.format(pattern)),
            ScalarValue::Date(v) => write!(out, "{}", v.format(pattern)),
            ScalarValue::Time(v) => write!(out, "{}", v.format(pattern)),
            other => return Ok(other.to_invariant()),
        };
        written.map_err(|_| {
            Error::new(ErrorKind::Composition(format!(
                "Invalid date/time format '{pattern}'"
            )))
        })?;
        Ok(out)
    }
}

/// How a field's values are formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpec {
    /// A template containing the value once, as `{}`.
    Template(String),
    /// A chrono `strftime` pattern for date/time values.
    Temporal(String),
    /// Fixed number of decimals for floating point values.
    Precision(usize),
}

impl FormatSpec {
    /// Shorthand for [`FormatSpec::Template`].
    pub fn template(template: impl Into<String>) -> Self {
        FormatSpec::Template(template.into())
    }

    /// Shorthand for [`FormatSpec::Temporal`].
    pub fn temporal(pattern: impl Into<String>) -> Self {
        FormatSpec::Temporal(pattern.into())
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        match self {
            FormatSpec::Template(t) if t.matches("{}").count() != 1 => Err(format!(
                "format template '{t}' must contain exactly one '{{}}'"
            )),
            FormatSpec::Temporal(p) if p.is_empty() => {
                Err("date/time format must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A simple value type.
///
/// Implement this for application enums or newtypes that should bind like a
/// string or number.
pub trait Scalar {
    /// The typed simple value.
    fn to_scalar(&self) -> ScalarValue;
}

macro_rules! impl_scalar {
    ($variant:ident as $repr:ty: $($ty:ty),*) => {
        $(impl Scalar for $ty {
            fn to_scalar(&self) -> ScalarValue {
                ScalarValue::$variant(*self as $repr)
            }
        })*
    };
}

impl_scalar!(Int as i128: i8, i16, i32, i64, i128, isize);
impl_scalar!(UInt as u128: u16, u32, u64, u128, usize);

impl Scalar for f32 {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::F32(*self)
    }
}

impl Scalar for f64 {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::F64(*self)
    }
}

impl Scalar for bool {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Bool(*self)
    }
}

impl Scalar for char {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Char(*self)
    }
}

impl Scalar for String {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Str(self.clone())
    }
}

impl Scalar for &'static str {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Str((*self).to_string())
    }
}

impl Scalar for Uuid {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Uuid(*self)
    }
}

impl Scalar for DateTime<Utc> {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::DateTime(self.fixed_offset())
    }
}

impl Scalar for DateTime<FixedOffset> {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::DateTime(*self)
    }
}

impl Scalar for NaiveDateTime {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::NaiveDateTime(*self)
    }
}

impl Scalar for NaiveDate {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Date(*self)
    }
}

impl Scalar for NaiveTime {
    fn to_scalar(&self) -> ScalarValue {
        ScalarValue::Time(*self)
    }
}

/// A nested model, borrowed from its owner or shared through an `Arc`.
pub enum ObjectRef<'a> {
    Borrowed(&'a dyn ErasedModel),
    Shared(Arc<dyn ErasedModel>),
}

impl ObjectRef<'_> {
    /// The model behind this reference.
    pub fn model(&self) -> &dyn ErasedModel {
        match self {
            ObjectRef::Borrowed(model) => *model,
            ObjectRef::Shared(model) => model.as_ref(),
        }
    }

    /// Instance identity: address plus concrete type.
    pub fn identity(&self) -> (usize, TypeId) {
        let model = self.model();
        (
            model as *const dyn ErasedModel as *const () as usize,
            model.model_type_id(),
        )
    }
}

impl fmt::Debug for ObjectRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef")
            .field(&self.model().model_type_name())
            .finish()
    }
}

/// Object-safe view of a [`Model`], used to walk nested models.
pub trait ErasedModel: Send + Sync {
    /// `TypeId` of the concrete model.
    fn model_type_id(&self) -> TypeId;

    /// Type name of the concrete model.
    fn model_type_name(&self) -> &'static str;

    /// Expand this model's fields into `out`, keys prefixed with `prefix`.
    fn expand(
        &self,
        converter: &mut crate::convert::Converter<'_>,
        prefix: &str,
        out: &mut Vec<(String, String)>,
    ) -> Result<()>;
}

impl<M: Model> ErasedModel for M {
    fn model_type_id(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn model_type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn expand(
        &self,
        converter: &mut crate::convert::Converter<'_>,
        prefix: &str,
        out: &mut Vec<(String, String)>,
    ) -> Result<()> {
        converter.expand_nested(self, prefix, out)
    }
}

/// A field's value read from one instance.
#[derive(Debug)]
pub enum ValueView<'a> {
    Null,
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
    KeyValues(Vec<(String, Vec<ScalarValue>)>),
    Object(ObjectRef<'a>),
    Credentials(Arc<dyn Credential>),
    Stream(Bytes),
}

/// A type that can be registered as a model field.
pub trait BindValue: Send + Sync {
    /// The static kind of this type.
    fn field_kind() -> FieldKind
    where
        Self: Sized;

    /// Read the value.
    fn view(&self) -> ValueView<'_>;
}

impl<T: Scalar + Send + Sync> BindValue for T {
    fn field_kind() -> FieldKind {
        FieldKind::Scalar
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(self.to_scalar())
    }
}

impl<T: BindValue> BindValue for Option<T> {
    fn field_kind() -> FieldKind {
        T::field_kind()
    }

    fn view(&self) -> ValueView<'_> {
        match self {
            Some(value) => value.view(),
            None => ValueView::Null,
        }
    }
}

impl BindValue for Vec<u8> {
    fn field_kind() -> FieldKind {
        FieldKind::Scalar
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(ScalarValue::Bytes(self.clone()))
    }
}

impl<T: Scalar + Send + Sync> BindValue for Vec<T> {
    fn field_kind() -> FieldKind {
        FieldKind::List
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::List(self.iter().map(Scalar::to_scalar).collect())
    }
}

impl<T: Scalar + Send + Sync> BindValue for BTreeSet<T> {
    fn field_kind() -> FieldKind {
        FieldKind::List
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::List(self.iter().map(Scalar::to_scalar).collect())
    }
}

fn single<K: Scalar, V: Scalar>((key, value): (&K, &V)) -> (String, Vec<ScalarValue>) {
    (key.to_scalar().to_invariant(), vec![value.to_scalar()])
}

fn multi<K: Scalar, V: Scalar>((key, values): (&K, &Vec<V>)) -> (String, Vec<ScalarValue>) {
    (
        key.to_scalar().to_invariant(),
        values.iter().map(Scalar::to_scalar).collect(),
    )
}

impl<K: Scalar + Send + Sync, V: Scalar + Send + Sync, S: Send + Sync> BindValue
    for HashMap<K, V, S>
{
    fn field_kind() -> FieldKind {
        FieldKind::KeyValues
    }

    fn view(&self) -> ValueView<'_> {
        let mut entries: Vec<_> = self.iter().map(single).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        ValueView::KeyValues(entries)
    }
}

impl<K: Scalar + Send + Sync, V: Scalar + Send + Sync, S: Send + Sync> BindValue
    for HashMap<K, Vec<V>, S>
{
    fn field_kind() -> FieldKind {
        FieldKind::KeyValues
    }

    fn view(&self) -> ValueView<'_> {
        let mut entries: Vec<_> = self.iter().map(multi).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        ValueView::KeyValues(entries)
    }
}

impl<K: Scalar + Send + Sync, V: Scalar + Send + Sync> BindValue for BTreeMap<K, V> {
    fn field_kind() -> FieldKind {
        FieldKind::KeyValues
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::KeyValues(self.iter().map(single).collect())
    }
}

impl<K: Scalar + Send + Sync, V: Scalar + Send + Sync> BindValue for BTreeMap<K, Vec<V>> {
    fn field_kind() -> FieldKind {
        FieldKind::KeyValues
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::KeyValues(self.iter().map(multi).collect())
    }
}

fn string_entries(kv: &KeyValues) -> Vec<(String, Vec<ScalarValue>)> {
    kv.iter()
        .map(|(key, values)| {
            (
                key.to_string(),
                values.iter().cloned().map(ScalarValue::Str).collect(),
            )
        })
        .collect()
}

impl BindValue for KeyValues {
    fn field_kind() -> FieldKind {
        FieldKind::KeyValues
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::KeyValues(string_entries(self))
    }
}

impl BindValue for reqwest::header::HeaderMap {
    fn field_kind() -> FieldKind {
        FieldKind::HeaderCollection
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::KeyValues(string_entries(&KeyValues::from(self)))
    }
}

impl BindValue for Bytes {
    fn field_kind() -> FieldKind {
        FieldKind::Stream
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::Stream(self.clone())
    }
}

impl BindValue for Arc<dyn Credential> {
    fn field_kind() -> FieldKind {
        FieldKind::Credentials
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::Credentials(self.clone())
    }
}

impl BindValue for BasicCredentials {
    fn field_kind() -> FieldKind {
        FieldKind::Credentials
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::Credentials(Arc::new(self.clone()))
    }
}

impl BindValue for BearerToken {
    fn field_kind() -> FieldKind {
        FieldKind::Credentials
    }

    fn view(&self) -> ValueView<'_> {
        ValueView::Credentials(Arc::new(self.clone()))
    }
}

/// Custom conversion of one field into `(key, value)` pairs.
pub trait ValueConverter: Send + Sync {
    /// Convert `value` of the field with effective name `name`.
    fn convert(
        &self,
        name: &str,
        value: &ValueView<'_>,
        format: Option<&FormatSpec>,
    ) -> Result<Vec<(String, String)>>;
}

/// Joins list items with a delimiter under a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatedConverter {
    separator: String,
}

impl SeparatedConverter {
    /// Join with `separator`.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// The delimiter.
    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl ValueConverter for SeparatedConverter {
    fn convert(
        &self,
        name: &str,
        value: &ValueView<'_>,
        format: Option<&FormatSpec>,
    ) -> Result<Vec<(String, String)>> {
        let items = match value {
            ValueView::Null => return Ok(Vec::new()),
            ValueView::Scalar(item) => vec![item.render(format)?],
            ValueView::List(items) => items
                .iter()
                .map(|item| item.render(format))
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(Error::config(format!(
                    "separated converter on '{name}' needs a list, got {other:?}"
                )))
            }
        };
        Ok(vec![(name.to_string(), items.join(&self.separator))])
    }
}
