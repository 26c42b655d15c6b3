//! Client profiles: per-client binding defaults.

use std::any::TypeId;

use crate::body::BodyFormat;
use crate::response::ResponseFormat;

/// Marker type describing a client.
///
/// Binding metadata is cached per `(profile, model)` pair, so two profiles
/// may bind the same model differently.
///
/// ```rust,ignore
/// struct Billing;
///
/// impl ClientProfile for Billing {
///     fn body_format() -> Option<BodyFormat> {
///         Some(BodyFormat::Json)
///     }
/// }
/// ```
pub trait ClientProfile: Send + Sync + 'static {
    /// Name used in logs and error context.
    fn name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Body format for serializable models without one of their own.
    ///
    /// Only models that registered [`Schema::serializable`] take it.
    ///
    /// [`Schema::serializable`]: crate::Schema::serializable
    fn body_format() -> Option<BodyFormat> {
        None
    }

    /// Response format for typed results without one of their own.
    fn response_format() -> Option<ResponseFormat> {
        None
    }
}

/// Profile with no markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProfile;

impl ClientProfile for DefaultProfile {}

/// A profile's settings, resolved at runtime.
#[derive(Debug, Clone)]
pub struct Owner {
    pub type_id: TypeId,
    pub name: &'static str,
    pub body_format: Option<BodyFormat>,
    pub response_format: Option<ResponseFormat>,
}

impl Owner {
    /// Resolve profile `P`.
    pub fn of<P: ClientProfile>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: P::name(),
            body_format: P::body_format(),
            response_format: P::response_format(),
        }
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
