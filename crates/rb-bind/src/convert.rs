//! Field values to `(key, value)` string pairs.

use std::any::TypeId;
use std::collections::HashSet;

use restbind_client::Result;

use crate::cache::MetadataCache;
use crate::classify::{BindingTarget, FieldBinding, ModelDescriptor};
use crate::model::Model;
use crate::profile::Owner;
use crate::value::{ErasedModel, ValueView};

/// A converted pair tagged with the target of the top-level field it came
/// from.
pub type BoundPair = (BindingTarget, String, String);

/// Converts one model graph.
///
/// Tracks visited instances so a nested model reached twice is expanded
/// once; reference cycles terminate.
pub struct Converter<'c> {
    cache: &'c MetadataCache,
    owner: &'c Owner,
    visited: HashSet<(usize, TypeId)>,
}

impl<'c> Converter<'c> {
    pub fn new(cache: &'c MetadataCache, owner: &'c Owner) -> Self {
        Self {
            cache,
            owner,
            visited: HashSet::new(),
        }
    }

    /// Convert the top-level fields of `model` whose target passes `keep`.
    pub fn convert<M: Model>(
        &mut self,
        descriptor: &ModelDescriptor<M>,
        model: &M,
        keep: impl Fn(BindingTarget) -> bool,
    ) -> Result<Vec<BoundPair>> {
        self.visited.insert(identity(model));

        let mut pairs = Vec::new();
        let mut field_pairs = Vec::new();
        for field in descriptor.fields().iter().filter(|f| keep(f.target)) {
            self.convert_field(field, model, "", &mut field_pairs)?;
            pairs.extend(
                field_pairs
                    .drain(..)
                    .map(|(key, value)| (field.target, key, value)),
            );
        }
        Ok(pairs)
    }

    /// Expand a nested model's fields under `prefix`.
    pub(crate) fn expand_nested<M: Model>(
        &mut self,
        model: &M,
        prefix: &str,
        out: &mut Vec<(String, String)>,
    ) -> Result<()> {
        let descriptor = self.cache.descriptor::<M>(self.owner)?;
        for field in descriptor.fields() {
            if matches!(
                field.target,
                BindingTarget::Ignore | BindingTarget::Body | BindingTarget::Credentials
            ) {
                continue;
            }
            self.convert_field(field, model, prefix, out)?;
        }
        Ok(())
    }

    fn convert_field<M>(
        &mut self,
        field: &FieldBinding<M>,
        model: &M,
        prefix: &str,
        out: &mut Vec<(String, String)>,
    ) -> Result<()> {
        let view = (field.accessor)(model);
        let key = format!("{prefix}{}", field.effective_name);
        let format = field.format.as_ref();

        if let Some(converter) = &field.converter {
            out.extend(converter.convert(&key, &view, format)?);
            return Ok(());
        }

        match view {
            ValueView::Null | ValueView::Credentials(_) | ValueView::Stream(_) => {}
            ValueView::Scalar(value) => out.push((key, value.render(format)?)),
            ValueView::List(items) => {
                for item in items {
                    out.push((key.clone(), item.render(format)?));
                }
            }
            ValueView::KeyValues(entries) => {
                for (inner, values) in entries {
                    let inner_key = if field.name_overridden {
                        format!("{key}.{inner}")
                    } else {
                        format!("{prefix}{inner}")
                    };
                    for value in values {
                        out.push((inner_key.clone(), value.render(format)?));
                    }
                }
            }
            ValueView::Object(object) => {
                if !self.visited.insert(object.identity()) {
                    return Ok(());
                }
                let nested_prefix = if field.name_overridden {
                    format!("{key}.")
                } else {
                    prefix.to_string()
                };
                ErasedModel::expand(object.model(), self, &nested_prefix, out)?;
            }
        }
        Ok(())
    }
}

fn identity<M: Model>(model: &M) -> (usize, TypeId) {
    (model as *const M as *const () as usize, TypeId::of::<M>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;
    use crate::profile::DefaultProfile;
    use crate::value::{FormatSpec, SeparatedConverter};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    fn pairs<M: Model>(model: &M) -> Vec<(String, String)> {
        let cache = MetadataCache::new();
        let owner = Owner::of::<DefaultProfile>();
        let descriptor = cache.descriptor::<M>(&owner).unwrap();
        Converter::new(&cache, &owner)
            .convert(&descriptor, model, |t| t != BindingTarget::Ignore)
            .unwrap()
            .into_iter()
            .map(|(_, k, v)| (k, v))
            .collect()
    }

    fn kv(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    struct Address {
        city: String,
        zip: Option<String>,
    }

    impl Model for Address {
        fn describe(schema: &mut Schema<Self>) {
            schema.field("city", |m| &m.city);
            schema.field("zip", |m| &m.zip);
        }
    }

    struct Customer {
        id: u32,
        tags: Vec<&'static str>,
        codes: Vec<u32>,
        home: Address,
        work: Address,
        filters: BTreeMap<String, String>,
        meta: BTreeMap<String, Vec<i32>>,
        price: f64,
    }

    impl Model for Customer {
        fn describe(schema: &mut Schema<Self>) {
            schema
                .field("id", |m| &m.id)
                .format(FormatSpec::template("c-{}"));
            schema.field("tags", |m| &m.tags);
            schema.field("codes", |m| &m.codes).separated(",");
            schema.nested("home", |m| Some(&m.home));
            schema.nested("work", |m| Some(&m.work)).rename("work");
            schema.field("filters", |m| &m.filters);
            schema.field("meta", |m| &m.meta).rename("m");
            schema.field("price", |m| &m.price).format(FormatSpec::Precision(2));
        }
    }

    #[test]
    fn test_convert_variants() {
        let customer = Customer {
            id: 7,
            tags: vec!["a", "b"],
            codes: vec![1, 2, 3],
            home: Address {
                city: "Oslo".into(),
                zip: None,
            },
            work: Address {
                city: "Bergen".into(),
                zip: Some("5003".into()),
            },
            filters: [("status".to_string(), "open".to_string())].into(),
            meta: [("x".to_string(), vec![1, 2])].into(),
            price: 9.5,
        };

        assert_eq!(
            pairs(&customer),
            kv(&[
                ("id", "c-7"),
                ("tags", "a"),
                ("tags", "b"),
                ("codes", "1,2,3"),
                ("city", "Oslo"),
                ("work.city", "Bergen"),
                ("work.zip", "5003"),
                ("status", "open"),
                ("m.x", "1"),
                ("m.x", "2"),
                ("price", "9.50"),
            ])
        );
    }

    struct Node {
        name: String,
        next: Mutex<Option<Arc<Node>>>,
    }

    impl Model for Node {
        fn describe(schema: &mut Schema<Self>) {
            schema.field("name", |m| &m.name);
            schema
                .shared("next", |m| m.next.lock().unwrap().clone())
                .rename("next");
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let a = Arc::new(Node {
            name: "a".into(),
            next: Mutex::new(None),
        });
        let b = Arc::new(Node {
            name: "b".into(),
            next: Mutex::new(Some(a.clone())),
        });
        *a.next.lock().unwrap() = Some(b.clone());

        assert_eq!(pairs(a.as_ref()), kv(&[("name", "a"), ("next.name", "b")]));

        // break the cycle so both nodes drop
        *a.next.lock().unwrap() = None;
    }

    struct Custom {
        ids: Vec<u32>,
    }

    impl Model for Custom {
        fn describe(schema: &mut Schema<Self>) {
            schema
                .field("ids", |m| &m.ids)
                .converter(Arc::new(SeparatedConverter::new("|")))
                .rename("id_list");
        }
    }

    #[test]
    fn test_custom_converter() {
        let model = Custom { ids: vec![4, 5] };
        assert_eq!(pairs(&model), kv(&[("id_list", "4|5")]));
    }
}
