//! Eager loading of associations.
//!
//! Each requested include costs exactly one secondary query, however many
//! rows requested it: foreign keys are collected across the whole row set,
//! the target is fetched with `reference IN (ids)`, and the results are
//! bucketed by key and spliced back onto the rows. Includes are resolved one
//! at a time, in request order, and nested includes are resolved by the
//! secondary query itself before control returns here.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tabula_core::{Connection, Cx, Error, Outcome, Row, Value, try_outcome};
use tabula_query::Includes;
use tabula_schema::Association;

use crate::entity::{Entity, Related};
use crate::model::Model;

type LoadFuture<'a> = Pin<Box<dyn Future<Output = Outcome<(), Error>> + Send + 'a>>;

/// Resolve every include in `includes` onto `entities`, sequentially.
///
/// Boxed because nested includes recurse through the query pipeline.
pub(crate) fn load<'a, C: Connection>(
    cx: &'a Cx,
    conn: &'a C,
    model: &'a Model,
    entities: &'a mut [Entity],
    includes: &'a Includes,
) -> LoadFuture<'a> {
    Box::pin(async move {
        for (name, nested) in includes.iter() {
            let Some(assoc) = model.schema().association(name) else {
                return Outcome::Err(Error::UnknownAssociation {
                    model: model.type_name().to_string(),
                    name: name.to_string(),
                });
            };
            try_outcome!(load_association(cx, conn, model, assoc, entities, nested).await);
        }
        Outcome::Ok(())
    })
}

async fn load_association<C: Connection>(
    cx: &Cx,
    conn: &C,
    model: &Model,
    assoc: &Association,
    entities: &mut [Entity],
    nested: &Includes,
) -> Outcome<(), Error> {
    let foreign_key = model.schema().resolve_attribute(&assoc.foreign_key);
    let ids = collect_ids(entities, foreign_key);

    if ids.is_empty() {
        tracing::trace!(
            model = %model.type_name(),
            association = %assoc.attribute,
            "no keys to load, skipping query"
        );
        for entity in entities.iter_mut() {
            entity.attach(&assoc.attribute, Related::empty(assoc.is_many()));
        }
        return Outcome::Ok(());
    }

    let target = match model.sibling(&assoc.target) {
        Ok(target) => target,
        Err(e) => return Outcome::Err(e),
    };
    let reference = target.schema().resolve_attribute(&assoc.reference).to_string();

    tracing::debug!(
        model = %model.type_name(),
        association = %assoc.attribute,
        target = %assoc.target,
        ids = ids.len(),
        "eager loading"
    );

    let mut filter = Row::new();
    filter.insert(reference.clone(), Value::Array(ids));
    let mut query = target.query().where_eq(filter);
    if let Some(extra) = &assoc.extra_filter {
        query = query.filter(extra.clone());
    }
    if !nested.is_empty() {
        query = match query.includes(nested.clone()) {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
    }
    let related = try_outcome!(query.list(cx, conn).await);

    let buckets = bucket(related, &reference, assoc.is_many());
    for entity in entities.iter_mut() {
        let attached = match entity.get(foreign_key) {
            Some(Value::Array(keys)) => Related::Many(
                keys.iter()
                    .filter_map(Value::lookup_key)
                    .filter_map(|key| buckets.get(&key))
                    .flatten()
                    .cloned()
                    .collect(),
            ),
            Some(key) => {
                let bucket = key.lookup_key().and_then(|k| buckets.get(&k));
                match (assoc.is_many(), bucket) {
                    (true, Some(matches)) => Related::Many(matches.clone()),
                    (false, Some(matches)) => {
                        Related::One(matches.last().cloned().map(Box::new))
                    }
                    (many, None) => Related::empty(many),
                }
            }
            None => Related::empty(assoc.is_many()),
        };
        entity.attach(&assoc.attribute, attached);
    }
    Outcome::Ok(())
}

/// Distinct non-null keys, flattening array-valued keys, in first-seen order.
fn collect_ids(entities: &[Entity], foreign_key: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();
    let mut push = |value: &Value| {
        if let Some(key) = value.lookup_key() {
            if seen.insert(key) {
                ids.push(value.clone());
            }
        }
    };
    for entity in entities {
        match entity.get(foreign_key) {
            Some(Value::Array(items)) => items.iter().for_each(&mut push),
            Some(value) => push(value),
            None => {}
        }
    }
    ids
}

/// Group fetched entities by their reference value.
///
/// Has-many buckets keep every match in query order; has-one buckets keep
/// only the last match seen.
fn bucket(related: Vec<Entity>, reference: &str, many: bool) -> HashMap<String, Vec<Entity>> {
    let mut buckets: HashMap<String, Vec<Entity>> = HashMap::new();
    for entity in related {
        let Some(key) = entity.get(reference).and_then(Value::lookup_key) else {
            continue;
        };
        let slot = buckets.entry(key).or_default();
        if !many {
            slot.clear();
        }
        slot.push(entity);
    }
    buckets
}
