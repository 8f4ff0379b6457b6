//! "Extended" `application/x-www-form-urlencoded` decoding.
//!
//! Repeated keys collect into arrays and bracketed keys nest:
//!
//! ```text
//! a=1&a=2            → {"a": ["1", "2"]}
//! user[name]=ann     → {"user": {"name": "ann"}}
//! tags[]=x&tags[]=y  → {"tags": ["x", "y"]}
//! ids[1]=b&ids[0]=a  → {"ids": ["a", "b"]}
//! ```
//!
//! Keys nest at most [`MAX_DEPTH`] levels; whatever follows stays one
//! literal segment. A key whose shape conflicts with an earlier key is
//! stored under its literal text instead. Numeric brackets up to
//! [`ARRAY_LIMIT`] are array positions; larger ones, or a mix with named
//! keys, leave an object.

use serde_json::{Map, Value};
use url::form_urlencoded;

pub const MAX_DEPTH: usize = 5;
pub const ARRAY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Push,
}

/// Decode a form body into a JSON object.
pub fn decode_extended(input: &[u8]) -> Map<String, Value> {
    let mut out = Map::new();

    for (key, value) in form_urlencoded::parse(input) {
        if key.is_empty() {
            continue;
        }
        let value = Value::String(value.into_owned());

        if let Some((root, segments)) = split_key(&key) {
            if fits(out.get(&root), &segments) {
                insert(out.entry(root).or_insert(Value::Null), &segments, value);
                continue;
            }
        }

        let literal = key.into_owned();
        if fits(out.get(&literal), &[]) {
            insert(out.entry(literal).or_insert(Value::Null), &[], value);
        } else {
            tracing::debug!(key = %literal, "Dropping form field that conflicts with a nested key");
        }
    }

    for value in out.values_mut() {
        compact(value);
    }
    out
}

/// Split `a[b][]` into `("a", [Key("b"), Push])`. `None` means the key is
/// used literally.
fn split_key(key: &str) -> Option<(String, Vec<Segment>)> {
    let open = key.find('[')?;
    if open == 0 {
        return None;
    }
    let (root, mut rest) = key.split_at(open);
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if segments.len() == MAX_DEPTH {
            segments.push(Segment::Key(rest.to_string()));
            break;
        }
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let name = &inner[..close];
        segments.push(if name.is_empty() {
            Segment::Push
        } else if let Some(index) = array_index(name) {
            Segment::Index(index)
        } else {
            Segment::Key(name.to_string())
        });
        rest = &inner[close + 1..];
    }

    Some((root.to_string(), segments))
}

/// Canonical decimal index within [`ARRAY_LIMIT`]; `"007"` stays a key.
fn array_index(name: &str) -> Option<usize> {
    let index: usize = name.parse().ok()?;
    (index <= ARRAY_LIMIT && index.to_string() == name).then_some(index)
}

/// Whether `value` can be stored at `segments` below `slot` without
/// changing the shape of what is already there.
fn fits(slot: Option<&Value>, segments: &[Segment]) -> bool {
    match segments.split_first() {
        None => matches!(slot, None | Some(Value::String(_)) | Some(Value::Array(_))),
        Some((Segment::Push, rest)) => {
            rest.is_empty() && matches!(slot, None | Some(Value::String(_)) | Some(Value::Array(_)))
        }
        Some((Segment::Key(key), rest)) => match slot {
            None => fits(None, rest),
            Some(Value::Object(map)) => fits(map.get(key), rest),
            Some(_) => false,
        },
        Some((Segment::Index(index), rest)) => match slot {
            None => fits(None, rest),
            Some(Value::Object(map)) => fits(map.get(&index.to_string()), rest),
            Some(Value::Array(_)) => rest.is_empty(),
            Some(_) => false,
        },
    }
}

/// Store `value`; `Value::Null` marks an empty slot. Callers check
/// [`fits`] first.
fn insert(slot: &mut Value, segments: &[Segment], value: Value) {
    match segments.split_first() {
        None | Some((Segment::Push, _)) => {
            let push = segments.first() == Some(&Segment::Push);
            match slot {
                Value::Null if push => *slot = Value::Array(vec![value]),
                Value::Null => *slot = value,
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }
        Some((Segment::Key(key), rest)) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                insert(map.entry(key.clone()).or_insert(Value::Null), rest, value);
            }
        }
        // Positions are gathered under their decimal key and ordered by
        // `compact` once every pair is in.
        Some((Segment::Index(index), rest)) => match slot {
            Value::Array(items) => items.push(value),
            _ => {
                let mut keyed = vec![Segment::Key(index.to_string())];
                keyed.extend_from_slice(rest);
                insert(slot, &keyed, value);
            }
        },
    }
}

/// Turn objects whose keys are all array positions into arrays ordered by
/// position, dropping gaps.
fn compact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                compact(child);
            }
            if map.is_empty() || !map.keys().all(|k| array_index(k).is_some()) {
                return;
            }
            let mut positioned: Vec<(usize, Value)> = std::mem::take(map)
                .into_iter()
                .filter_map(|(k, v)| array_index(&k).map(|i| (i, v)))
                .collect();
            positioned.sort_by_key(|(i, _)| *i);
            *value = Value::Array(positioned.into_iter().map(|(_, v)| v).collect());
        }
        Value::Array(items) => items.iter_mut().for_each(compact),
        _ => {}
    }
}
