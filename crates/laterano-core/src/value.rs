//! JSON values as component state, plus key-path helpers.
//!
//! `undefined` has no JSON spelling; APIs that can produce it return
//! `Option<Value>` and use `None`.

pub use serde_json::{Map, Number, Value, json};

/// Reads `path` from `root`. Numeric segments index arrays.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Writes `value` at `path`, creating intermediate objects as needed.
///
/// Missing, `null` and scalar intermediates become empty objects. Arrays are
/// indexed by numeric segment; an index equal to the length appends.
pub fn assign(root: &mut Value, path: &str, value: Value) {
    let segs: Vec<&str> = path.split('.').collect();
    assign_at(root, &segs, value);
}

fn assign_at(cur: &mut Value, segs: &[&str], value: Value) {
    let Some((head, rest)) = segs.split_first() else {
        *cur = value;
        return;
    };
    if let Value::Array(items) = cur
        && let Ok(i) = head.parse::<usize>()
        && i <= items.len()
    {
        if i == items.len() {
            items.push(Value::Null);
        }
        assign_at(&mut items[i], rest, value);
        return;
    }
    if !cur.is_object() {
        *cur = Value::Object(Map::new());
    }
    if let Value::Object(map) = cur {
        let slot = map.entry(head.to_string()).or_insert(Value::Null);
        assign_at(slot, rest, value);
    }
}

/// Two key paths are related when equal or one is a dotted prefix of the
/// other: writing `a` affects readers of `a.b`, and writing `a.b` affects
/// readers of `a`.
pub fn paths_related(a: &str, b: &str) -> bool {
    fn prefix(short: &str, long: &str) -> bool {
        long.len() > short.len()
            && long.starts_with(short)
            && long.as_bytes()[short.len()] == b'.'
    }
    a == b || prefix(a, b) || prefix(b, a)
}

pub fn root_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

pub fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Builds a JSON number, keeping integral results as integers so they
/// display as `2` rather than `2.0`.
pub fn number(f: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) => f.to_string(),
        None => "NaN".to_string(),
    }
}

/// Text form used by interpolation and attribute bindings.
pub fn display(v: Option<&Value>) -> String {
    match v {
        None => String::new(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => format_number(n),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => display(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// Stable identity string for list keys; distinguishes `1` from `"1"`.
pub fn key_string(v: Option<&Value>) -> String {
    match v {
        None => "undefined".to_string(),
        Some(v) => v.to_string(),
    }
}
