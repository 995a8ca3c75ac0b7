use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single `{name, value}` pair, the shape the legacy API expects for
/// record attributes and link field selections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: Value,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<NameValue> for Value {
    fn from(pair: NameValue) -> Self {
        let mut object = Map::new();
        object.insert("name".to_string(), Value::String(pair.name));
        object.insert("value".to_string(), pair.value);
        Value::Object(object)
    }
}

/// Converts field-keyed pairs into a name/value list. Field names are
/// lower-cased; iteration order is kept.
pub fn name_value_list<I, K, V>(fields: I) -> Vec<NameValue>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(name, value)| NameValue::new(name.as_ref().to_lowercase(), value))
        .collect()
}

/// Shapes a `link_name_to_fields_array` mapping. An empty mapping is sent
/// as `{}`, which the server reads as "no links".
pub(crate) fn link_fields(links: &Map<String, Value>) -> Value {
    if links.is_empty() {
        return Value::Object(Map::new());
    }
    let pairs = name_value_list(links.iter().map(|(name, value)| (name, value.clone())));
    Value::Array(pairs.into_iter().map(Value::from).collect())
}
