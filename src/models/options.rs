use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::models::name_value::NameValue;

/// The JSON kind of a keyword parameter, as reported by `WrongParameter`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ParamKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl ParamKind {
    pub fn of(value: &Value) -> ParamKind {
        match value {
            Value::Null => ParamKind::Null,
            Value::Bool(_) => ParamKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ParamKind::Integer,
            Value::Number(_) => ParamKind::Float,
            Value::String(_) => ParamKind::String,
            Value::Array(_) => ParamKind::Array,
            Value::Object(_) => ParamKind::Object,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Null => "null",
            ParamKind::Boolean => "boolean",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::String => "string",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        };
        f.write_str(name)
    }
}

const PARAMETER_SCHEMA: &[(&str, ParamKind)] = &[
    ("offset", ParamKind::Integer),
    ("select_fields", ParamKind::Array),
    ("link_name_to_fields_array", ParamKind::Object),
    ("max_results", ParamKind::Integer),
    ("deleted", ParamKind::Boolean),
    ("favorites", ParamKind::Boolean),
    ("fields", ParamKind::Array),
    ("track_view", ParamKind::Boolean),
];

/// Checks keyword parameters against the fixed schema. Keys outside the
/// schema are not inspected.
pub fn check_parameters(parameters: &Map<String, Value>) -> Result<(), ClientError> {
    for (key, expected) in PARAMETER_SCHEMA {
        if let Some(value) = parameters.get(*key) {
            let actual = ParamKind::of(value);
            if actual != *expected {
                return Err(ClientError::WrongParameter {
                    key: key.to_string(),
                    expected: *expected,
                    actual,
                });
            }
        }
    }
    Ok(())
}

fn from_parameters<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    let Value::Object(parameters) = &value else {
        return Err(ClientError::WrongParameter {
            key: "parameters".to_string(),
            expected: ParamKind::Object,
            actual: ParamKind::of(&value),
        });
    };
    check_parameters(parameters)?;
    serde_json::from_value(value).map_err(ClientError::Serde)
}

macro_rules! impl_try_from_parameters {
    ($($options:ty),+ $(,)?) => {
        $(
            impl TryFrom<Value> for $options {
                type Error = ClientError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    from_parameters(value)
                }
            }
        )+
    };
}

/// Options shared by `get_entry` and `get_entries`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetEntriesOptions {
    /// Fields to return. Empty returns every field.
    pub select_fields: Vec<String>,
    /// Link names mapped to the fields to return for each link.
    pub link_name_to_fields_array: Map<String, Value>,
    /// Flag the records as recently viewed.
    pub track_view: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetEntriesCountOptions {
    /// SQL WHERE clause without the word "where".
    pub query: String,
    pub deleted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetEntryListOptions {
    /// SQL WHERE clause without the word "where". Qualify columns with their
    /// table name to avoid ambiguous column errors.
    pub query: String,
    /// SQL ORDER BY clause without the phrase "order by".
    pub order_by: String,
    pub offset: i64,
    pub select_fields: Vec<String>,
    pub link_name_to_fields_array: Map<String, Value>,
    /// Zero lets the server pick its default page size.
    pub max_results: i64,
    pub deleted: bool,
    pub favorites: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetModuleFieldsOptions {
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetRelationshipsOptions {
    /// WHERE fragment applied on top of the relationship filter.
    pub related_module_query: String,
    pub related_fields: Vec<String>,
    pub related_module_link_name_to_fields_array: Vec<NameValue>,
    pub deleted: bool,
    pub order_by: String,
    pub offset: i64,
    /// `None` returns every related record.
    pub limit: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchByModuleOptions {
    pub offset: i64,
    pub max_results: i64,
    /// Restrict matches to records assigned to this user. Empty disables the
    /// filter.
    pub assigned_user_id: String,
    pub select_fields: Vec<String>,
    pub unified_search_only: bool,
    pub favorites: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetRelationshipOptions {
    pub name_value_list: Vec<NameValue>,
    /// Remove the relationship instead of adding it.
    pub delete: bool,
}

impl_try_from_parameters!(
    GetEntriesOptions,
    GetEntriesCountOptions,
    GetEntryListOptions,
    GetModuleFieldsOptions,
    GetRelationshipsOptions,
    SearchByModuleOptions,
    SetRelationshipOptions,
);

#[cfg(test)]
mod tests {
    use claim::{assert_err, assert_matches, assert_ok};
    use serde_json::json;

    use super::{
        GetEntriesOptions, GetEntryListOptions, GetModuleFieldsOptions, ParamKind,
    };
    use crate::error::ClientError;

    #[test]
    fn string_offset_is_rejected() {
        let err = GetEntryListOptions::try_from(json!({"offset": "5"})).unwrap_err();

        assert_eq!(err.to_string(), "offset must be integer not string");
        assert_matches!(
            err,
            ClientError::WrongParameter {
                ref key,
                expected: ParamKind::Integer,
                actual: ParamKind::String,
            } if key == "offset"
        );
    }

    #[test]
    fn boolean_flags_must_be_booleans() {
        assert_matches!(
            GetEntriesOptions::try_from(json!({"track_view": 1})),
            Err(ClientError::WrongParameter { .. })
        );
    }

    #[test]
    fn fields_must_be_a_list() {
        assert_err!(GetModuleFieldsOptions::try_from(json!({"fields": "name"})));
    }

    #[test]
    fn non_object_parameters_are_rejected() {
        assert_matches!(
            GetEntryListOptions::try_from(json!([1, 2])),
            Err(ClientError::WrongParameter {
                actual: ParamKind::Array,
                ..
            })
        );
    }

    #[test]
    fn negative_offset_is_forwarded() {
        let options = assert_ok!(GetEntryListOptions::try_from(json!({
            "offset": -1,
            "max_results": -1,
        })));

        assert_eq!(options.offset, -1);
        assert_eq!(options.max_results, -1);
    }

    #[test]
    fn valid_parameters_fill_defaults() {
        let options = assert_ok!(GetEntryListOptions::try_from(json!({
            "query": "leads.status = 'New'",
            "offset": 20,
            "deleted": true,
        })));

        assert_eq!(options.offset, 20);
        assert!(options.deleted);
        assert_eq!(options.max_results, 0);
        assert!(options.select_fields.is_empty());
    }
}
