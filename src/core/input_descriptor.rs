use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::NonEmptyVec;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// Only the dotted member subset is understood when evaluating credentials: `$.a.b.c`,
/// a bare member name, or `$` for the root.
pub type JsonPath = String;

/// Input Descriptors are objects used to describe the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// All Input Descriptors MUST be satisfied.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default)]
    constraints: Constraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
}

impl InputDescriptor {
    /// Create a new instance of the input descriptor with the given id and constraints.
    ///
    /// The value of the id property MUST be a string that does not conflict with the id of
    /// another Input Descriptor Object in the same Presentation Definition.
    pub fn new(id: String, constraints: Constraints) -> Self {
        Self {
            id,
            constraints,
            ..Default::default()
        }
    }

    /// Return the id of the input descriptor.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Return the constraints of the input descriptor.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Set the name of the input descriptor.
    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the purpose of the input descriptor.
    ///
    /// If present, the purpose MUST be a string that describes the purpose for which the
    /// [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim)'s
    /// data is being requested.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    /// Return the purpose of the input descriptor.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Return the requested fields of the input descriptor, e.g. `degree` for
    /// `$.credentialSubject.degree`.
    pub fn requested_fields(&self) -> Vec<String> {
        self.constraints()
            .fields()
            .iter()
            .flat_map(|field| field.requested_fields())
            .collect()
    }
}

/// Constraints are objects used to describe the constraints that a Holder must satisfy to
/// fulfill an Input Descriptor.
///
/// A constraint object MAY be empty, in which case any credential satisfies it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
}

impl Constraints {
    /// Returns an empty Constraints object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field constraint to the constraints list.
    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the fields of the constraints object.
    pub fn fields(&self) -> &Vec<ConstraintsField> {
        self.fields.as_ref()
    }

    /// Returns if the constraints fields contain non-optional
    /// fields that must be satisfied.
    pub fn is_required(&self) -> bool {
        self.fields.iter().any(|field| field.is_required())
    }
}

/// ConstraintsField objects describe a single value the credential must (or may) carry.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
}

impl ConstraintsField {
    /// Create a new instance of the constraints field with the given path.
    pub fn new(path: JsonPath) -> ConstraintsField {
        ConstraintsField {
            path: NonEmptyVec::new(path),
            ..Default::default()
        }
    }

    /// Return the paths of the constraints field.
    pub fn path(&self) -> &NonEmptyVec<JsonPath> {
        &self.path
    }

    /// Set the filter applied to the value found at `path`.
    pub fn set_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Set the optional value of the constraints field.
    ///
    /// `true` indicates the field may be absent. A value that is present is still checked
    /// against the filter.
    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    /// Return the optional value of the constraints field.
    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Inverse alias for `!is_optional()`.
    pub fn is_required(&self) -> bool {
        !self.is_optional()
    }

    /// Return the last member name of each path.
    ///
    /// e.g., `["$.credentialSubject.degree"]` will return `["degree"]`.
    pub fn requested_fields(&self) -> Vec<String> {
        self.path()
            .iter()
            .filter_map(|path| path.split('.').last())
            .filter(|field| *field != "$")
            .map(ToOwned::to_owned)
            .collect()
    }
}

/// The subset of JSON Schema understood by field filters.
///
/// Unknown keywords are kept so definitions round-trip, but they are not evaluated.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<Contains>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Filter {
    /// `{"type": "array", "contains": {"const": value}}`
    pub fn array_contains_const(value: impl Into<Value>) -> Self {
        Self {
            type_: Some("array".into()),
            contains: Some(Contains {
                const_: Some(value.into()),
                enum_: None,
            }),
            ..Default::default()
        }
    }

    /// `{"type": "array", "contains": {"enum": values}}`
    pub fn array_contains_any(values: Vec<Value>) -> Self {
        Self {
            type_: Some("array".into()),
            contains: Some(Contains {
                const_: None,
                enum_: Some(values),
            }),
            ..Default::default()
        }
    }

    /// `{"type": "string", "enum": values}`
    pub fn string_enum(values: Vec<Value>) -> Self {
        Self {
            type_: Some("string".into()),
            enum_: Some(values),
            ..Default::default()
        }
    }

    /// `{"type": "string", "minLength": min}`
    pub fn string_min_length(min: usize) -> Self {
        Self {
            type_: Some("string".into()),
            min_length: Some(min),
            ..Default::default()
        }
    }
}

/// The `contains` keyword of an array filter.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contains {
    #[serde(default, rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,
}
