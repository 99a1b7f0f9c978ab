//! Evaluation of credentials against a presentation definition.
//!
//! The engine is shared by the holder, to pick credentials for a request, and the verifier, to
//! check that a presentation satisfies every input descriptor.
//!
//! Selection is first-match-wins: each credential is assigned to the first descriptor (in
//! definition order) it satisfies, and credentials keep their source order. There is no
//! ranking between several credentials that satisfy the same descriptor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    credential::Credential,
    input_descriptor::{ConstraintsField, Filter, InputDescriptor},
    presentation_definition::PresentationDefinition,
};

/// A credential accepted for one of the definition's input descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCredential {
    pub credential: Credential,
    /// Hash of the credential in the holder's store, when it came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_hash: Option<String>,
    pub descriptor_id: String,
    pub matches_requirements: bool,
}

/// Match `credentials` against `definition`.
pub fn evaluate(credentials: &[Credential], definition: &PresentationDefinition) -> Vec<SelectedCredential> {
    evaluate_with_hashes(
        credentials.iter().map(|credential| (credential, None)),
        definition,
    )
}

/// Match credentials, carrying the store hash of each along.
pub fn evaluate_with_hashes<'a>(
    credentials: impl IntoIterator<Item = (&'a Credential, Option<String>)>,
    definition: &PresentationDefinition,
) -> Vec<SelectedCredential> {
    credentials
        .into_iter()
        .filter_map(|(credential, hash)| {
            let json = credential.to_json()?;
            let descriptor = definition
                .input_descriptors()
                .iter()
                .find(|descriptor| descriptor_satisfied(descriptor, &json))?;

            tracing::debug!("credential satisfies input descriptor {}", descriptor.id());
            Some(SelectedCredential {
                credential: credential.clone(),
                credential_hash: hash,
                descriptor_id: descriptor.id().to_string(),
                matches_requirements: true,
            })
        })
        .collect()
}

/// Whether every field constraint of `descriptor` holds for the normalized credential.
pub fn descriptor_satisfied(descriptor: &InputDescriptor, credential: &Value) -> bool {
    descriptor
        .constraints()
        .fields()
        .iter()
        .all(|field| field_satisfied(field, credential))
}

/// Ids of the descriptors of `definition` that none of `credentials` satisfies.
pub fn unsatisfied_descriptors(credentials: &[Value], definition: &PresentationDefinition) -> Vec<String> {
    definition
        .input_descriptors()
        .iter()
        .filter(|descriptor| {
            !credentials
                .iter()
                .any(|credential| descriptor_satisfied(descriptor, credential))
        })
        .map(|descriptor| descriptor.id().to_string())
        .collect()
}

fn field_satisfied(field: &ConstraintsField, credential: &Value) -> bool {
    match extract(credential, field.path()) {
        None => field.is_optional(),
        Some(value) => match field.filter() {
            None => true,
            Some(filter) => filter_matches(filter, value),
        },
    }
}

/// Walk every entry of `paths` in turn, each starting where the previous one ended.
///
/// `$.a.b` walks members `a` then `b`; any other entry is a single member name and `$`
/// alone is the current value. A missing member or `null` is absent.
fn extract<'a>(credential: &'a Value, paths: &[String]) -> Option<&'a Value> {
    let mut current = credential;

    for path in paths {
        let members: Vec<&str> = match path.as_str() {
            "$" => Vec::new(),
            p => match p.strip_prefix("$.") {
                Some(dotted) => dotted.split('.').collect(),
                None => vec![p],
            },
        };

        for member in members {
            current = current.as_object()?.get(member)?;
        }
    }

    (!current.is_null()).then_some(current)
}

/// Apply a filter. Checks run in order and the first applicable one decides.
fn filter_matches(filter: &Filter, value: &Value) -> bool {
    match filter.type_.as_deref() {
        Some("string") if !value.is_string() => return false,
        Some("array") if !value.is_array() => return false,
        _ => {}
    }

    if let (Some(contains), Value::Array(items)) = (&filter.contains, value) {
        if let Some(expected) = &contains.const_ {
            return items.contains(expected);
        }
        if let Some(allowed) = &contains.enum_ {
            return items.iter().any(|item| allowed.contains(item));
        }
    }

    if let (Some(min), Value::String(s)) = (filter.min_length, value) {
        return s.chars().count() >= min;
    }

    if let Some(allowed) = &filter.enum_ {
        return allowed.contains(value);
    }

    true
}
