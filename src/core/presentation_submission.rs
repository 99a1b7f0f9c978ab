use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_json_path::JsonPath;

use super::presentation_definition::PresentationDefinition;

/// A DescriptorMapId is a unique identifier for a DescriptorMap.
pub type DescriptorMapId = String;

/// Presentation Submissions are objects embedded within target
/// [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim) negotiation
/// formats that express how the inputs presented as proofs to a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) are
/// provided in accordance with the requirements specified in a [PresentationDefinition].
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    id: String,
    definition_id: DescriptorMapId,
    descriptor_map: Vec<DescriptorMap>,
}

impl PresentationSubmission {
    /// The presentation submission MUST contain an id property. The value of this property MUST be a unique identifier, i.e. a UUID.
    ///
    /// The presentation submission object MUST contain a `definition_id` property.
    /// The value of this property MUST be the id value of a valid [PresentationDefinition::id()].
    pub fn new(id: String, definition_id: DescriptorMapId, descriptor_map: Vec<DescriptorMap>) -> Self {
        Self {
            id,
            definition_id,
            descriptor_map,
        }
    }

    /// Return the id of the presentation submission.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the definition id of the presentation submission.
    pub fn definition_id(&self) -> &String {
        &self.definition_id
    }

    /// Return the descriptor map of the presentation submission.
    pub fn descriptor_map(&self) -> &Vec<DescriptorMap> {
        &self.descriptor_map
    }

    /// Parse a submission given either as an object or as its JSON string encoding
    /// (form-encoded responses carry it as a string).
    pub fn from_json(raw: &Json) -> std::result::Result<Self, String> {
        let parsed = match raw {
            Json::String(encoded) => serde_json::from_str(encoded),
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| format!("Invalid presentation_submission: {e}"))
    }

    /// Check the submission against the `definition` it claims to answer and the VP
    /// `payload` it is embedded with. Returns the problems found.
    pub fn validate(&self, definition: &PresentationDefinition, payload: &Json) -> Vec<String> {
        let mut errors = Vec::new();

        if &self.definition_id != definition.id() {
            errors.push(format!(
                "Presentation submission answers definition {} instead of {}",
                self.definition_id,
                definition.id()
            ));
        }

        for descriptor in &self.descriptor_map {
            if definition.input_descriptor(&descriptor.id).is_none() {
                errors.push(format!("Unknown input descriptor {}", descriptor.id));
                continue;
            }

            if descriptor.path.query(payload).is_empty() {
                errors.push(format!(
                    "Descriptor {} path {} selects nothing in the presentation",
                    descriptor.id, descriptor.path
                ));
            }
        }

        errors
    }
}

/// Descriptor Maps are objects used to describe the information a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder) provides to a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier).
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    pub format: String,
    pub path: JsonPath,
}

impl DescriptorMap {
    /// The `path` property indicates the claim submitted in relation to the identified
    /// input descriptor, when executed against the top-level of the object the submission
    /// is embedded within.
    pub fn new(id: impl Into<DescriptorMapId>, format: impl Into<String>, path: JsonPath) -> Self {
        Self {
            id: id.into(),
            format: format.into(),
            path,
        }
    }

    /// Entry for the `index`-th credential of a JWT VP.
    pub fn jwt_vp_credential(id: impl Into<DescriptorMapId>, index: usize) -> Result<Self> {
        let path = JsonPath::parse(&format!("$.vp.verifiableCredential[{index}]"))
            .context("invalid descriptor path")?;
        Ok(Self::new(id, "jwt_vp", path))
    }
}
