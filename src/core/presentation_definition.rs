use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    credential::VERIFIABLE_CREDENTIAL,
    input_descriptor::{Constraints, ConstraintsField, Filter, InputDescriptor},
};
use crate::utils::generate_id;

/// A presentation definition is a JSON object that describes the information a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// Presentation Definitions are composed of inputs, which describe the forms and details of the
/// proofs they require. Every input descriptor must be satisfied by a presented credential.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
}

impl PresentationDefinition {
    /// The Presentation Definition MUST contain an id property. The value of this property MUST be a string.
    /// The string SHOULD provide a unique ID for the desired context.
    ///
    /// The Presentation Definition MUST contain an input_descriptors property. Its value MUST be an array of Input Descriptor Objects,
    /// the composition of which are found [InputDescriptor] type.
    pub fn new(id: String, input_descriptor: InputDescriptor) -> Self {
        Self {
            id,
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    /// The definition used when a verifier does not supply one: any credential whose
    /// `type` contains `VerifiableCredential`.
    pub fn any_credential() -> Self {
        let descriptor = InputDescriptor::new(
            "any_credential".into(),
            Constraints::new().add_constraint(
                ConstraintsField::new("$.type".into())
                    .set_filter(Filter::array_contains_const(VERIFIABLE_CREDENTIAL)),
            ),
        )
        .set_name("Any Verifiable Credential".into())
        .set_purpose("Please provide any verifiable credential".into());

        Self::new(generate_id(21), descriptor)
    }

    /// Build a single-descriptor definition from a verifier's requirements.
    pub fn from_requirements(requirements: &DefinitionRequirements) -> Self {
        let purpose = requirements
            .purpose
            .clone()
            .unwrap_or_else(|| "Credential verification".into());

        let types = if requirements.credential_types.is_empty() {
            vec![Value::from(VERIFIABLE_CREDENTIAL)]
        } else {
            requirements
                .credential_types
                .iter()
                .cloned()
                .map(Value::from)
                .collect()
        };

        let mut constraints = Constraints::new().add_constraint(
            ConstraintsField::new("$.type".into()).set_filter(Filter::array_contains_any(types)),
        );

        if !requirements.trusted_issuers.is_empty() {
            constraints = constraints.add_constraint(
                ConstraintsField::new("$.issuer".into()).set_filter(Filter::string_enum(
                    requirements
                        .trusted_issuers
                        .iter()
                        .cloned()
                        .map(Value::from)
                        .collect(),
                )),
            );
        }

        for field in &requirements.required_fields {
            constraints = constraints.add_constraint(
                ConstraintsField::new(format!("$.credentialSubject.{field}"))
                    .set_filter(Filter::string_min_length(1)),
            );
        }

        let descriptor = InputDescriptor::new("credential_input".into(), constraints)
            .set_name("Required Credential".into())
            .set_purpose(purpose.clone());

        Self::new(generate_id(21), descriptor)
            .set_name("Verifier Presentation Request".into())
            .set_purpose(purpose)
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> &String {
        &self.id
    }

    /// Add a new input descriptor to the presentation definition.
    pub fn add_input_descriptors(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    /// Return the input descriptors of the presentation definition.
    pub fn input_descriptors(&self) -> &Vec<InputDescriptor> {
        &self.input_descriptors
    }

    /// Return the input descriptor with the given id.
    pub fn input_descriptor(&self, id: &str) -> Option<&InputDescriptor> {
        self.input_descriptors.iter().find(|d| d.id() == id)
    }

    /// Set the name of the presentation definition.
    ///
    /// If present, its value SHOULD be a human-friendly string intended to constitute a
    /// distinctive designation of the Presentation Definition.
    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Return the name of the presentation definition.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the presentation definition.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    /// Return the purpose of the presentation definition.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Return the fields requested across all input descriptors.
    ///
    /// For example, `$.credentialSubject.givenName` yields `givenName`.
    pub fn requested_fields(&self) -> Vec<String> {
        self.input_descriptors
            .iter()
            .flat_map(InputDescriptor::requested_fields)
            .collect()
    }
}

/// Verifier requirements accepted by `/create-presentation-definition`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DefinitionRequirements {
    #[serde(default)]
    pub credential_types: Vec<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub trusted_issuers: Vec<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_definition_requires_verifiable_credential_type() {
        let definition = PresentationDefinition::any_credential();
        assert_eq!(definition.id().len(), 21);

        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["input_descriptors"][0]["id"], "any_credential");
        assert_eq!(
            value["input_descriptors"][0]["constraints"]["fields"][0],
            json!({
                "path": ["$.type"],
                "filter": { "type": "array", "contains": { "const": "VerifiableCredential" } }
            })
        );
    }

    #[test]
    fn requirements_expand_into_field_constraints() {
        let definition = PresentationDefinition::from_requirements(&DefinitionRequirements {
            credential_types: vec!["DemoCredential".into()],
            required_fields: vec!["degree".into(), "name".into()],
            trusted_issuers: vec!["did:key:issuer".into()],
            purpose: None,
        });

        assert_eq!(definition.purpose().map(String::as_str), Some("Credential verification"));
        let descriptor = definition.input_descriptor("credential_input").unwrap();
        let fields = descriptor.constraints().fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(
            fields[0].filter().unwrap().contains.as_ref().unwrap().enum_,
            Some(vec![json!("DemoCredential")])
        );
        assert_eq!(fields[1].path()[0], "$.issuer");
        assert_eq!(fields[3].filter().unwrap().min_length, Some(1));
        assert_eq!(definition.requested_fields(), vec!["type", "issuer", "degree", "name"]);
    }

    #[test]
    fn definitions_parse_from_wallet_json() {
        let json = r#"{
            "id": "vp-1",
            "input_descriptors": [{
                "id": "degree",
                "constraints": { "fields": [
                    { "path": ["$.credentialSubject.degree"], "optional": true }
                ] }
            }]
        }"#;
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        let definition: PresentationDefinition =
            serde_path_to_error::deserialize(deserializer).unwrap();
        assert_eq!(definition.input_descriptors().len(), 1);
        assert!(!definition.input_descriptors()[0].constraints().is_required());
    }
}
