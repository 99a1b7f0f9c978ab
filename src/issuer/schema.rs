use std::{fmt::Debug, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

pub const JSON_SCHEMA_DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// A credential schema: the claims an offer of this kind must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSchema {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$schema", default = "default_dialect")]
    pub schema: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub type_: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn default_dialect() -> String {
    JSON_SCHEMA_DRAFT_07.to_string()
}

fn default_type() -> String {
    "object".to_string()
}

/// Admin input for a new schema. Every field becomes a required property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSchema {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<SchemaField>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
}

impl CredentialSchema {
    pub fn new(name: String, description: Option<String>, fields: &[SchemaField]) -> Self {
        let properties = fields
            .iter()
            .map(|field| (field.name.clone(), json!({ "type": field.type_ })))
            .collect();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            schema: default_dialect(),
            name,
            description,
            type_: default_type(),
            properties,
            required: fields.iter().map(|field| field.name.clone()).collect(),
        }
    }

    /// The validating part of the schema, without the registry metadata.
    fn json_schema(&self) -> Value {
        json!({
            "$schema": self.schema,
            "type": self.type_,
            "properties": self.properties,
            "required": self.required,
        })
    }

    /// Compile the schema, failing if it is not valid JSON Schema.
    pub fn compile(&self) -> Result<JSONSchema> {
        JSONSchema::compile(&self.json_schema())
            .map_err(|e| anyhow!("schema {} does not compile: {e}", self.id))
    }

    /// Validate a claims object. The error lists every violation found.
    pub fn validate_claims(&self, claims: &Map<String, Value>) -> Result<(), Vec<String>> {
        let compiled = self.compile().map_err(|e| vec![e.to_string()])?;
        let instance = Value::Object(claims.clone());

        compiled.validate(&instance).map_err(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{path}: {error}")
                    }
                })
                .collect()
        })
    }
}

/// Registry of credential schemas.
#[async_trait]
pub trait SchemaStore: Debug + Send + Sync {
    async fn list(&self) -> Result<Vec<CredentialSchema>>;

    async fn create(&self, schema: CredentialSchema) -> Result<()>;

    /// Remove a schema by `$id`, returning whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<CredentialSchema>> {
        Ok(self.list().await?.into_iter().find(|schema| schema.id == id))
    }

    /// Look a schema up by `$id` or by human name.
    async fn find(&self, id_or_name: &str) -> Result<Option<CredentialSchema>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|schema| schema.id == id_or_name || schema.name == id_or_name))
    }
}

/// A local in-memory store. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaStore {
    schemas: Arc<Mutex<Vec<CredentialSchema>>>,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn list(&self) -> Result<Vec<CredentialSchema>> {
        Ok(self.schemas.lock().await.clone())
    }

    async fn create(&self, schema: CredentialSchema) -> Result<()> {
        self.schemas.lock().await.push(schema);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut schemas = self.schemas.lock().await;
        let before = schemas.len();
        schemas.retain(|schema| schema.id != id);
        Ok(schemas.len() != before)
    }
}

/// Schemas kept as a pretty-printed JSON array in a file.
///
/// A missing file is an empty registry. Writes are serialized through a lock but the file is not
/// shared safely between processes.
#[derive(Debug, Clone)]
pub struct FileSchemaStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileSchemaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self) -> Result<Vec<CredentialSchema>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    async fn save(&self, schemas: &[CredentialSchema]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(schemas)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[async_trait]
impl SchemaStore for FileSchemaStore {
    async fn list(&self) -> Result<Vec<CredentialSchema>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn create(&self, schema: CredentialSchema) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut schemas = self.load().await?;
        schemas.push(schema);
        self.save(&schemas).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut schemas = self.load().await?;
        let before = schemas.len();
        schemas.retain(|schema| schema.id != id);
        if schemas.len() == before {
            return Ok(false);
        }
        self.save(&schemas).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn degree_schema() -> CredentialSchema {
        CredentialSchema::new(
            "DemoCredential".into(),
            Some("Demo".into()),
            &[SchemaField {
                name: "degree".into(),
                type_: "string".into(),
            }],
        )
    }

    #[test]
    fn claims_are_validated_against_properties() {
        let schema = degree_schema();
        assert_eq!(schema.required, vec!["degree"]);

        let ok = json!({ "degree": "CS" });
        assert!(schema.validate_claims(ok.as_object().unwrap()).is_ok());

        let wrong_type = json!({ "degree": 5 });
        let errors = schema
            .validate_claims(wrong_type.as_object().unwrap())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("/degree"), "{errors:?}");

        let missing = json!({});
        assert!(schema.validate_claims(missing.as_object().unwrap()).is_err());
    }

    #[tokio::test]
    async fn stores_find_by_id_or_name() {
        let store = MemorySchemaStore::new();
        let schema = degree_schema();
        store.create(schema.clone()).await.unwrap();

        assert_eq!(store.find("DemoCredential").await.unwrap(), Some(schema.clone()));
        assert_eq!(store.find(&schema.id).await.unwrap(), Some(schema.clone()));
        assert!(store.get("DemoCredential").await.unwrap().is_none());
        assert!(store.delete(&schema.id).await.unwrap());
        assert!(!store.delete(&schema.id).await.unwrap());
    }

    #[tokio::test]
    async fn file_store_persists_schemas() {
        let path = std::env::temp_dir().join(format!("schemas-{}.json", uuid::Uuid::new_v4()));
        let store = FileSchemaStore::new(&path);
        assert!(store.list().await.unwrap().is_empty());

        let schema = degree_schema();
        store.create(schema.clone()).await.unwrap();

        let reopened = FileSchemaStore::new(&path);
        let listed = reopened.list().await.unwrap();
        assert_eq!(listed, vec![schema.clone()]);

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["$schema"], JSON_SCHEMA_DRAFT_07);

        assert!(reopened.delete(&schema.id).await.unwrap());
        let _ = std::fs::remove_file(&path);
    }
}
