//! Extraction schemas: the field map a schema-constrained request must satisfy.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
}

impl FieldType {
    fn wire_name(self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Number => "NUMBER",
            FieldType::Integer => "INTEGER",
            FieldType::Boolean => "BOOLEAN",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
}

impl SchemaField {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            enum_values: None,
            required: true,
        }
    }

    pub fn optional(name: &str, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("required field '{0}' is missing")]
    MissingField(String),

    #[error("field '{0}' is not part of the schema")]
    UnknownField(String),

    #[error("field '{field}' should be of type {expected:?}")]
    WrongType { field: String, expected: FieldType },

    #[error("field '{field}' has value '{value}' outside its allowed set")]
    NotInEnum { field: String, value: String },
}

/// Ordered field map for schema-constrained extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSchema {
    fields: Vec<SchemaField>,
}

impl ExtractionSchema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Human-readable field list appended to the instruction segment.
    pub fn describe(&self) -> String {
        let mut out = String::from(
            "Retorne APENAS um objeto JSON com exatamente os campos abaixo (sem texto fora do JSON):",
        );
        for field in &self.fields {
            out.push_str(&format!(
                "\n- {} ({}, {})",
                field.name,
                field.field_type.wire_name().to_lowercase(),
                if field.required {
                    "obrigatório"
                } else {
                    "opcional"
                }
            ));
            if let Some(values) = &field.enum_values {
                out.push_str(&format!(": um de [{}]", values.join(", ")));
            }
        }
        out
    }

    /// Schema in the generation service's `responseSchema` dialect.
    pub fn to_response_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({ "type": field.field_type.wire_name() });
            if let Some(values) = &field.enum_values {
                property["format"] = json!("enum");
                property["enum"] = json!(values);
            }
            properties.insert(field.name.clone(), property);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        let ordering: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();

        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
            "propertyOrdering": ordering,
        })
    }

    /// Strict parse: unknown keys, missing required fields, wrong types and values
    /// outside an enum are all errors. Optional fields may be absent or null.
    pub fn parse_strict(&self, text: &str) -> Result<Map<String, Value>, SchemaError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| SchemaError::NotJson(e.to_string()))?;
        let object = match value {
            Value::Object(object) => object,
            _ => return Err(SchemaError::NotAnObject),
        };

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.fields.iter().any(|f| &f.name == *key))
        {
            return Err(SchemaError::UnknownField(unknown.clone()));
        }

        for field in &self.fields {
            let value = match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SchemaError::MissingField(field.name.clone()))
                }
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            if !field.field_type.accepts(value) {
                return Err(SchemaError::WrongType {
                    field: field.name.clone(),
                    expected: field.field_type,
                });
            }

            if let (Some(allowed), Some(text)) = (&field.enum_values, value.as_str()) {
                if !allowed.iter().any(|a| a == text) {
                    return Err(SchemaError::NotInEnum {
                        field: field.name.clone(),
                        value: text.to_string(),
                    });
                }
            }
        }

        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party_schema() -> ExtractionSchema {
        ExtractionSchema::new(vec![
            SchemaField::required("nome", FieldType::String),
            SchemaField::optional("cep", FieldType::String),
            SchemaField::optional("tipoParte", FieldType::String)
                .with_enum(&["Vítima", "Investigado"]),
        ])
    }

    #[test]
    fn test_parse_strict_accepts_conforming_object() {
        let parsed = party_schema()
            .parse_strict(r#"{"nome": "JOÃO DA SILVA", "tipoParte": "Vítima"}"#)
            .unwrap();
        assert_eq!(parsed["nome"], "JOÃO DA SILVA");
        assert!(parsed.get("cep").is_none());
    }

    #[test]
    fn test_parse_strict_rejects_missing_required() {
        let err = party_schema().parse_strict(r#"{"cep": "01000-000"}"#).unwrap_err();
        assert_eq!(err, SchemaError::MissingField("nome".to_string()));

        let err = party_schema().parse_strict(r#"{"nome": null}"#).unwrap_err();
        assert_eq!(err, SchemaError::MissingField("nome".to_string()));
    }

    #[test]
    fn test_parse_strict_rejects_unknown_field() {
        let err = party_schema()
            .parse_strict(r#"{"nome": "A", "apelido": "B"}"#)
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownField("apelido".to_string()));
    }

    #[test]
    fn test_parse_strict_rejects_wrong_type_and_enum() {
        let err = party_schema().parse_strict(r#"{"nome": 42}"#).unwrap_err();
        assert!(matches!(err, SchemaError::WrongType { .. }));

        let err = party_schema()
            .parse_strict(r#"{"nome": "A", "tipoParte": "Testemunha"}"#)
            .unwrap_err();
        assert!(matches!(err, SchemaError::NotInEnum { .. }));
    }

    #[test]
    fn test_parse_strict_rejects_non_objects() {
        assert_eq!(
            party_schema().parse_strict("[1, 2]").unwrap_err(),
            SchemaError::NotAnObject
        );
        assert!(matches!(
            party_schema().parse_strict("Nome: A").unwrap_err(),
            SchemaError::NotJson(_)
        ));
    }

    #[test]
    fn test_response_schema_shape() {
        let schema = party_schema().to_response_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["nome"]["type"], "STRING");
        assert_eq!(schema["properties"]["tipoParte"]["enum"][1], "Investigado");
        assert_eq!(schema["required"], json!(["nome"]));
        assert_eq!(schema["propertyOrdering"][2], "tipoParte");
    }

    #[test]
    fn test_integer_type_rejects_fractions() {
        let schema = ExtractionSchema::new(vec![SchemaField::required("folha", FieldType::Integer)]);
        assert!(schema.parse_strict(r#"{"folha": 12}"#).is_ok());
        assert!(schema.parse_strict(r#"{"folha": 12.5}"#).is_err());
    }
}
