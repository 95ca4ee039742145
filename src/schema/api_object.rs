use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::error::{DefinitionError, DefinitionResult};

use super::validator::{SchemaError, Validator};
use super::{REF_PREFIX, Refs};

/// Which properties of a fixed-shape object are required.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Required {
    #[default]
    All,
    Subset(Vec<String>),
    Optional,
}

#[derive(Debug, Clone)]
enum Kind {
    String,
    Number,
    Integer,
    Boolean,
    Array {
        item_type: Box<ApiObject>,
    },
    Object {
        properties: Vec<(String, ApiObject)>,
        required: Vec<String>,
    },
    FreeFormObject {
        additional_properties_type: Box<ApiObject>,
    },
    Reference {
        name: String,
    },
    Any,
}

/// A node of a request/response schema.
///
/// Nodes are immutable once built. Each node compiles its own validator when
/// it is constructed; a node that points at a reference defined further up
/// the graph (see [`ApiObject::reference_to`]) only becomes valid once it is
/// embedded in the node that defines that name.
#[derive(Debug, Clone)]
pub struct ApiObject {
    kind: Kind,
    description: Option<String>,
    additional_params: Map<String, Value>,
    reference_name: Option<String>,
    validator: Result<Arc<Validator>, DefinitionError>,
}

impl ApiObject {
    fn build(kind: Kind) -> Self {
        let mut obj = Self {
            kind,
            description: None,
            additional_params: Map::new(),
            reference_name: None,
            validator: Err(DefinitionError::InvalidSchema {
                reason: "not compiled".to_string(),
            }),
        };
        obj.compile();
        obj
    }

    pub fn string() -> Self {
        Self::build(Kind::String)
    }

    pub fn number() -> Self {
        Self::build(Kind::Number)
    }

    pub fn integer() -> Self {
        Self::build(Kind::Integer)
    }

    pub fn boolean() -> Self {
        Self::build(Kind::Boolean)
    }

    pub fn array(item_type: ApiObject) -> Self {
        Self::build(Kind::Array {
            item_type: Box::new(item_type),
        })
    }

    /// Object with a fixed property map. Every property is required; use
    /// [`ApiObject::with_required`] to relax that.
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, ApiObject)>,
        K: Into<String>,
    {
        let properties: Vec<(String, ApiObject)> = properties
            .into_iter()
            .map(|(name, prop)| (name.into(), prop))
            .collect();
        let required = properties.iter().map(|(name, _)| name.clone()).collect();
        Self::build(Kind::Object {
            properties,
            required,
        })
    }

    /// "Free form" object whose values all share one type.
    pub fn free_form(additional_properties_type: ApiObject) -> Self {
        Self::build(Kind::FreeFormObject {
            additional_properties_type: Box::new(additional_properties_type),
        })
    }

    /// Placeholder pointing at a named schema defined elsewhere in the same
    /// graph. This is how recursive types are expressed.
    pub fn reference_to(name: impl Into<String>) -> Self {
        Self::build(Kind::Reference { name: name.into() })
    }

    /// Any JSON value. Rendered without a `type`.
    pub fn any() -> Self {
        Self::build(Kind::Any)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self.compile();
        self
    }

    pub fn with_reference_name(mut self, name: impl Into<String>) -> Self {
        self.reference_name = Some(name.into());
        self.compile();
        self
    }

    /// Merge implementation-specific keywords (e.g. `enum`, `minimum`) into
    /// the rendered schema.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.additional_params.extend(params);
        self.compile();
        self
    }

    pub fn with_param(self, key: impl Into<String>, value: Value) -> Self {
        let mut params = Map::new();
        params.insert(key.into(), value);
        self.with_params(params)
    }

    pub fn with_required(mut self, required: Required) -> DefinitionResult<Self> {
        let Kind::Object {
            properties,
            required: current,
        } = &mut self.kind
        else {
            return Err(DefinitionError::InvalidSchema {
                reason: "`required` only applies to objects with properties".to_string(),
            });
        };
        *current = match required {
            Required::All => properties.iter().map(|(name, _)| name.clone()).collect(),
            Required::Optional => Vec::new(),
            Required::Subset(names) => {
                if let Some(unknown) = names
                    .iter()
                    .find(|name| !properties.iter().any(|(declared, _)| declared == *name))
                {
                    return Err(DefinitionError::InvalidSchema {
                        reason: format!("required property '{}' is not declared", unknown),
                    });
                }
                names
            }
        };
        self.compile();
        Ok(self)
    }

    /// Keep only the declared properties among `names` as required. Used for
    /// built-in schemas whose shape is fixed.
    pub(crate) fn requiring(mut self, names: &[&str]) -> Self {
        if let Kind::Object {
            properties,
            required,
        } = &mut self.kind
        {
            *required = properties
                .iter()
                .filter(|(declared, _)| names.contains(&declared.as_str()))
                .map(|(declared, _)| declared.clone())
                .collect();
        }
        self.compile();
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn reference_name(&self) -> Option<&str> {
        self.reference_name.as_deref()
    }

    pub fn additional_params(&self) -> &Map<String, Value> {
        &self.additional_params
    }

    /// Declared properties in order, or `None` if this is not a fixed-shape
    /// object.
    pub fn properties(&self) -> Option<&[(String, ApiObject)]> {
        match &self.kind {
            Kind::Object { properties, .. } => Some(properties),
            _ => None,
        }
    }

    pub fn required(&self) -> Option<&[String]> {
        match &self.kind {
            Kind::Object { required, .. } => Some(required),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, Kind::Object { .. })
    }

    /// The JSON type name emitted under `type`.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Integer => "integer",
            Kind::Boolean => "boolean",
            Kind::Array { .. } => "array",
            Kind::Object { .. } | Kind::FreeFormObject { .. } => "object",
            Kind::Reference { .. } => "$ref",
            Kind::Any => "any",
        }
    }

    /// Render this node and collect every named schema it depends on.
    ///
    /// The node itself is always returned inlined, even when it carries a
    /// reference name; it is also registered under that name so recursive
    /// references to it resolve.
    pub fn describe(&self) -> (Value, Refs) {
        let mut refs = Refs::new();
        let schema = self.describe_into(&mut refs, true);
        (schema, refs)
    }

    /// Render into a shared refs accumulator. Named nodes are registered once
    /// and, unless `outermost`, replaced by a `$ref` pointer. A name already
    /// registered with a different body keeps its first body; use
    /// [`ApiObject::validator`] to find out whether that happened.
    pub fn describe_into(&self, refs: &mut Refs, outermost: bool) -> Value {
        self.render(refs, outermost, &mut Vec::new())
    }

    fn render(&self, refs: &mut Refs, outermost: bool, conflicts: &mut Vec<String>) -> Value {
        if let Kind::Reference { name } = &self.kind {
            return ref_pointer(name);
        }

        let mut spec = Map::new();
        if !matches!(self.kind, Kind::Any) {
            spec.insert("type".to_string(), json!(self.type_name()));
        }
        if let Some(description) = &self.description {
            spec.insert("description".to_string(), json!(description));
        }
        for (key, value) in &self.additional_params {
            spec.insert(key.clone(), value.clone());
        }
        match &self.kind {
            Kind::Array { item_type } => {
                spec.insert("items".to_string(), item_type.render(refs, false, conflicts));
            }
            Kind::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), prop.render(refs, false, conflicts)))
                    .collect();
                spec.insert("properties".to_string(), Value::Object(props));
                spec.insert("required".to_string(), json!(required));
            }
            Kind::FreeFormObject {
                additional_properties_type,
            } => {
                spec.insert(
                    "additionalProperties".to_string(),
                    additional_properties_type.render(refs, false, conflicts),
                );
            }
            _ => {}
        }

        let body = Value::Object(spec);
        match &self.reference_name {
            Some(name) => {
                match refs.get(name) {
                    Some(existing) if *existing != body => {
                        if !conflicts.contains(name) {
                            conflicts.push(name.clone());
                        }
                    }
                    Some(_) => {}
                    None => {
                        refs.insert(name.clone(), body.clone());
                    }
                }
                if outermost { body } else { ref_pointer(name) }
            }
            None => body,
        }
    }

    /// The compiled validator, or why this node cannot be validated on its
    /// own (an unresolved reference).
    pub fn validator(&self) -> Result<&Arc<Validator>, &DefinitionError> {
        self.validator.as_ref()
    }

    pub fn validate(&self, data: &Value) -> Result<(), SchemaError> {
        match &self.validator {
            Ok(validator) => validator.validate(data),
            Err(err) => Err(SchemaError {
                path: "data".to_string(),
                reason: format!("cannot be checked: {}", err),
            }),
        }
    }

    fn compile(&mut self) {
        let mut refs = Refs::new();
        let mut conflicts = Vec::new();
        let schema = self.render(&mut refs, true, &mut conflicts);
        self.validator = match conflicts.into_iter().next() {
            Some(name) => Err(DefinitionError::ConflictingReference { name }),
            None => Validator::compile(&schema, &refs).map(Arc::new),
        };
    }
}

fn ref_pointer(name: &str) -> Value {
    json!({ "$ref": format!("{}{}", REF_PREFIX, name) })
}
