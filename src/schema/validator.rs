//! Compiled validators for rendered schemas
//!
//! A [`Validator`] is compiled once from the outermost rendering of an
//! [`ApiObject`](super::ApiObject) and its refs table, then shared read-only
//! across requests. Only the subset of JSON Schema / OpenAPI keywords that
//! the schema hierarchy can emit is understood.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::{DefinitionError, DefinitionResult};

use super::REF_PREFIX;

/// A failed validation. The message carries a path such as `data[0].x` and is
/// safe to return to a requester.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Schema validation failed: {path} {reason}")]
pub struct SchemaError {
    pub path: String,
    pub reason: String,
}

impl SchemaError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> DefinitionResult<Self> {
        match name {
            "string" => Ok(JsonType::String),
            "number" => Ok(JsonType::Number),
            "integer" => Ok(JsonType::Integer),
            "boolean" => Ok(JsonType::Boolean),
            "array" => Ok(JsonType::Array),
            "object" => Ok(JsonType::Object),
            other => Err(DefinitionError::InvalidSchema {
                reason: format!("unsupported type '{}'", other),
            }),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.is_i64() || value.is_u64(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    exclusive: bool,
}

#[derive(Debug)]
enum Additional {
    Allowed,
    Forbidden,
    Schema(Box<Node>),
}

#[derive(Debug)]
enum Node {
    Ref(String),
    Checks(Box<Checks>),
}

#[derive(Debug)]
struct Checks {
    ty: Option<JsonType>,
    nullable: bool,
    enum_values: Option<Vec<Value>>,
    minimum: Option<Bound>,
    maximum: Option<Bound>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min_items: Option<usize>,
    max_items: Option<usize>,
    items: Option<Node>,
    properties: Vec<(String, Node)>,
    required: Vec<String>,
    additional: Additional,
}

/// A schema compiled into a tree of checks plus its named definitions.
#[derive(Debug)]
pub struct Validator {
    root: Node,
    definitions: HashMap<String, Node>,
}

impl Validator {
    /// Compile `schema`, resolving every `$ref` against `refs`.
    pub fn compile(schema: &Value, refs: &Map<String, Value>) -> DefinitionResult<Self> {
        let root = compile_node(schema, refs)?;
        let definitions = refs
            .iter()
            .map(|(name, body)| Ok((name.clone(), compile_node(body, refs)?)))
            .collect::<DefinitionResult<HashMap<_, _>>>()?;
        Ok(Self { root, definitions })
    }

    pub fn validate(&self, data: &Value) -> Result<(), SchemaError> {
        self.check(&self.root, data, "data")
    }

    fn check(&self, node: &Node, data: &Value, path: &str) -> Result<(), SchemaError> {
        match node {
            Node::Ref(name) => match self.definitions.get(name) {
                Some(definition) => self.check(definition, data, path),
                None => Err(SchemaError::new(
                    path,
                    format!("refers to undefined schema '{}'", name),
                )),
            },
            Node::Checks(checks) => self.check_value(checks, data, path),
        }
    }

    fn check_value(&self, checks: &Checks, data: &Value, path: &str) -> Result<(), SchemaError> {
        if data.is_null() && checks.nullable {
            return Ok(());
        }
        if let Some(ty) = checks.ty {
            if !ty.matches(data) {
                return Err(SchemaError::new(path, format!("must be {}", ty)));
            }
        }
        if let Some(values) = &checks.enum_values {
            if !values.contains(data) {
                let listed = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(SchemaError::new(path, format!("must be one of [{}]", listed)));
            }
        }
        match data {
            Value::Number(n) => {
                let n = n.as_f64().unwrap_or(f64::NAN);
                if let Some(min) = checks.minimum {
                    if n < min.value || (min.exclusive && n == min.value) {
                        let op = if min.exclusive { "bigger than" } else { "bigger than or equal to" };
                        return Err(SchemaError::new(path, format!("must be {} {}", op, min.value)));
                    }
                }
                if let Some(max) = checks.maximum {
                    if n > max.value || (max.exclusive && n == max.value) {
                        let op = if max.exclusive { "smaller than" } else { "smaller than or equal to" };
                        return Err(SchemaError::new(path, format!("must be {} {}", op, max.value)));
                    }
                }
            }
            Value::String(s) => {
                let len = s.chars().count();
                if let Some(min) = checks.min_length {
                    if len < min {
                        return Err(SchemaError::new(
                            path,
                            format!("must be longer than or equal to {} characters", min),
                        ));
                    }
                }
                if let Some(max) = checks.max_length {
                    if len > max {
                        return Err(SchemaError::new(
                            path,
                            format!("must be shorter than or equal to {} characters", max),
                        ));
                    }
                }
            }
            Value::Array(items) => {
                if let Some(min) = checks.min_items {
                    if items.len() < min {
                        return Err(SchemaError::new(
                            path,
                            format!("must contain at least {} items", min),
                        ));
                    }
                }
                if let Some(max) = checks.max_items {
                    if items.len() > max {
                        return Err(SchemaError::new(
                            path,
                            format!("must contain less than or equal to {} items", max),
                        ));
                    }
                }
                if let Some(item_node) = &checks.items {
                    for (i, item) in items.iter().enumerate() {
                        self.check(item_node, item, &format!("{}[{}]", path, i))?;
                    }
                }
            }
            Value::Object(map) => {
                let missing: Vec<&str> = checks
                    .required
                    .iter()
                    .filter(|name| !map.contains_key(name.as_str()))
                    .map(|name| name.as_str())
                    .collect();
                if !missing.is_empty() {
                    return Err(SchemaError::new(
                        path,
                        format!("must contain {:?} properties", missing),
                    ));
                }
                for (name, node) in &checks.properties {
                    if let Some(value) = map.get(name) {
                        self.check(node, value, &format!("{}.{}", path, name))?;
                    }
                }
                for (name, value) in map {
                    if checks.properties.iter().any(|(declared, _)| declared == name) {
                        continue;
                    }
                    match &checks.additional {
                        Additional::Allowed => {}
                        Additional::Forbidden => {
                            return Err(SchemaError::new(
                                path,
                                format!("must not contain '{}' property", name),
                            ));
                        }
                        Additional::Schema(node) => {
                            self.check(node, value, &format!("{}.{}", path, name))?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> DefinitionError {
    DefinitionError::InvalidSchema {
        reason: reason.into(),
    }
}

fn as_usize(schema: &Map<String, Value>, key: &str) -> DefinitionResult<Option<usize>> {
    match schema.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid(format!("'{}' must be a non-negative integer", key))),
    }
}

fn as_bound(
    schema: &Map<String, Value>,
    key: &str,
    exclusive_key: &str,
) -> DefinitionResult<Option<Bound>> {
    let inclusive = match schema.get(key) {
        None => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| invalid(format!("'{}' must be a number", key)))?,
        ),
    };
    match (inclusive, schema.get(exclusive_key)) {
        (value, None) => Ok(value.map(|value| Bound {
            value,
            exclusive: false,
        })),
        // draft 4 / OpenAPI 3.0 boolean modifier
        (Some(value), Some(Value::Bool(exclusive))) => Ok(Some(Bound {
            value,
            exclusive: *exclusive,
        })),
        (None, Some(Value::Bool(_))) => Err(invalid(format!(
            "'{}' requires '{}'",
            exclusive_key, key
        ))),
        (_, Some(v)) => {
            let value = v
                .as_f64()
                .ok_or_else(|| invalid(format!("'{}' must be a number", exclusive_key)))?;
            Ok(Some(Bound {
                value,
                exclusive: true,
            }))
        }
    }
}

fn compile_node(schema: &Value, refs: &Map<String, Value>) -> DefinitionResult<Node> {
    let schema = schema
        .as_object()
        .ok_or_else(|| invalid("schema must be an object"))?;

    if let Some(pointer) = schema.get("$ref") {
        let pointer = pointer
            .as_str()
            .ok_or_else(|| invalid("'$ref' must be a string"))?;
        let name = pointer.strip_prefix(REF_PREFIX).unwrap_or(pointer);
        if !refs.contains_key(name) {
            return Err(DefinitionError::UnresolvedReference {
                name: name.to_string(),
            });
        }
        return Ok(Node::Ref(name.to_string()));
    }

    let ty = match schema.get("type") {
        None => None,
        Some(Value::String(name)) => Some(JsonType::parse(name)?),
        Some(_) => return Err(invalid("'type' must be a string")),
    };

    let enum_values = match schema.get("enum") {
        None => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => return Err(invalid("'enum' must be an array")),
    };

    let items = match schema.get("items") {
        None => None,
        Some(item) => Some(compile_node(item, refs)?),
    };

    let properties = match schema.get("properties") {
        None => Vec::new(),
        Some(Value::Object(props)) => props
            .iter()
            .map(|(name, prop)| Ok((name.clone(), compile_node(prop, refs)?)))
            .collect::<DefinitionResult<Vec<_>>>()?,
        Some(_) => return Err(invalid("'properties' must be an object")),
    };

    let required = match schema.get("required") {
        None => Vec::new(),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("'required' must contain strings"))
            })
            .collect::<DefinitionResult<Vec<_>>>()?,
        Some(_) => return Err(invalid("'required' must be an array")),
    };

    let additional = match schema.get("additionalProperties") {
        None | Some(Value::Bool(true)) => Additional::Allowed,
        Some(Value::Bool(false)) => Additional::Forbidden,
        Some(node) => Additional::Schema(Box::new(compile_node(node, refs)?)),
    };

    Ok(Node::Checks(Box::new(Checks {
        ty,
        nullable: schema
            .get("nullable")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        enum_values,
        minimum: as_bound(schema, "minimum", "exclusiveMinimum")?,
        maximum: as_bound(schema, "maximum", "exclusiveMaximum")?,
        min_length: as_usize(schema, "minLength")?,
        max_length: as_usize(schema, "maxLength")?,
        min_items: as_usize(schema, "minItems")?,
        max_items: as_usize(schema, "maxItems")?,
        items,
        properties,
        required,
        additional,
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn compile(schema: Value) -> Validator {
        Validator::compile(&schema, &Map::new()).unwrap()
    }

    #[test]
    fn test_type_checks() {
        let v = compile(json!({"type": "integer"}));
        assert!(v.validate(&json!(3)).is_ok());
        assert!(v.validate(&json!(3.5)).is_err());
        assert!(v.validate(&json!("3")).is_err());

        let v = compile(json!({"type": "number"}));
        assert!(v.validate(&json!(3)).is_ok());
        assert!(v.validate(&json!(3.5)).is_ok());
        assert!(v.validate(&json!(null)).is_err());
    }

    #[test]
    fn test_path_qualified_messages() {
        let v = compile(json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"x": {"type": "number"}},
                "required": ["x"]
            }
        }));
        let err = v.validate(&json!([{"x": 1}, {"x": "one"}])).unwrap_err();
        assert_eq!(err.to_string(), "Schema validation failed: data[1].x must be number");

        let err = v.validate(&json!([{}])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema validation failed: data[0] must contain [\"x\"] properties"
        );
    }

    #[test]
    fn test_extension_keywords() {
        let v = compile(json!({"type": "string", "enum": ["comedy", "action"]}));
        assert!(v.validate(&json!("action")).is_ok());
        assert!(v.validate(&json!("horror")).is_err());

        let v = compile(json!({"type": "number", "minimum": 0, "maximum": 10}));
        assert!(v.validate(&json!(10)).is_ok());
        assert!(v.validate(&json!(10.5)).is_err());
        assert!(v.validate(&json!(-1)).is_err());

        let v = compile(json!({"type": "number", "minimum": 0, "exclusiveMinimum": true}));
        assert!(v.validate(&json!(0)).is_err());

        let v = compile(json!({"type": "number", "nullable": true}));
        assert!(v.validate(&json!(null)).is_ok());
    }

    #[test]
    fn test_additional_properties() {
        let v = compile(json!({"type": "object", "additionalProperties": {"type": "string"}}));
        assert!(v.validate(&json!({"a": "b"})).is_ok());
        let err = v.validate(&json!({"a": 1})).unwrap_err();
        assert_eq!(err.path, "data.a");

        let v = compile(json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        }));
        assert!(v.validate(&json!({"a": "b", "c": 1})).is_err());
    }

    #[test]
    fn test_recursive_reference() {
        let mut refs = Map::new();
        refs.insert(
            "Tree".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "value": {"type": "integer"},
                    "children": {"type": "array", "items": {"$ref": "#/components/schemas/Tree"}}
                },
                "required": ["value"]
            }),
        );
        let root = refs["Tree"].clone();
        let v = Validator::compile(&root, &refs).unwrap();
        assert!(v
            .validate(&json!({"value": 1, "children": [{"value": 2, "children": []}]}))
            .is_ok());
        let err = v
            .validate(&json!({"value": 1, "children": [{"value": "two"}]}))
            .unwrap_err();
        assert_eq!(err.path, "data.children[0].value");
    }

    #[test]
    fn test_unresolved_reference_fails_to_compile() {
        let err = Validator::compile(&json!({"$ref": "#/components/schemas/Nope"}), &Map::new())
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnresolvedReference {
                name: "Nope".to_string()
            }
        );
    }
}
