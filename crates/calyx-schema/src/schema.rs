//! Parameter and io-schema types.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::literal::parse_object_literal;

/// The closed set of parameter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
  Integer,
  Float,
  Text,
  Boolean,
  Object,
  Sequence,
  /// Namespaced resource identifier (`namespace:path`).
  Resource,
}

impl ParamKind {
  /// Parse a declared kind string, accepting the aliases scripts use.
  pub fn parse(kind: &str) -> Option<Self> {
    match kind {
      "integer" | "int" => Some(Self::Integer),
      "float" | "floating" | "number" => Some(Self::Float),
      "text" | "string" => Some(Self::Text),
      "boolean" | "bool" => Some(Self::Boolean),
      "object" => Some(Self::Object),
      "sequence" | "array" | "list" => Some(Self::Sequence),
      "resource" | "item_id" => Some(Self::Resource),
      _ => None,
    }
  }

  /// Human-readable kind name used in validation messages.
  pub fn describe(self) -> &'static str {
    match self {
      Self::Integer => "an integer",
      Self::Float => "a number",
      Self::Text => "a string",
      Self::Boolean => "a boolean",
      Self::Object => "an object",
      Self::Sequence => "an array",
      Self::Resource => "a namespaced resource id",
    }
  }

  /// The kind-specific zero value used when no default is declared.
  pub fn zero_value(self) -> Value {
    match self {
      Self::Integer => Value::from(0),
      Self::Float => Value::from(0.0),
      Self::Text => Value::from(""),
      Self::Boolean => Value::from(false),
      Self::Object => Value::Object(serde_json::Map::new()),
      Self::Sequence => Value::Array(Vec::new()),
      Self::Resource => Value::from("minecraft:stone"),
    }
  }
}

/// One parameter definition from an io schema.
///
/// A bare kind string is shorthand for `{ type: <kind> }`; [`ParamSpec::from_value`]
/// normalises both forms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
  #[serde(rename = "type")]
  pub kind: ParamKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub step: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<Value>>,
  /// Element kind for sequence parameters.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub items: Option<ParamKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub group: Option<String>,
  /// Sibling-key → expected-value map gating visibility.
  #[serde(rename = "dependsOn", skip_serializing_if = "Option::is_none")]
  pub depends_on: Option<IndexMap<String, Value>>,
}

impl ParamSpec {
  /// Build a spec with only a kind, as the bare-string shorthand produces.
  pub fn of_kind(kind: ParamKind) -> Self {
    Self {
      kind,
      default: None,
      min: None,
      max: None,
      step: None,
      options: None,
      items: None,
      description: None,
      group: None,
      depends_on: None,
    }
  }

  /// Normalise a parameter definition value into a spec.
  pub fn from_value(name: &str, value: &Value) -> Result<Self, SchemaError> {
    match value {
      Value::String(kind) => {
        let kind = ParamKind::parse(kind).ok_or_else(|| SchemaError::UnknownKind {
          name: name.to_string(),
          kind: kind.clone(),
        })?;
        Ok(Self::of_kind(kind))
      }
      Value::Object(map) => {
        let kind_value = map
          .get("type")
          .or_else(|| map.get("kind"))
          .ok_or_else(|| SchemaError::BadAttribute {
            name: name.to_string(),
            attribute: "type",
            message: "missing kind declaration".to_string(),
          })?;
        let kind_str = kind_value.as_str().ok_or_else(|| SchemaError::BadAttribute {
          name: name.to_string(),
          attribute: "type",
          message: "kind must be a string".to_string(),
        })?;
        let kind = ParamKind::parse(kind_str).ok_or_else(|| SchemaError::UnknownKind {
          name: name.to_string(),
          kind: kind_str.to_string(),
        })?;

        let mut spec = Self::of_kind(kind);
        spec.default = map.get("default").cloned();
        spec.min = number_attr(name, map, "min")?;
        spec.max = number_attr(name, map, "max")?;
        spec.step = number_attr(name, map, "step")?;
        if let Some(options) = map.get("options") {
          let list = options.as_array().ok_or_else(|| SchemaError::BadAttribute {
            name: name.to_string(),
            attribute: "options",
            message: "options must be an array".to_string(),
          })?;
          spec.options = Some(list.clone());
        }
        if let Some(items) = map.get("items") {
          let item_kind = items.as_str().ok_or_else(|| SchemaError::BadAttribute {
            name: name.to_string(),
            attribute: "items",
            message: "item kind must be a string".to_string(),
          })?;
          spec.items = Some(ParamKind::parse(item_kind).ok_or_else(|| SchemaError::UnknownKind {
            name: name.to_string(),
            kind: item_kind.to_string(),
          })?);
        }
        spec.description = map.get("description").and_then(|v| v.as_str()).map(String::from);
        spec.group = map.get("group").and_then(|v| v.as_str()).map(String::from);
        if let Some(deps) = map.get("dependsOn") {
          let deps = deps.as_object().ok_or_else(|| SchemaError::BadAttribute {
            name: name.to_string(),
            attribute: "dependsOn",
            message: "dependsOn must be an object".to_string(),
          })?;
          spec.depends_on = Some(deps.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }

        if let (Some(min), Some(max)) = (spec.min, spec.max)
          && min > max
        {
          return Err(SchemaError::InvalidRange {
            name: name.to_string(),
            min,
            max,
          });
        }

        Ok(spec)
      }
      other => Err(SchemaError::BadIoShape {
        message: format!(
          "parameter '{}' must be a kind string or an object, got {}",
          name,
          kind_of(other)
        ),
      }),
    }
  }

  /// The value used for this parameter when the caller omitted it.
  pub fn default_value(&self) -> Value {
    self
      .default
      .clone()
      .unwrap_or_else(|| self.kind.zero_value())
  }

  /// True when the parameter must be supplied by the caller: no declared
  /// default and no kind-specific zero would be wrong to synthesise.
  pub fn has_default(&self) -> bool {
    self.default.is_some()
  }
}

fn number_attr(
  name: &str,
  map: &serde_json::Map<String, Value>,
  attribute: &'static str,
) -> Result<Option<f64>, SchemaError> {
  match map.get(attribute) {
    None => Ok(None),
    Some(v) => v
      .as_f64()
      .map(Some)
      .ok_or_else(|| SchemaError::BadAttribute {
        name: name.to_string(),
        attribute,
        message: format!("{} must be a number", attribute),
      }),
  }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(n) if n.is_i64() || n.is_u64() => "an integer",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

/// A script's full input/output interface.
#[derive(Debug, Clone, Serialize)]
pub struct IoSchema {
  pub inputs: IndexMap<String, ParamSpec>,
  pub outputs: IndexMap<String, ParamSpec>,
  /// The raw normalised io value as declared by the script.
  #[serde(skip)]
  raw: Value,
}

impl IoSchema {
  /// Lift a parsed io value into a typed schema.
  ///
  /// The value must be an object with `inputs` and `outputs` object members;
  /// absent or non-object forms are fatal.
  pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
    let map = value.as_object().ok_or_else(|| SchemaError::BadIoShape {
      message: format!("io must be an object, got {}", kind_of(value)),
    })?;

    let inputs = member_specs(map, "inputs")?;
    let outputs = member_specs(map, "outputs")?;

    Ok(Self {
      inputs,
      outputs,
      raw: value.clone(),
    })
  }

  /// Parse the extracted io object-literal source and lift it.
  pub fn from_source(io_source: &str) -> Result<Self, SchemaError> {
    let value = parse_object_literal(io_source)?;
    Self::from_value(&value)
  }

  /// The io declaration as the script wrote it (normalised to JSON).
  pub fn raw(&self) -> &Value {
    &self.raw
  }

  /// Non-fatal schema observations: currently, oversized option lists.
  pub fn warnings(&self) -> Vec<String> {
    let mut warnings = Vec::new();
    for (name, spec) in self.inputs.iter().chain(self.outputs.iter()) {
      if let Some(options) = &spec.options
        && options.len() > 100
      {
        warnings.push(format!(
          "parameter '{}' declares {} options; consider a narrower list",
          name,
          options.len()
        ));
      }
    }
    warnings
  }
}

fn member_specs(
  map: &serde_json::Map<String, Value>,
  member: &str,
) -> Result<IndexMap<String, ParamSpec>, SchemaError> {
  let value = map.get(member).ok_or_else(|| SchemaError::BadIoShape {
    message: format!("io.{} is missing", member),
  })?;
  let entries = value.as_object().ok_or_else(|| SchemaError::BadIoShape {
    message: format!("io.{} must be an object, got {}", member, kind_of(value)),
  })?;

  let mut specs = IndexMap::with_capacity(entries.len());
  for (name, def) in entries {
    specs.insert(name.clone(), ParamSpec::from_value(name, def)?);
  }
  Ok(specs)
}
