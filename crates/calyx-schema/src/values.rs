//! Defaults, visibility, and value validation against a parameter schema.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::schema::{IoSchema, ParamKind, ParamSpec, kind_of};

static RESOURCE_ID: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[a-z0-9_.\-]+:[a-z0-9_./\-]+$").expect("static regex"));

/// Copy `inputs`, inserting the declared (or kind-zero) default for every
/// absent key. Present keys are never overridden, including explicit
/// `false`, `0`, `""`, and `null`.
pub fn apply_defaults(inputs: &Map<String, Value>, schema: &IndexMap<String, ParamSpec>) -> Map<String, Value> {
  let mut out = inputs.clone();
  for (name, spec) in schema {
    if !out.contains_key(name) {
      out.insert(name.clone(), spec.default_value());
    }
  }
  out
}

/// True iff every `dependsOn` key is present in `inputs` with a strictly
/// equal value. Parameters without `dependsOn` are always visible; a missing
/// dependency key renders the parameter invisible.
pub fn is_visible(spec: &ParamSpec, inputs: &Map<String, Value>) -> bool {
  match &spec.depends_on {
    None => true,
    Some(deps) => deps
      .iter()
      .all(|(key, expected)| inputs.get(key) == Some(expected)),
  }
}

/// Partition schema keys by display group, preserving declaration order for
/// both groups and members. Ungrouped parameters land in `"default"`.
pub fn group_params(schema: &IndexMap<String, ParamSpec>) -> IndexMap<String, Vec<String>> {
  let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
  for (name, spec) in schema {
    let group = spec.group.clone().unwrap_or_else(|| "default".to_string());
    groups.entry(group).or_default().push(name.clone());
  }
  groups
}

/// Validate one value against its parameter definition.
pub fn validate_value(value: &Value, spec: &ParamSpec, name: &str) -> Result<(), SchemaError> {
  match spec.kind {
    ParamKind::Integer => {
      let n = value.as_f64().ok_or_else(|| kind_mismatch(name, spec, value))?;
      if !n.is_finite() {
        return Err(SchemaError::NotFinite {
          name: name.to_string(),
        });
      }
      if n.fract() != 0.0 {
        return Err(SchemaError::NotInteger {
          name: name.to_string(),
        });
      }
      check_range(name, spec, n)?;
    }
    ParamKind::Float => {
      let n = value.as_f64().ok_or_else(|| kind_mismatch(name, spec, value))?;
      if !n.is_finite() {
        return Err(SchemaError::NotFinite {
          name: name.to_string(),
        });
      }
      check_range(name, spec, n)?;
    }
    ParamKind::Text => {
      let text = value.as_str().ok_or_else(|| kind_mismatch(name, spec, value))?;
      if let Some(options) = &spec.options
        && !options.iter().any(|o| o.as_str() == Some(text))
      {
        return Err(SchemaError::NotAnOption {
          name: name.to_string(),
          value: format!("'{}'", text),
        });
      }
    }
    ParamKind::Boolean => {
      if !value.is_boolean() {
        return Err(kind_mismatch(name, spec, value));
      }
    }
    ParamKind::Object => {
      if !value.is_object() {
        return Err(kind_mismatch(name, spec, value));
      }
    }
    ParamKind::Sequence => {
      let items = value.as_array().ok_or_else(|| kind_mismatch(name, spec, value))?;
      if let Some(item_kind) = spec.items {
        let item_spec = ParamSpec::of_kind(item_kind);
        for (index, item) in items.iter().enumerate() {
          validate_value(item, &item_spec, &format!("{}[{}]", name, index))?;
        }
      }
    }
    ParamKind::Resource => {
      let text = value.as_str().ok_or_else(|| kind_mismatch(name, spec, value))?;
      if !RESOURCE_ID.is_match(text) {
        return Err(SchemaError::BadResourceId {
          name: name.to_string(),
          value: text.to_string(),
        });
      }
    }
  }
  Ok(())
}

/// Apply defaults and validate a caller-supplied input map against an io
/// schema. Invisible parameters are skipped entirely; every visible
/// parameter without a declared default must be present in the original
/// inputs. Returns the map that should reach the entry function.
pub fn validate_inputs(
  inputs: &Map<String, Value>,
  io: &IoSchema,
) -> Result<Map<String, Value>, SchemaError> {
  let filled = apply_defaults(inputs, &io.inputs);

  let mut validated = Map::new();
  for (name, spec) in &io.inputs {
    if !is_visible(spec, &filled) {
      continue;
    }
    if !inputs.contains_key(name) && !spec.has_default() {
      return Err(SchemaError::MissingRequired {
        name: name.clone(),
      });
    }
    let value = filled.get(name).expect("apply_defaults fills every key");
    validate_value(value, spec, name)?;
    validated.insert(name.clone(), value.clone());
  }
  Ok(validated)
}

fn kind_mismatch(name: &str, spec: &ParamSpec, value: &Value) -> SchemaError {
  SchemaError::KindMismatch {
    name: name.to_string(),
    expected: spec.kind.describe(),
    found: kind_of(value),
  }
}

fn check_range(name: &str, spec: &ParamSpec, n: f64) -> Result<(), SchemaError> {
  let min = spec.min.unwrap_or(f64::NEG_INFINITY);
  let max = spec.max.unwrap_or(f64::INFINITY);
  if n < min || n > max {
    return Err(SchemaError::OutOfRange {
      name: name.to_string(),
      value: n,
      min: spec.min.unwrap_or(f64::NEG_INFINITY),
      max: spec.max.unwrap_or(f64::INFINITY),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn schema(io: Value) -> IoSchema {
    IoSchema::from_value(&io).unwrap()
  }

  fn obj(v: Value) -> Map<String, Value> {
    v.as_object().unwrap().clone()
  }

  #[test]
  fn test_apply_defaults_fills_missing_only() {
    let io = schema(json!({
      "inputs": {
        "message": { "type": "text", "default": "Hello" },
        "count": { "type": "integer", "default": 1 },
        "flag": "boolean"
      },
      "outputs": {}
    }));

    let filled = apply_defaults(&obj(json!({ "count": 3 })), &io.inputs);
    assert_eq!(filled["message"], json!("Hello"));
    assert_eq!(filled["count"], json!(3));
    assert_eq!(filled["flag"], json!(false));
  }

  #[test]
  fn test_apply_defaults_preserves_falsy_values() {
    let io = schema(json!({
      "inputs": {
        "flag": { "type": "boolean", "default": true },
        "count": { "type": "integer", "default": 7 },
        "text": { "type": "text", "default": "x" }
      },
      "outputs": {}
    }));

    let filled = apply_defaults(&obj(json!({ "flag": false, "count": 0, "text": "" })), &io.inputs);
    assert_eq!(filled["flag"], json!(false));
    assert_eq!(filled["count"], json!(0));
    assert_eq!(filled["text"], json!(""));
  }

  #[test]
  fn test_apply_defaults_is_idempotent() {
    let io = schema(json!({
      "inputs": { "a": { "type": "integer", "default": 2 }, "b": "text" },
      "outputs": {}
    }));
    let once = apply_defaults(&obj(json!({ "b": "set" })), &io.inputs);
    let twice = apply_defaults(&once, &io.inputs);
    assert_eq!(once, twice);
  }

  #[test]
  fn test_integer_accepts_integral_float() {
    let spec = ParamSpec::from_value("n", &json!({ "type": "integer" })).unwrap();
    assert!(validate_value(&json!(3.0), &spec, "n").is_ok());
    assert!(matches!(
      validate_value(&json!(3.5), &spec, "n"),
      Err(SchemaError::NotInteger { .. })
    ));
  }

  #[test]
  fn test_numeric_range_inclusive() {
    let spec =
      ParamSpec::from_value("n", &json!({ "type": "integer", "min": 1, "max": 5 })).unwrap();
    assert!(validate_value(&json!(1), &spec, "n").is_ok());
    assert!(validate_value(&json!(5), &spec, "n").is_ok());
    assert!(matches!(
      validate_value(&json!(6), &spec, "n"),
      Err(SchemaError::OutOfRange { .. })
    ));
    assert!(matches!(
      validate_value(&json!(0), &spec, "n"),
      Err(SchemaError::OutOfRange { .. })
    ));
  }

  #[test]
  fn test_text_options_membership() {
    let spec = ParamSpec::from_value(
      "mode",
      &json!({ "type": "text", "options": ["fast", "slow"] }),
    )
    .unwrap();
    assert!(validate_value(&json!("fast"), &spec, "mode").is_ok());
    assert!(matches!(
      validate_value(&json!("medium"), &spec, "mode"),
      Err(SchemaError::NotAnOption { .. })
    ));
  }

  #[test]
  fn test_strict_kinds() {
    let boolean = ParamSpec::from_value("b", &json!("boolean")).unwrap();
    assert!(validate_value(&json!(1), &boolean, "b").is_err());

    let object = ParamSpec::from_value("o", &json!("object")).unwrap();
    assert!(validate_value(&json!([1]), &object, "o").is_err());
    assert!(validate_value(&json!(null), &object, "o").is_err());

    let sequence = ParamSpec::from_value("s", &json!("sequence")).unwrap();
    assert!(validate_value(&json!({}), &sequence, "s").is_err());
    assert!(validate_value(&json!([1, 2]), &sequence, "s").is_ok());
  }

  #[test]
  fn test_sequence_item_kinds() {
    let spec =
      ParamSpec::from_value("xs", &json!({ "type": "sequence", "items": "integer" })).unwrap();
    assert!(validate_value(&json!([1, 2, 3]), &spec, "xs").is_ok());
    let err = validate_value(&json!([1, "two"]), &spec, "xs").unwrap_err();
    assert!(err.to_string().contains("xs[1]"));
  }

  #[test]
  fn test_resource_shape() {
    let spec = ParamSpec::from_value("block", &json!("resource")).unwrap();
    assert!(validate_value(&json!("minecraft:oak_planks"), &spec, "block").is_ok());
    assert!(validate_value(&json!("oak_planks"), &spec, "block").is_err());
    assert!(validate_value(&json!(7), &spec, "block").is_err());
  }

  #[test]
  fn test_visibility_rules() {
    let gated = ParamSpec::from_value(
      "detail",
      &json!({ "type": "text", "dependsOn": { "advanced": true } }),
    )
    .unwrap();

    assert!(is_visible(&gated, &obj(json!({ "advanced": true }))));
    assert!(!is_visible(&gated, &obj(json!({ "advanced": false }))));
    // A missing dependency key hides the parameter.
    assert!(!is_visible(&gated, &obj(json!({}))));

    let plain = ParamSpec::from_value("x", &json!("text")).unwrap();
    assert!(is_visible(&plain, &obj(json!({}))));
  }

  #[test]
  fn test_validate_inputs_skips_invisible_required() {
    let io = schema(json!({
      "inputs": {
        "advanced": { "type": "boolean", "default": false },
        "detail": { "type": "text", "dependsOn": { "advanced": true } }
      },
      "outputs": {}
    }));

    // detail has no default but is invisible, so it is skipped.
    let validated = validate_inputs(&obj(json!({})), &io).unwrap();
    assert!(!validated.contains_key("detail"));

    // Once visible, the missing required input is fatal.
    let err = validate_inputs(&obj(json!({ "advanced": true })), &io).unwrap_err();
    assert!(err.to_string().contains("Missing required input: detail"));
  }

  #[test]
  fn test_validate_inputs_returns_defaults_applied() {
    let io = schema(json!({
      "inputs": {
        "message": { "type": "text", "default": "Hello" },
        "count": { "type": "integer", "default": 1, "min": 1, "max": 5 }
      },
      "outputs": {}
    }));

    let validated = validate_inputs(&obj(json!({})), &io).unwrap();
    assert_eq!(validated["message"], json!("Hello"));
    assert_eq!(validated["count"], json!(1));

    let err = validate_inputs(&obj(json!({ "count": 10 })), &io).unwrap_err();
    assert!(matches!(err, SchemaError::OutOfRange { .. }));
  }

  #[test]
  fn test_group_params_order() {
    let io = schema(json!({
      "inputs": {
        "a": { "type": "integer", "group": "size" },
        "b": "text",
        "c": { "type": "integer", "group": "size" },
        "d": { "type": "text", "group": "style" }
      },
      "outputs": {}
    }));

    let groups = group_params(&io.inputs);
    let keys: Vec<&String> = groups.keys().collect();
    assert_eq!(keys, ["size", "default", "style"]);
    assert_eq!(groups["size"], vec!["a", "c"]);
    assert_eq!(groups["default"], vec!["b"]);
  }
}
