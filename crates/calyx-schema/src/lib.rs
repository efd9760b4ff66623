//! Typed parameter schemas for script inputs and outputs.
//!
//! A script declares its interface as an `io` object with `inputs` and
//! `outputs` maps. Each entry is a parameter definition: either a bare kind
//! string (`"integer"`) or an object carrying the kind plus optional
//! attributes (default, range, options, grouping, conditional visibility).
//! This crate owns that model end to end: parsing the extracted `io` object
//! literal, normalising shorthand, applying defaults, and validating values.

mod error;
mod literal;
mod schema;
mod values;

pub use error::SchemaError;
pub use literal::parse_object_literal;
pub use schema::{IoSchema, ParamKind, ParamSpec};
pub use values::{apply_defaults, group_params, is_visible, validate_inputs, validate_value};
