//! Surface-level script validation.
//!
//! The validator treats script source as plain text: it strips comments and
//! masks string bodies with a small state machine, then applies shape checks
//! (the two required exports), balance checks (quotes, braces), a
//! configurable dangerous-pattern table, structural warnings, and a
//! sub-validation of the declared io schema. Validation is advisory; it
//! vets the surface of a script, it does not prove the absence of
//! misbehaviour.

mod extract;
mod mask;
mod patterns;
mod validator;

pub use extract::{ExtractError, extract_default_fn, extract_deps, extract_io_source};
pub use mask::{MaskedSource, mask_source};
pub use patterns::{DangerPattern, ScanTarget};
pub use validator::{ScriptValidator, ValidationReport};
