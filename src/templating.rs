//! Campaign template rendering.
//!
//! Rendering is two-phase: `placeholders` rewrites operator `$name` tokens into
//! native `{{.Name}}` actions, then `engine` executes the result against the
//! session variables. `manager` ties both to a campaign directory.

pub mod engine;
pub mod manager;
pub mod placeholders;

pub use engine::TemplateVars;
pub use manager::TemplateManager;
