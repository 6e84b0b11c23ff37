pub mod document;
pub mod editor;
pub mod errors;
pub mod query;

pub use document::{Document, Mapping, Node, Scalar, ScalarStyle, Span};
pub use editor::{double_quoted, NoOpReason, PlannedRewrite, YamlEditor, YamlPlan};
pub use errors::YamlError;
pub use query::KeyPath;
