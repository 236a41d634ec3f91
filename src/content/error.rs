use thiserror::Error;

use crate::content::value::ValueType;
use crate::content::xpath::XPathError;

/// Failures raised while querying a document or reading a typed value from it.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("content: invalid empty html document")]
    EmptyDocument,

    #[error("content: xpath query failed: {0}")]
    XPath(#[from] XPathError),

    #[error("content: no element matches '{0}'")]
    ElementNotFound(String),

    #[error("content: {count} elements match '{xpath}', exactly one expected")]
    AmbiguousMatch { xpath: String, count: usize },

    #[error("content: attribute '{0}' is not present on the element")]
    AttributeNotFound(String),

    #[error("content: value preprocessing failed: {0}")]
    Preprocess(String),

    #[error("content: regex group {index} out of range, the match has {groups} groups")]
    RegexIndexOutOfRange { index: usize, groups: usize },

    #[error("content: '{value}' can not be parsed as {target}")]
    Coercion { value: String, target: ValueType },

    #[error("content: integer '{0}' overflows the 32-bit signed range")]
    IntOverflow(String),
}
