pub mod document;
pub mod element;
pub mod error;
mod tree;
pub mod value;
pub mod xpath;

pub use document::HtmlDocument;
pub use element::{HtmlElement, Preprocess};
pub use error::ExtractionError;
pub use value::{Value, ValueType};
pub use xpath::{XPath, XPathError};
