use std::num::{IntErrorKind, ParseIntError};
use std::panic::{self, AssertUnwindSafe};

use crate::content::error::ExtractionError;
use crate::content::tree::{NodeRef, Tree};
use crate::content::value::ValueType;

/// Fallible transformation applied to raw element text before it is parsed.
pub type Preprocess<'p> = &'p (dyn Fn(&str) -> Result<String, ExtractionError> + Sync);

/// A node selected from an [`HtmlDocument`](crate::content::HtmlDocument).
///
/// Usually an element, but any node an XPath can select (text, attribute,
/// comment) is accepted; its text is the XPath string-value.
#[derive(Debug, Clone, Copy)]
pub struct HtmlElement<'a> {
    tree: &'a Tree,
    node: NodeRef,
}

impl<'a> HtmlElement<'a> {
    pub(crate) fn new(tree: &'a Tree, node: NodeRef) -> Self {
        Self { tree, node }
    }

    /// Tag name of an element, attribute name for an attribute node.
    pub fn name(&self) -> &'a str {
        self.tree.name_of(self.node)
    }

    /// Concatenated text of every descendant text node.
    pub fn inner_text(&self) -> String {
        self.tree.string_value(self.node)
    }

    /// Attribute value, matched case-insensitively on the name.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        if self.node.attribute.is_some() {
            return None;
        }
        self.tree
            .attributes(self.node.node)
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn inner_text_string(&self, preprocess: Option<Preprocess<'_>>) -> Result<String, ExtractionError> {
        apply(self.inner_text(), preprocess)
    }

    pub fn inner_text_int(&self, preprocess: Option<Preprocess<'_>>) -> Result<i64, ExtractionError> {
        parse_int(&self.inner_text_string(preprocess)?)
    }

    pub fn inner_text_float(&self, preprocess: Option<Preprocess<'_>>) -> Result<f64, ExtractionError> {
        parse_float(&self.inner_text_string(preprocess)?)
    }

    pub fn attribute_string(
        &self,
        name: &str,
        preprocess: Option<Preprocess<'_>>,
    ) -> Result<String, ExtractionError> {
        let value = self
            .attribute(name)
            .ok_or_else(|| ExtractionError::AttributeNotFound(name.to_owned()))?;
        apply(value.to_owned(), preprocess)
    }

    pub fn attribute_int(&self, name: &str, preprocess: Option<Preprocess<'_>>) -> Result<i64, ExtractionError> {
        parse_int(&self.attribute_string(name, preprocess)?)
    }

    pub fn attribute_float(
        &self,
        name: &str,
        preprocess: Option<Preprocess<'_>>,
    ) -> Result<f64, ExtractionError> {
        parse_float(&self.attribute_string(name, preprocess)?)
    }
}

/// Runs the callback, turning a panic inside it into [`ExtractionError::Preprocess`].
fn apply(text: String, preprocess: Option<Preprocess<'_>>) -> Result<String, ExtractionError> {
    let Some(preprocess) = preprocess else {
        return Ok(text);
    };

    match panic::catch_unwind(AssertUnwindSafe(|| preprocess(&text))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "callback panicked".to_owned());
            Err(ExtractionError::Preprocess(message))
        }
    }
}

/// Decimal integer, optionally signed, within the 32-bit signed range.
pub fn parse_int(text: &str) -> Result<i64, ExtractionError> {
    let value: i64 = text.parse().map_err(|error: ParseIntError| match error.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            ExtractionError::IntOverflow(text.to_owned())
        }
        _ => ExtractionError::Coercion {
            value: text.to_owned(),
            target: ValueType::Int,
        },
    })?;
    if value < i64::from(i32::MIN) || value > i64::from(i32::MAX) {
        return Err(ExtractionError::IntOverflow(text.to_owned()));
    }
    Ok(value)
}

/// Finite floating point number.
pub fn parse_float(text: &str) -> Result<f64, ExtractionError> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ExtractionError::Coercion {
            value: text.to_owned(),
            target: ValueType::Float,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{HtmlDocument, XPath};

    fn with_element<R>(html: &str, xpath: &str, f: impl FnOnce(HtmlElement<'_>) -> R) -> R {
        let document = HtmlDocument::parse(html).unwrap();
        let element = document
            .get_first(&XPath::compile(xpath).unwrap())
            .unwrap()
            .unwrap();
        f(element)
    }

    #[test]
    fn inner_text_includes_nested_text() {
        with_element("<div id='d'>price: <b>12</b> EUR</div>", "//div", |element| {
            assert_eq!(element.name(), "div");
            assert_eq!(element.inner_text(), "price: 12 EUR");
        });
    }

    #[test]
    fn typed_accessors_use_the_preprocessed_text() {
        let trim = |text: &str| -> Result<String, ExtractionError> { Ok(text.trim().to_owned()) };
        with_element("<p> 42 </p><i> 2.5 </i>", "//p", |element| {
            assert_eq!(element.inner_text_int(Some(&trim)).unwrap(), 42);
            assert!(matches!(
                element.inner_text_int(None),
                Err(ExtractionError::Coercion { target: ValueType::Int, .. })
            ));
            assert_eq!(element.inner_text_string(None).unwrap(), " 42 ");
        });
        with_element("<i> 2.5 </i>", "//i", |element| {
            assert_eq!(element.inner_text_float(Some(&trim)).unwrap(), 2.5);
        });
    }

    #[test]
    fn attribute_accessors() {
        with_element(r#"<a href="/x" data-id="7" data-w="0.5">go</a>"#, "//a", |element| {
            assert_eq!(element.attribute("HREF"), Some("/x"));
            assert_eq!(element.attribute_string("href", None).unwrap(), "/x");
            assert_eq!(element.attribute_int("data-id", None).unwrap(), 7);
            assert_eq!(element.attribute_float("data-w", None).unwrap(), 0.5);
            assert!(matches!(
                element.attribute_string("title", None),
                Err(ExtractionError::AttributeNotFound(name)) if name == "title"
            ));
        });
    }

    #[test]
    fn preprocess_errors_and_panics_become_extraction_errors() {
        let failing = |_: &str| -> Result<String, ExtractionError> {
            Err(ExtractionError::Preprocess("nope".into()))
        };
        let panicking = |_: &str| -> Result<String, ExtractionError> { panic!("boom") };

        with_element("<p>1</p>", "//p", |element| {
            assert!(matches!(
                element.inner_text_int(Some(&failing)),
                Err(ExtractionError::Preprocess(message)) if message == "nope"
            ));
            assert!(matches!(
                element.inner_text_string(Some(&panicking)),
                Err(ExtractionError::Preprocess(message)) if message == "boom"
            ));
        });
    }

    #[test]
    fn int_parsing_is_bounded_to_32_bits() {
        assert_eq!(parse_int("2147483647").unwrap(), 2_147_483_647);
        assert_eq!(parse_int("-2147483648").unwrap(), -2_147_483_648);
        assert!(matches!(parse_int("2147483648"), Err(ExtractionError::IntOverflow(_))));
        assert!(matches!(parse_int("-2147483649"), Err(ExtractionError::IntOverflow(_))));
        assert!(matches!(
            parse_int("99999999999999999999"),
            Err(ExtractionError::IntOverflow(_))
        ));
        assert!(matches!(parse_int("12.5"), Err(ExtractionError::Coercion { .. })));
        assert!(matches!(parse_int(""), Err(ExtractionError::Coercion { .. })));
    }

    #[test]
    fn float_parsing_rejects_non_finite_values() {
        assert_eq!(parse_float("-0.25").unwrap(), -0.25);
        assert!(parse_float("inf").is_err());
        assert!(parse_float("NaN").is_err());
        assert!(parse_float("1,5").is_err());
    }
}
