use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::sources::{ExtractionStrategy, SourceValueConfig};
use crate::content::{ExtractionError, HtmlDocument, Preprocess, Value, ValueType, XPath, XPathError};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid xpath: {0}")]
    XPath(#[from] XPathError),
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

/// A source value definition with its xpath and regex compiled once.
#[derive(Debug, Clone)]
pub struct ValueRule {
    name: String,
    xpath: XPath,
    strategy: ExtractionStrategy,
    trim: bool,
    regex: Option<Regex>,
    regex_group: usize,
    value_type: ValueType,
    attribute: Option<String>,
}

impl ValueRule {
    pub fn compile(config: &SourceValueConfig) -> Result<Self, RuleError> {
        Ok(Self {
            name: config.name.clone(),
            xpath: XPath::compile(&config.xpath)?,
            strategy: config.strategy,
            trim: config.trim,
            regex: config.regex.as_deref().map(Regex::new).transpose()?,
            regex_group: config.regex_group,
            value_type: config.value_type,
            attribute: config.attribute.clone(),
        })
    }

    /// Selects the element, preprocesses its text and coerces it to the configured type.
    pub fn extract(&self, document: &HtmlDocument) -> Result<Value, ExtractionError> {
        let element = match self.strategy {
            ExtractionStrategy::First => document.get_first(&self.xpath)?,
            ExtractionStrategy::Single => document.get_single(&self.xpath)?,
        }
        .ok_or_else(|| ExtractionError::ElementNotFound(self.xpath.to_string()))?;

        let preprocess = |text: &str| self.preprocess(text);
        let preprocess: Preprocess<'_> = &preprocess;

        let value = match (&self.attribute, self.value_type) {
            (None, ValueType::String) => Value::String(element.inner_text_string(Some(preprocess))?),
            (None, ValueType::Int) => Value::Int(element.inner_text_int(Some(preprocess))?),
            (None, ValueType::Float) => Value::Float(element.inner_text_float(Some(preprocess))?),
            (Some(name), ValueType::String) => Value::String(element.attribute_string(name, Some(preprocess))?),
            (Some(name), ValueType::Int) => Value::Int(element.attribute_int(name, Some(preprocess))?),
            (Some(name), ValueType::Float) => Value::Float(element.attribute_float(name, Some(preprocess))?),
        };
        Ok(value)
    }

    /// Trim, then the configured capture group of the first regex match.
    ///
    /// A group that exists in the pattern but did not take part in the match
    /// yields an empty string.
    pub fn preprocess(&self, text: &str) -> Result<String, ExtractionError> {
        let text = if self.trim { text.trim() } else { text };

        let Some(regex) = &self.regex else {
            return Ok(text.to_owned());
        };

        let captures = regex.captures(text);
        debug!(value = %self.name, regex = %regex, matched = captures.is_some(), "regex matching result");

        match captures {
            Some(captures) if self.regex_group < captures.len() => Ok(captures
                .get(self.regex_group)
                .map(|group| group.as_str().to_owned())
                .unwrap_or_default()),
            captures => Err(ExtractionError::RegexIndexOutOfRange {
                index: self.regex_group,
                groups: captures.map_or(0, |c| c.len()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(yaml: &str) -> ValueRule {
        let config: SourceValueConfig = serde_yaml::from_str(yaml).unwrap();
        ValueRule::compile(&config).unwrap()
    }

    const PAGE: &str = r#"<html><body>
        <span id="price"> USD 123.45 </span>
        <span class="vol">1,000</span><span class="vol">2,000</span>
        <a id="next" href="/page/2" data-count="42">next</a>
    </body></html>"#;

    fn document() -> HtmlDocument {
        HtmlDocument::parse(PAGE).unwrap()
    }

    #[test]
    fn trims_then_captures_then_coerces() {
        let price = rule(
            r#"{ name: price, xpath: "//span[@id='price']", trim: true, regex: "([A-Z]+) ([0-9.]+)", regex_group: 2, type: float }"#,
        );
        assert_eq!(price.extract(&document()).unwrap(), Value::Float(123.45));

        let currency = rule(
            r#"{ name: currency, xpath: "//span[@id='price']", trim: true, regex: "([A-Z]+)", regex_group: 1 }"#,
        );
        assert_eq!(currency.extract(&document()).unwrap(), Value::String("USD".into()));
    }

    #[test]
    fn untrimmed_text_is_kept_verbatim() {
        let raw = rule(r#"{ name: raw, xpath: "//span[@id='price']" }"#);
        assert_eq!(raw.extract(&document()).unwrap(), Value::String(" USD 123.45 ".into()));
    }

    #[test]
    fn regex_group_out_of_range() {
        let too_far = rule(r#"{ name: p, xpath: "//span[@id='price']", regex: "([0-9]+)", regex_group: 2 }"#);
        assert!(matches!(
            too_far.extract(&document()),
            Err(ExtractionError::RegexIndexOutOfRange { index: 2, groups: 2 })
        ));

        let no_match = rule(r#"{ name: p, xpath: "//span[@id='price']", regex: "(EUR)", regex_group: 0 }"#);
        assert!(matches!(
            no_match.preprocess("USD 1"),
            Err(ExtractionError::RegexIndexOutOfRange { index: 0, groups: 0 })
        ));
    }

    #[test]
    fn optional_group_that_did_not_participate_is_empty() {
        let optional = rule(r#"{ name: p, xpath: "//a", regex: "(x)?next", regex_group: 1 }"#);
        assert_eq!(optional.preprocess("next").unwrap(), "");
    }

    #[test]
    fn single_strategy_rejects_two_matches() {
        let single = rule(r#"{ name: vol, xpath: "//span[@class='vol']", strategy: single }"#);
        assert!(matches!(
            single.extract(&document()),
            Err(ExtractionError::AmbiguousMatch { count: 2, .. })
        ));

        let first = rule(r#"{ name: vol, xpath: "//span[@class='vol']", strategy: first }"#);
        assert_eq!(first.extract(&document()).unwrap(), Value::String("1,000".into()));
    }

    #[test]
    fn missing_element_is_not_found() {
        let missing = rule(r#"{ name: m, xpath: "//table", strategy: single }"#);
        assert!(matches!(
            missing.extract(&document()),
            Err(ExtractionError::ElementNotFound(xpath)) if xpath == "//table"
        ));
    }

    #[test]
    fn reads_attributes_when_configured() {
        let href = rule(r#"{ name: href, xpath: "//a[@id='next']", attribute: href }"#);
        assert_eq!(href.extract(&document()).unwrap(), Value::String("/page/2".into()));

        let count = rule(r#"{ name: count, xpath: "//a[@id='next']", attribute: data-count, type: int }"#);
        assert_eq!(count.extract(&document()).unwrap(), Value::Int(42));
    }

    #[test]
    fn coercion_failures_surface() {
        let volume = rule(r#"{ name: vol, xpath: "//span[@class='vol']", type: int }"#);
        assert!(matches!(
            volume.extract(&document()),
            Err(ExtractionError::Coercion { target: ValueType::Int, .. })
        ));
    }

    #[test]
    fn invalid_definitions_do_not_compile() {
        let config: SourceValueConfig =
            serde_yaml::from_str(r#"{ name: p, xpath: "//a", regex: "([0-9" }"#).unwrap();
        assert!(matches!(ValueRule::compile(&config), Err(RuleError::Regex(_))));

        let config: SourceValueConfig = serde_yaml::from_str(r#"{ name: p, xpath: "//a[" }"#).unwrap();
        assert!(matches!(ValueRule::compile(&config), Err(RuleError::XPath(_))));
    }
}
