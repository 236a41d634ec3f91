use scraper::Html;

use crate::content::element::HtmlElement;
use crate::content::error::ExtractionError;
use crate::content::tree::Tree;
use crate::content::xpath::XPath;

/// A parsed HTML page that can be shared between tasks and queried with XPath.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    tree: Tree,
    raw: String,
}

impl HtmlDocument {
    /// Parses `text` leniently, the way a browser would. Only an empty
    /// (or whitespace-only) input is rejected.
    pub fn parse(text: &str) -> Result<Self, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        let html = Html::parse_document(text);
        Ok(Self {
            tree: Tree::from_html(&html),
            raw: html.html(),
        })
    }

    /// First match in document order, `None` when nothing matches.
    pub fn get_first(&self, xpath: &XPath) -> Result<Option<HtmlElement<'_>>, ExtractionError> {
        let nodes = xpath.select(&self.tree)?;
        Ok(nodes
            .first()
            .map(|&node| HtmlElement::new(&self.tree, node)))
    }

    /// The only match, `None` when nothing matches. More than one match is
    /// an [`ExtractionError::AmbiguousMatch`].
    pub fn get_single(&self, xpath: &XPath) -> Result<Option<HtmlElement<'_>>, ExtractionError> {
        let nodes = xpath.select(&self.tree)?;
        match nodes.as_slice() {
            [] => Ok(None),
            [node] => Ok(Some(HtmlElement::new(&self.tree, *node))),
            _ => Err(ExtractionError::AmbiguousMatch {
                xpath: xpath.to_string(),
                count: nodes.len(),
            }),
        }
    }

    pub fn get_all(&self, xpath: &XPath) -> Result<Vec<HtmlElement<'_>>, ExtractionError> {
        Ok(xpath
            .select(&self.tree)?
            .into_iter()
            .map(|node| HtmlElement::new(&self.tree, node))
            .collect())
    }

    /// The document re-serialized after parsing.
    pub fn raw_content(&self) -> String {
        self.raw.clone()
    }
}
