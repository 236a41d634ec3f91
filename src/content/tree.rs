//! Owned, thread-safe snapshot of a parsed HTML document.
//!
//! `scraper` keeps its DOM in non-atomic tendrils, so its `Html` can not be
//! shared between tasks. The document is copied once into a flat arena in
//! document (pre-)order: a node's index is its document position and all of
//! its descendants occupy the contiguous range `index + 1 ..= subtree_end`.

use scraper::{Html, Node};

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) subtree_end: usize,
}

/// Reference to a tree node or to one attribute of an element node.
///
/// The derived ordering is document order: an element sorts before its
/// attributes, which sort before its first child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeRef {
    pub(crate) node: usize,
    pub(crate) attribute: Option<usize>,
}

impl NodeRef {
    pub(crate) fn node(node: usize) -> Self {
        Self { node, attribute: None }
    }

    pub(crate) fn attribute(node: usize, attribute: usize) -> Self {
        Self {
            node,
            attribute: Some(attribute),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Tree {
    nodes: Vec<TreeNode>,
}

pub(crate) const ROOT: usize = 0;

impl Tree {
    pub(crate) fn from_html(html: &Html) -> Self {
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut stack = vec![(html.tree.root().id(), None)];

        while let Some((id, parent)) = stack.pop() {
            let Some(node) = html.tree.get(id) else {
                continue;
            };

            let kind = match node.value() {
                Node::Document | Node::Fragment => NodeKind::Document,
                Node::Element(element) => NodeKind::Element {
                    name: element.name().to_owned(),
                    attributes: element
                        .attrs()
                        .map(|(name, value)| (name.to_owned(), value.to_owned()))
                        .collect(),
                },
                Node::Text(text) => NodeKind::Text(text.to_string()),
                Node::Comment(comment) => NodeKind::Comment(comment.to_string()),
                // doctype and processing instructions are not addressable
                _ => continue,
            };

            let index = nodes.len();
            nodes.push(TreeNode {
                kind,
                parent,
                children: Vec::new(),
                subtree_end: index,
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }

            for child in node.children().rev() {
                stack.push((child.id(), Some(index)));
            }
        }

        for index in (0..nodes.len()).rev() {
            if let Some(&last_child) = nodes[index].children.last() {
                nodes[index].subtree_end = nodes[last_child].subtree_end;
            }
        }

        Self { nodes }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn get(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    pub(crate) fn attributes(&self, index: usize) -> &[(String, String)] {
        match &self.nodes[index].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub(crate) fn element_name(&self, index: usize) -> Option<&str> {
        match &self.nodes[index].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Local name of an element or attribute reference, empty for other nodes.
    pub(crate) fn name_of(&self, node: NodeRef) -> &str {
        match node.attribute {
            Some(attribute) => self
                .attributes(node.node)
                .get(attribute)
                .map(|(name, _)| name.as_str())
                .unwrap_or(""),
            None => self.element_name(node.node).unwrap_or(""),
        }
    }

    /// XPath string-value of a node.
    pub(crate) fn string_value(&self, node: NodeRef) -> String {
        if let Some(attribute) = node.attribute {
            return self
                .attributes(node.node)
                .get(attribute)
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
        }

        match &self.nodes[node.node].kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::Document | NodeKind::Element { .. } => {
                let end = self.nodes[node.node].subtree_end;
                let mut value = String::new();
                for descendant in &self.nodes[node.node + 1..=end] {
                    if let NodeKind::Text(text) = &descendant.kind {
                        value.push_str(text);
                    }
                }
                value
            }
        }
    }
}
