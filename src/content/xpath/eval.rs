use crate::content::tree::{NodeKind, NodeRef, Tree, ROOT};
use crate::content::xpath::parser::{
    ArithmeticOp, Axis, CompareOp, Expr, Function, LocationPath, NodeTest, Step,
};
use crate::content::xpath::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum XValue {
    Nodes(Vec<NodeRef>),
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy)]
struct Context {
    node: NodeRef,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'t> {
    tree: &'t Tree,
}

impl<'t> Evaluator<'t> {
    pub(crate) fn new(tree: &'t Tree) -> Self {
        Self { tree }
    }

    /// Evaluates an expression with the document root as context node.
    pub(crate) fn evaluate(&self, expr: &Expr) -> Result<XValue, XPathError> {
        let context = Context {
            node: NodeRef::node(ROOT),
            position: 1,
            size: 1,
        };
        self.eval(expr, &context)
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<XValue, XPathError> {
        match expr {
            Expr::Or(left, right) => Ok(XValue::Bool(
                self.boolean(&self.eval(left, ctx)?) || self.boolean(&self.eval(right, ctx)?),
            )),
            Expr::And(left, right) => Ok(XValue::Bool(
                self.boolean(&self.eval(left, ctx)?) && self.boolean(&self.eval(right, ctx)?),
            )),
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                Ok(XValue::Bool(self.compare(*op, &left, &right)))
            }
            Expr::Arithmetic(op, left, right) => {
                let left = self.number(&self.eval(left, ctx)?);
                let right = self.number(&self.eval(right, ctx)?);
                Ok(XValue::Num(match op {
                    ArithmeticOp::Add => left + right,
                    ArithmeticOp::Subtract => left - right,
                    ArithmeticOp::Multiply => left * right,
                    ArithmeticOp::Divide => left / right,
                    ArithmeticOp::Modulo => left % right,
                }))
            }
            Expr::Negate(inner) => Ok(XValue::Num(-self.number(&self.eval(inner, ctx)?))),
            Expr::Union(left, right) => {
                let (XValue::Nodes(mut left), XValue::Nodes(right)) =
                    (self.eval(left, ctx)?, self.eval(right, ctx)?)
                else {
                    return Err(XPathError::Evaluation(
                        "union operands must be node-sets".into(),
                    ));
                };
                left.extend(right);
                left.sort();
                left.dedup();
                Ok(XValue::Nodes(left))
            }
            Expr::Literal(value) => Ok(XValue::Str(value.clone())),
            Expr::Number(value) => Ok(XValue::Num(*value)),
            Expr::Function(function, args) => self.call(*function, args, ctx),
            Expr::Path(path) => self.location_path(path, ctx),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let XValue::Nodes(mut nodes) = self.eval(primary, ctx)? else {
                    return Err(XPathError::Evaluation(
                        "predicates and paths apply to node-sets only".into(),
                    ));
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(XValue::Nodes(self.steps(nodes, steps)?))
            }
        }
    }

    fn location_path(&self, path: &LocationPath, ctx: &Context) -> Result<XValue, XPathError> {
        let start = if path.absolute {
            NodeRef::node(ROOT)
        } else {
            ctx.node
        };
        Ok(XValue::Nodes(self.steps(vec![start], &path.steps)?))
    }

    fn steps(&self, mut nodes: Vec<NodeRef>, steps: &[Step]) -> Result<Vec<NodeRef>, XPathError> {
        for step in steps {
            let mut selected = Vec::new();
            for &node in &nodes {
                let mut candidates: Vec<NodeRef> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|candidate| self.test(*candidate, step.axis, &step.test))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                selected.extend(candidates);
            }
            selected.sort();
            selected.dedup();
            nodes = selected;
        }
        Ok(nodes)
    }

    fn filter(&self, nodes: Vec<NodeRef>, predicate: &Expr) -> Result<Vec<NodeRef>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                XValue::Num(number) => number == ctx.position as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along an axis, in axis order (reverse axes nearest first).
    fn axis(&self, node: NodeRef, axis: Axis) -> Vec<NodeRef> {
        let tree = self.tree;

        if node.attribute.is_some() {
            return match axis {
                Axis::SelfAxis => vec![node],
                Axis::Parent => vec![NodeRef::node(node.node)],
                Axis::Ancestor | Axis::AncestorOrSelf => {
                    let mut nodes = Vec::new();
                    if axis == Axis::AncestorOrSelf {
                        nodes.push(node);
                    }
                    nodes.push(NodeRef::node(node.node));
                    nodes.extend(self.ancestors(node.node));
                    nodes
                }
                _ => Vec::new(),
            };
        }

        let index = node.node;
        let current = tree.get(index);
        match axis {
            Axis::Child => current.children.iter().map(|&c| NodeRef::node(c)).collect(),
            Axis::Descendant => (index + 1..=current.subtree_end).map(NodeRef::node).collect(),
            Axis::DescendantOrSelf => (index..=current.subtree_end).map(NodeRef::node).collect(),
            Axis::SelfAxis => vec![node],
            Axis::Parent => current.parent.map(NodeRef::node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(index),
            Axis::AncestorOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(self.ancestors(index));
                nodes
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = current.parent else {
                    return Vec::new();
                };
                let siblings = &tree.get(parent).children;
                let Some(at) = siblings.iter().position(|&s| s == index) else {
                    return Vec::new();
                };
                if axis == Axis::FollowingSibling {
                    siblings[at + 1..].iter().map(|&s| NodeRef::node(s)).collect()
                } else {
                    siblings[..at].iter().rev().map(|&s| NodeRef::node(s)).collect()
                }
            }
            Axis::Following => (current.subtree_end + 1..tree.len())
                .map(NodeRef::node)
                .collect(),
            Axis::Preceding => {
                let ancestors = self.ancestors(index);
                (0..index)
                    .rev()
                    .map(NodeRef::node)
                    .filter(|candidate| !ancestors.contains(candidate))
                    .collect()
            }
            Axis::Attribute => (0..tree.attributes(index).len())
                .map(|attribute| NodeRef::attribute(index, attribute))
                .collect(),
        }
    }

    fn ancestors(&self, index: usize) -> Vec<NodeRef> {
        let mut nodes = Vec::new();
        let mut parent = self.tree.get(index).parent;
        while let Some(p) = parent {
            nodes.push(NodeRef::node(p));
            parent = self.tree.get(p).parent;
        }
        nodes
    }

    fn test(&self, node: NodeRef, axis: Axis, test: &NodeTest) -> bool {
        if axis == Axis::Attribute {
            return match test {
                NodeTest::Node | NodeTest::Wildcard => node.attribute.is_some(),
                NodeTest::Name(name) => {
                    node.attribute.is_some() && self.tree.name_of(node).eq_ignore_ascii_case(name)
                }
                NodeTest::Text | NodeTest::Comment => false,
            };
        }

        if node.attribute.is_some() {
            return matches!(test, NodeTest::Node);
        }

        let kind = &self.tree.get(node.node).kind;
        match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(kind, NodeKind::Text(_)),
            NodeTest::Comment => matches!(kind, NodeKind::Comment(_)),
            NodeTest::Wildcard => matches!(kind, NodeKind::Element { .. }),
            NodeTest::Name(expected) => {
                matches!(kind, NodeKind::Element { name, .. } if name.eq_ignore_ascii_case(expected))
            }
        }
    }

    fn call(&self, function: Function, args: &[Expr], ctx: &Context) -> Result<XValue, XPathError> {
        let values = args
            .iter()
            .map(|arg| self.eval(arg, ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let string_arg = |index: usize| -> String {
            values
                .get(index)
                .map(|value| self.string(value))
                .unwrap_or_else(|| self.tree.string_value(ctx.node))
        };

        Ok(match function {
            Function::Last => XValue::Num(ctx.size as f64),
            Function::Position => XValue::Num(ctx.position as f64),
            Function::Count => match &values[0] {
                XValue::Nodes(nodes) => XValue::Num(nodes.len() as f64),
                _ => return Err(XPathError::Evaluation("count() expects a node-set".into())),
            },
            Function::Name | Function::LocalName => {
                let node = match values.first() {
                    Some(XValue::Nodes(nodes)) => nodes.first().copied(),
                    Some(_) => {
                        return Err(XPathError::Evaluation("name() expects a node-set".into()))
                    }
                    None => Some(ctx.node),
                };
                let name = node.map(|n| self.tree.name_of(n)).unwrap_or("");
                let name = match function {
                    Function::LocalName => name.rsplit(':').next().unwrap_or(name),
                    _ => name,
                };
                XValue::Str(name.to_owned())
            }
            Function::String => XValue::Str(string_arg(0)),
            Function::Concat => XValue::Str(values.iter().map(|v| self.string(v)).collect()),
            Function::Contains => XValue::Bool(string_arg(0).contains(&string_arg(1))),
            Function::StartsWith => XValue::Bool(string_arg(0).starts_with(&string_arg(1))),
            Function::EndsWith => XValue::Bool(string_arg(0).ends_with(&string_arg(1))),
            Function::NormalizeSpace => XValue::Str(
                string_arg(0).split_whitespace().collect::<Vec<_>>().join(" "),
            ),
            Function::StringLength => XValue::Num(string_arg(0).chars().count() as f64),
            Function::Translate => {
                let from: Vec<char> = string_arg(1).chars().collect();
                let to: Vec<char> = string_arg(2).chars().collect();
                XValue::Str(
                    string_arg(0)
                        .chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(at) => to.get(at).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            Function::Substring => {
                let start = round(self.number(&values[1]));
                let end = values
                    .get(2)
                    .map(|length| start + round(self.number(length)))
                    .unwrap_or(f64::INFINITY);
                XValue::Str(
                    string_arg(0)
                        .chars()
                        .enumerate()
                        .filter(|(index, _)| {
                            let position = (*index + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            Function::SubstringBefore => {
                let haystack = string_arg(0);
                let needle = string_arg(1);
                XValue::Str(
                    haystack
                        .find(&needle)
                        .map(|at| haystack[..at].to_owned())
                        .unwrap_or_default(),
                )
            }
            Function::SubstringAfter => {
                let haystack = string_arg(0);
                let needle = string_arg(1);
                XValue::Str(
                    haystack
                        .find(&needle)
                        .map(|at| haystack[at + needle.len()..].to_owned())
                        .unwrap_or_default(),
                )
            }
            Function::Not => XValue::Bool(!self.boolean(&values[0])),
            Function::True => XValue::Bool(true),
            Function::False => XValue::Bool(false),
            Function::Boolean => XValue::Bool(self.boolean(&values[0])),
            Function::Number => XValue::Num(match values.first() {
                Some(value) => self.number(value),
                None => parse_number(&self.tree.string_value(ctx.node)),
            }),
            Function::Sum => match &values[0] {
                XValue::Nodes(nodes) => XValue::Num(
                    nodes
                        .iter()
                        .map(|&n| parse_number(&self.tree.string_value(n)))
                        .sum(),
                ),
                _ => return Err(XPathError::Evaluation("sum() expects a node-set".into())),
            },
            Function::Floor => XValue::Num(self.number(&values[0]).floor()),
            Function::Ceiling => XValue::Num(self.number(&values[0]).ceil()),
            Function::Round => XValue::Num(round(self.number(&values[0]))),
        })
    }

    fn compare(&self, op: CompareOp, left: &XValue, right: &XValue) -> bool {
        match (left, right) {
            (XValue::Nodes(left), XValue::Nodes(right)) => left.iter().any(|&l| {
                let l = self.tree.string_value(l);
                right
                    .iter()
                    .any(|&r| compare_strings(op, &l, &self.tree.string_value(r)))
            }),
            (XValue::Nodes(nodes), other) => self.compare_node_set(op, nodes, other, false),
            (other, XValue::Nodes(nodes)) => self.compare_node_set(op, nodes, other, true),
            (left, right) => self.compare_atomic(op, left, right),
        }
    }

    fn compare_node_set(&self, op: CompareOp, nodes: &[NodeRef], other: &XValue, swapped: bool) -> bool {
        if let XValue::Bool(_) = other {
            let set = XValue::Bool(!nodes.is_empty());
            return if swapped {
                self.compare_atomic(op, other, &set)
            } else {
                self.compare_atomic(op, &set, other)
            };
        }

        nodes.iter().any(|&node| {
            let value = XValue::Str(self.tree.string_value(node));
            let value = match other {
                XValue::Num(_) => XValue::Num(self.number(&value)),
                _ => value,
            };
            if swapped {
                self.compare_atomic(op, other, &value)
            } else {
                self.compare_atomic(op, &value, other)
            }
        })
    }

    fn compare_atomic(&self, op: CompareOp, left: &XValue, right: &XValue) -> bool {
        match op {
            CompareOp::Eq | CompareOp::NotEq => {
                let equal = match (left, right) {
                    (XValue::Bool(_), _) | (_, XValue::Bool(_)) => {
                        self.boolean(left) == self.boolean(right)
                    }
                    (XValue::Num(_), _) | (_, XValue::Num(_)) => {
                        self.number(left) == self.number(right)
                    }
                    _ => self.string(left) == self.string(right),
                };
                if op == CompareOp::Eq {
                    equal
                } else {
                    !equal
                }
            }
            _ => compare_numbers(op, self.number(left), self.number(right)),
        }
    }

    pub(crate) fn boolean(&self, value: &XValue) -> bool {
        match value {
            XValue::Nodes(nodes) => !nodes.is_empty(),
            XValue::Str(s) => !s.is_empty(),
            XValue::Num(n) => *n != 0.0 && !n.is_nan(),
            XValue::Bool(b) => *b,
        }
    }

    pub(crate) fn number(&self, value: &XValue) -> f64 {
        match value {
            XValue::Nodes(_) => parse_number(&self.string(value)),
            XValue::Str(s) => parse_number(s),
            XValue::Num(n) => *n,
            XValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub(crate) fn string(&self, value: &XValue) -> String {
        match value {
            XValue::Nodes(nodes) => nodes
                .first()
                .map(|&node| self.tree.string_value(node))
                .unwrap_or_default(),
            XValue::Str(s) => s.clone(),
            XValue::Num(n) => number_to_string(*n),
            XValue::Bool(b) => b.to_string(),
        }
    }
}

fn compare_strings(op: CompareOp, left: &str, right: &str) -> bool {
    match op {
        CompareOp::Eq => left == right,
        CompareOp::NotEq => left != right,
        _ => compare_numbers(op, parse_number(left), parse_number(right)),
    }
}

fn compare_numbers(op: CompareOp, left: f64, right: f64) -> bool {
    match op {
        CompareOp::Eq => left == right,
        CompareOp::NotEq => left != right,
        CompareOp::Lt => left < right,
        CompareOp::Le => left <= right,
        CompareOp::Gt => left > right,
        CompareOp::Ge => left >= right,
    }
}

fn round(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// XPath `number()` of a string: optional minus, digits, optional fraction.
fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit());
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_the_xpath_way() {
        assert_eq!(parse_number(" 12.5 "), 12.5);
        assert_eq!(parse_number("-3"), -3.0);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("+1").is_nan());
        assert!(parse_number("").is_nan());
        assert!(parse_number(".").is_nan());
    }

    #[test]
    fn formats_numbers_the_xpath_way() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.25), "0.25");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(1.4), 1.0);
    }
}
