use crate::content::xpath::lexer::{tokenize, Token};
use crate::content::xpath::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arithmetic(ArithmeticOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Function(Function, Vec<Expr>),
    Path(LocationPath),
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocationPath {
    pub(crate) absolute: bool,
    pub(crate) steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub(crate) axis: Axis,
    pub(crate) test: NodeTest,
    pub(crate) predicates: Vec<Expr>,
}

impl Step {
    fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }

    /// The step `//` abbreviates.
    fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    Node,
    Text,
    Comment,
    Wildcard,
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Last,
    Position,
    Count,
    Name,
    LocalName,
    String,
    Concat,
    Contains,
    StartsWith,
    EndsWith,
    NormalizeSpace,
    StringLength,
    Translate,
    Substring,
    SubstringBefore,
    SubstringAfter,
    Not,
    True,
    False,
    Boolean,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    fn resolve(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Function::Last,
            "position" => Function::Position,
            "count" => Function::Count,
            "name" => Function::Name,
            "local-name" => Function::LocalName,
            "string" => Function::String,
            "concat" => Function::Concat,
            "contains" => Function::Contains,
            "starts-with" => Function::StartsWith,
            "ends-with" => Function::EndsWith,
            "normalize-space" => Function::NormalizeSpace,
            "string-length" => Function::StringLength,
            "translate" => Function::Translate,
            "substring" => Function::Substring,
            "substring-before" => Function::SubstringBefore,
            "substring-after" => Function::SubstringAfter,
            "not" => Function::Not,
            "true" => Function::True,
            "false" => Function::False,
            "boolean" => Function::Boolean,
            "number" => Function::Number,
            "sum" => Function::Sum,
            "floor" => Function::Floor,
            "ceiling" => Function::Ceiling,
            "round" => Function::Round,
            _ => return None,
        })
    }

    /// Accepted argument count as `(min, max)`, `None` meaning unbounded.
    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Last | Function::Position | Function::True | Function::False => (0, Some(0)),
            Function::Name
            | Function::LocalName
            | Function::String
            | Function::NormalizeSpace
            | Function::StringLength
            | Function::Number => (0, Some(1)),
            Function::Count
            | Function::Not
            | Function::Boolean
            | Function::Sum
            | Function::Floor
            | Function::Ceiling
            | Function::Round => (1, Some(1)),
            Function::Contains
            | Function::StartsWith
            | Function::EndsWith
            | Function::SubstringBefore
            | Function::SubstringAfter => (2, Some(2)),
            Function::Substring => (2, Some(3)),
            Function::Translate => (3, Some(3)),
            Function::Concat => (2, None),
        }
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "node" | "text" | "comment" | "processing-instruction")
}

pub(crate) fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.chars().count(),
    };

    let expr = parser.parse_or()?;
    if let Some((at, token)) = parser.tokens.get(parser.pos) {
        return Err(XPathError::syntax(*at, format!("unexpected token {token:?}")));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(at, _)| *at)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), XPathError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(XPathError::syntax(
                self.position(),
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn eat_operator_name(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and()?;
        while self.eat_operator_name("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality()?;
        while self.eat_operator_name("and") {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithmeticOp::Add,
                Some(Token::Minus) => ArithmeticOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Arithmetic(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithmeticOp::Multiply,
                Some(Token::Name(n)) if n == "div" => ArithmeticOp::Divide,
                Some(Token::Name(n)) if n == "mod" => ArithmeticOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arithmetic(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        let mut negations = 0;
        while self.eat(&Token::Minus) {
            negations += 1;
        }
        let expr = self.parse_union()?;
        Ok(if negations % 2 == 1 {
            Expr::Negate(Box::new(expr))
        } else {
            expr
        })
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        let starts_filter = match self.peek() {
            Some(Token::Literal(_) | Token::Number(_) | Token::LParen | Token::Dollar) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !is_node_type(name)
            }
            _ => false,
        };

        if !starts_filter {
            return Ok(Expr::Path(self.parse_location_path()?));
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let mut steps = Vec::new();
        if self.eat(&Token::Slash) {
            steps = self.parse_relative_path()?;
        } else if self.eat(&Token::DoubleSlash) {
            steps.push(Step::descendant_or_self());
            steps.extend(self.parse_relative_path()?);
        }

        if predicates.is_empty() && steps.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        let at = self.position();
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Dollar) => Err(XPathError::Unsupported("variable references".into())),
            Some(Token::Name(name)) => {
                let function = Function::resolve(&name)
                    .ok_or_else(|| XPathError::UnknownFunction(name.clone()))?;
                self.expect(Token::LParen)?;

                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }

                let (min, max) = function.arity();
                if args.len() < min || max.is_some_and(|max| args.len() > max) {
                    return Err(XPathError::Arity {
                        function: name,
                        found: args.len(),
                    });
                }
                Ok(Expr::Function(function, args))
            }
            other => Err(XPathError::syntax(at, format!("unexpected token {other:?}"))),
        }
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn parse_location_path(&mut self) -> Result<LocationPath, XPathError> {
        if self.eat(&Token::Slash) {
            let steps = if self.at_step_start() {
                self.parse_relative_path()?
            } else {
                Vec::new()
            };
            return Ok(LocationPath {
                absolute: true,
                steps,
            });
        }

        if self.eat(&Token::DoubleSlash) {
            let mut steps = vec![Step::descendant_or_self()];
            steps.extend(self.parse_relative_path()?);
            return Ok(LocationPath {
                absolute: true,
                steps,
            });
        }

        Ok(LocationPath {
            absolute: false,
            steps: self.parse_relative_path()?,
        })
    }

    fn parse_relative_path(&mut self) -> Result<Vec<Step>, XPathError> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if self.peek_at(1) == Some(&Token::DoubleColon) {
            let at = self.position();
            let Some(Token::Name(name)) = self.advance() else {
                return Err(XPathError::syntax(at, "expected axis name"));
            };
            self.advance();
            Axis::from_name(&name)
                .ok_or_else(|| XPathError::syntax(at, format!("unknown axis '{name}'")))?
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let mut step = Step::new(axis, test);
        step.predicates = self.parse_predicates()?;
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        let at = self.position();
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Wildcard),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) && is_node_type(&name) => {
                self.advance();
                if name == "processing-instruction" {
                    // optional target literal
                    if let Some(Token::Literal(_)) = self.peek() {
                        self.advance();
                    }
                }
                self.expect(Token::RParen)?;
                Ok(match name.as_str() {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "node" => NodeTest::Node,
                    _ => return Err(XPathError::Unsupported("processing-instruction()".into())),
                })
            }
            Some(Token::Name(name)) => Ok(NodeTest::Name(name)),
            other => Err(XPathError::syntax(
                at,
                format!("expected node test, found {other:?}"),
            )),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }
}
