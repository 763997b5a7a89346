use mml_core::MmlError;

#[derive(Debug, Clone, PartialEq)]
enum XToken {
    Slash,
    DoubleSlash,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    At,
    Dot,
    DotDot,
    Comma,
    Pipe,
    Star,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    ColonColon,
    Literal(String),
    Number(f64),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    SelfAxis,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            "attribute" => Self::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    Any,
    Name(String),
    Text,
    Comment,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub(crate) axis: Axis,
    pub(crate) test: NodeTest,
    pub(crate) predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    Filter { primary: Box<Expr>, predicates: Vec<Expr>, steps: Vec<Step> },
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
}

fn syntax_error(expression: &str, detail: impl AsRef<str>) -> MmlError {
    MmlError::new(
        "XPATH_SYNTAX",
        format!("Invalid XPath \"{}\": {}", expression, detail.as_ref()),
    )
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_part(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

fn tokenize(expression: &str) -> Result<Vec<XToken>, MmlError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let next = chars.get(index + 1).copied();
        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        let (token, width) = match ch {
            '/' if next == Some('/') => (XToken::DoubleSlash, 2),
            '/' => (XToken::Slash, 1),
            '[' => (XToken::OpenBracket, 1),
            ']' => (XToken::CloseBracket, 1),
            '(' => (XToken::OpenParen, 1),
            ')' => (XToken::CloseParen, 1),
            '@' => (XToken::At, 1),
            ',' => (XToken::Comma, 1),
            '|' => (XToken::Pipe, 1),
            '*' => (XToken::Star, 1),
            '+' => (XToken::Plus, 1),
            '-' => (XToken::Minus, 1),
            '=' => (XToken::Eq, 1),
            '!' if next == Some('=') => (XToken::NotEq, 2),
            '<' if next == Some('=') => (XToken::LtEq, 2),
            '<' => (XToken::Lt, 1),
            '>' if next == Some('=') => (XToken::GtEq, 2),
            '>' => (XToken::Gt, 1),
            ':' if next == Some(':') => (XToken::ColonColon, 2),
            '.' if next == Some('.') => (XToken::DotDot, 2),
            '.' if !next.is_some_and(|next| next.is_ascii_digit()) => (XToken::Dot, 1),
            '\'' | '"' => {
                let Some(length) = chars[index + 1..].iter().position(|other| *other == ch) else {
                    return Err(syntax_error(expression, "unterminated literal"));
                };
                let literal: String = chars[index + 1..index + 1 + length].iter().collect();
                (XToken::Literal(literal), length + 2)
            }
            _ if ch.is_ascii_digit() || ch == '.' => {
                let length = chars[index..]
                    .iter()
                    .take_while(|other| other.is_ascii_digit() || **other == '.')
                    .count();
                let text: String = chars[index..index + length].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax_error(expression, format!("invalid number \"{}\"", text)))?;
                (XToken::Number(value), length)
            }
            _ if is_name_start(ch) => {
                let mut end = index + 1;
                while end < chars.len() {
                    let part = chars[end];
                    // A single colon joins a prefixed name; `::` ends it.
                    let prefixed = part == ':'
                        && chars.get(end + 1).is_some_and(|after| is_name_start(*after));
                    if is_name_part(part) || prefixed {
                        end += 1;
                    } else {
                        break;
                    }
                }
                let name: String = chars[index..end].iter().collect();
                (XToken::Name(name), end - index)
            }
            other => {
                return Err(syntax_error(
                    expression,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        tokens.push(token);
        index += width;
    }

    Ok(tokens)
}

pub(crate) fn parse_expression(expression: &str) -> Result<Expr, MmlError> {
    let tokens = tokenize(expression)?;
    let mut parser = ExprParser {
        expression,
        tokens,
        index: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.current() {
        return Err(syntax_error(
            expression,
            format!("unexpected trailing token {:?}", token),
        ));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    expression: &'a str,
    tokens: Vec<XToken>,
    index: usize,
}

impl ExprParser<'_> {
    fn current(&self) -> Option<&XToken> {
        self.tokens.get(self.index)
    }

    fn peek(&self, offset: usize) -> Option<&XToken> {
        self.tokens.get(self.index + offset)
    }

    fn check(&mut self, expected: &XToken) -> bool {
        if self.current() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn check_name(&mut self, name: &str) -> bool {
        if matches!(self.current(), Some(XToken::Name(current)) if current == name) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: XToken) -> Result<(), MmlError> {
        if self.check(&expected) {
            Ok(())
        } else {
            Err(syntax_error(
                self.expression,
                format!("expected {:?}, found {:?}", expected, self.current()),
            ))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, MmlError> {
        let mut left = self.parse_and()?;
        while self.check_name("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, MmlError> {
        let mut left = self.parse_equality()?;
        while self.check_name("and") {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, MmlError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = if self.check(&XToken::Eq) {
                CompareOp::Eq
            } else if self.check(&XToken::NotEq) {
                CompareOp::NotEq
            } else {
                return Ok(left);
            };
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, MmlError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check(&XToken::Lt) {
                CompareOp::Lt
            } else if self.check(&XToken::LtEq) {
                CompareOp::LtEq
            } else if self.check(&XToken::Gt) {
                CompareOp::Gt
            } else if self.check(&XToken::GtEq) {
                CompareOp::GtEq
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, MmlError> {
        let mut left = self.parse_unary()?;
        loop {
            if self.check(&XToken::Plus) {
                let right = self.parse_unary()?;
                left = Expr::Add(Box::new(left), Box::new(right));
            } else if self.check(&XToken::Minus) {
                let right = self.parse_unary()?;
                left = Expr::Subtract(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, MmlError> {
        if self.check(&XToken::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, MmlError> {
        let mut left = self.parse_path()?;
        while self.check(&XToken::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_primary(&self) -> bool {
        match self.current() {
            Some(XToken::Literal(_) | XToken::Number(_) | XToken::OpenParen) => true,
            Some(XToken::Name(name)) => {
                self.peek(1) == Some(&XToken::OpenParen)
                    && !matches!(name.as_str(), "text" | "node" | "comment")
            }
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.current(),
            Some(XToken::Name(_) | XToken::Star | XToken::At | XToken::Dot | XToken::DotDot)
        )
    }

    fn parse_path(&mut self) -> Result<Expr, MmlError> {
        if self.check(&XToken::Slash) {
            let steps = if self.starts_step() {
                self.parse_relative_steps()?
            } else {
                Vec::new()
            };
            return Ok(Expr::Path {
                absolute: true,
                steps,
            });
        }

        if self.check(&XToken::DoubleSlash) {
            let mut steps = vec![Step::descendant_or_self()];
            steps.extend(self.parse_relative_steps()?);
            return Ok(Expr::Path {
                absolute: true,
                steps,
            });
        }

        if self.starts_primary() {
            let primary = Box::new(self.parse_primary()?);
            let predicates = self.parse_predicates()?;
            let mut steps = Vec::new();
            if self.check(&XToken::Slash) {
                steps = self.parse_relative_steps()?;
            } else if self.check(&XToken::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.extend(self.parse_relative_steps()?);
            }
            if predicates.is_empty() && steps.is_empty() {
                return Ok(*primary);
            }
            return Ok(Expr::Filter {
                primary,
                predicates,
                steps,
            });
        }

        Ok(Expr::Path {
            absolute: false,
            steps: self.parse_relative_steps()?,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, MmlError> {
        match self.current().cloned() {
            Some(XToken::Literal(value)) => {
                self.index += 1;
                Ok(Expr::Literal(value))
            }
            Some(XToken::Number(value)) => {
                self.index += 1;
                Ok(Expr::Number(value))
            }
            Some(XToken::OpenParen) => {
                self.index += 1;
                let inner = self.parse_or()?;
                self.expect(XToken::CloseParen)?;
                Ok(inner)
            }
            Some(XToken::Name(name)) => {
                self.index += 1;
                self.expect(XToken::OpenParen)?;
                let mut args = Vec::new();
                if !self.check(&XToken::CloseParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.check(&XToken::CloseParen) {
                            break;
                        }
                        self.expect(XToken::Comma)?;
                    }
                }
                Ok(Expr::Function(name, args))
            }
            other => Err(syntax_error(
                self.expression,
                format!("expected expression, found {:?}", other),
            )),
        }
    }

    fn parse_relative_steps(&mut self) -> Result<Vec<Step>, MmlError> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.check(&XToken::Slash) {
                steps.push(self.parse_step()?);
            } else if self.check(&XToken::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, MmlError> {
        if self.check(&XToken::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.check(&XToken::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let mut axis = Axis::Child;
        if self.check(&XToken::At) {
            axis = Axis::Attribute;
        } else if let (Some(XToken::Name(name)), Some(XToken::ColonColon)) =
            (self.current(), self.peek(1))
        {
            axis = Axis::from_name(name)
                .ok_or_else(|| syntax_error(self.expression, format!("unknown axis \"{}\"", name)))?;
            self.index += 2;
        }

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, MmlError> {
        match self.current().cloned() {
            Some(XToken::Star) => {
                self.index += 1;
                Ok(NodeTest::Any)
            }
            Some(XToken::Name(name)) => {
                self.index += 1;
                if self.current() == Some(&XToken::OpenParen) {
                    let test = match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::Node,
                        "comment" => NodeTest::Comment,
                        _ => {
                            return Err(syntax_error(
                                self.expression,
                                format!("unknown node type \"{}\"", name),
                            ))
                        }
                    };
                    self.index += 1;
                    self.expect(XToken::CloseParen)?;
                    return Ok(test);
                }
                Ok(NodeTest::Name(name))
            }
            other => Err(syntax_error(
                self.expression,
                format!("expected node test, found {:?}", other),
            )),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, MmlError> {
        let mut predicates = Vec::new();
        while self.check(&XToken::OpenBracket) {
            predicates.push(self.parse_or()?);
            self.expect(XToken::CloseBracket)?;
        }
        Ok(predicates)
    }
}
