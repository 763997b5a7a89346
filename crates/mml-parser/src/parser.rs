use std::rc::Rc;

use mml_core::{MmlError, SourceSpan};

use crate::ast::{IdentifierRef, Literal, Node, PresetDecl, Script};
use crate::token::{Keyword, Operator, Token, TokenKind};

type DirectiveParser<'a> = fn(&mut Parser<'a>) -> Result<Option<Node>, MmlError>;

pub fn parse(tokens: &[Token]) -> Result<Script, MmlError> {
    let mut parser = Parser { tokens, index: 0 };
    let mut body = Vec::new();

    while let Some(token) = parser.current() {
        match parser.parse_directive()? {
            Some(node) => body.push(node),
            None => return Err(unexpected_token(token)),
        }
    }

    Ok(Script { body })
}

fn unexpected_token(token: &Token) -> MmlError {
    MmlError::with_span(
        "PARSE_UNEXPECTED_TOKEN",
        format!("Unexpected token \"{}\"", token.text),
        token.span.clone(),
    )
}

struct Parser<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    fn end_span(&self) -> SourceSpan {
        self.tokens
            .last()
            .map(|token| SourceSpan::at(token.span.end))
            .unwrap_or_else(SourceSpan::synthetic)
    }

    fn check_token(&mut self, accept: impl Fn(&Token) -> bool) -> Option<&'a Token> {
        let token = self.current().filter(|token| accept(*token))?;
        self.index += 1;
        Some(token)
    }

    fn check_keyword(&mut self, keyword: Keyword) -> bool {
        self.check_token(|token| token.is_keyword(keyword)).is_some()
    }

    fn check_operator(&mut self, operator: Operator) -> bool {
        self.check_token(|token| token.is_operator(operator)).is_some()
    }

    fn expect_token(
        &mut self,
        accept: impl Fn(&Token) -> bool,
        expected: &str,
    ) -> Result<&'a Token, MmlError> {
        if let Some(token) = self.check_token(&accept) {
            return Ok(token);
        }

        Err(match self.current() {
            Some(found) => MmlError::with_span(
                "PARSE_UNEXPECTED_TOKEN",
                format!(
                    "Unexpected token \"{}\". Expected {}. Found {}",
                    found.text,
                    expected,
                    found.kind.name()
                ),
                found.span.clone(),
            ),
            None => MmlError::with_span(
                "PARSE_UNEXPECTED_TOKEN",
                format!("Unexpected end of input. Expected {}. Found None", expected),
                self.end_span(),
            ),
        })
    }

    fn expect_operator(&mut self, operator: Operator) -> Result<(), MmlError> {
        self.expect_token(
            |token| token.is_operator(operator),
            &format!("Operator '{}'", operator),
        )?;
        Ok(())
    }

    fn parse_directive(&mut self) -> Result<Option<Node>, MmlError> {
        let parsers: [DirectiveParser<'a>; 9] = [
            Self::parse_include,
            Self::parse_file,
            Self::parse_use,
            Self::parse_preset,
            Self::parse_set,
            Self::parse_add,
            Self::parse_change,
            Self::parse_remove,
            Self::parse_const,
        ];

        for parser in parsers {
            if let Some(node) = parser(self)? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn parse_block(&mut self) -> Result<Vec<Node>, MmlError> {
        self.expect_operator(Operator::OpenBrace)?;

        let mut body = Vec::new();
        while let Some(token) = self.current() {
            if token.is_operator(Operator::CloseBrace) {
                break;
            }
            match self.parse_directive()? {
                Some(node) => body.push(node),
                None => return Err(unexpected_token(token)),
            }
        }

        self.expect_operator(Operator::CloseBrace)?;
        Ok(body)
    }

    fn parse_include(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Include) {
            return Ok(None);
        }

        let name = self.parse_identifier()?;
        Ok(Some(Node::Include { name }))
    }

    fn parse_file(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::File) {
            return Ok(None);
        }

        let path = Box::new(self.parse_selector()?);
        let body = self.parse_block()?;
        Ok(Some(Node::FileBlock { path, body }))
    }

    fn parse_use(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Use) {
            return Ok(None);
        }

        let name = self.parse_identifier()?;
        let args = self.try_parse_args()?.unwrap_or_default();
        Ok(Some(Node::PresetUse { name, args }))
    }

    fn parse_preset(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Preset) {
            return Ok(None);
        }

        let name = self.parse_identifier()?;
        let params = self.parse_params(&name)?;
        let body = self.parse_block()?;
        Ok(Some(Node::PresetDecl(Rc::new(PresetDecl {
            name,
            params,
            body,
        }))))
    }

    fn parse_set(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Set) {
            return Ok(None);
        }

        let name = Box::new(self.parse_selector()?);
        self.expect_operator(Operator::Equals)?;
        let value = Box::new(self.parse_value()?);
        Ok(Some(Node::SetAttribute { name, value }))
    }

    fn parse_add(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Add) {
            return Ok(None);
        }

        let tag = Box::new(self.parse_selector()?);
        let position = self.try_parse_position()?.map(Box::new);
        let body = self.parse_block()?;
        Ok(Some(Node::AddElement {
            tag,
            position,
            body,
        }))
    }

    fn parse_change(&mut self) -> Result<Option<Node>, MmlError> {
        if self.check_keyword(Keyword::ChangeOrAdd) {
            let tag = Box::new(self.parse_selector()?);
            let position = self.try_parse_position()?.map(Box::new);
            let body = self.parse_block()?;
            return Ok(Some(Node::ChangeOrAddElement {
                tag,
                position,
                body,
            }));
        }

        if self.check_keyword(Keyword::All) {
            let selector = Box::new(self.parse_selector()?);
            let body = self.parse_block()?;
            return Ok(Some(Node::ChangeAllElements { selector, body }));
        }

        if self.check_keyword(Keyword::Change) {
            let selector = Box::new(self.parse_selector()?);
            let body = self.parse_block()?;
            return Ok(Some(Node::ChangeElement { selector, body }));
        }

        Ok(None)
    }

    // `remove <selector>` always means attribute removal; only `remove all` reaches elements.
    fn parse_remove(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Remove) {
            return Ok(None);
        }

        if self.check_keyword(Keyword::All) {
            let selector = Box::new(self.parse_selector()?);
            return Ok(Some(Node::RemoveAllElements { selector }));
        }

        let name = Box::new(self.parse_selector()?);
        Ok(Some(Node::RemoveAttribute { name }))
    }

    fn parse_const(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::Const) {
            return Ok(None);
        }

        let name = self.parse_identifier()?;
        self.expect_operator(Operator::Equals)?;
        let value = Box::new(self.parse_value()?);
        Ok(Some(Node::ConstDecl { name, value }))
    }

    fn parse_identifier(&mut self) -> Result<String, MmlError> {
        let token = self.expect_token(|token| token.kind == TokenKind::Identifier, "Identifier")?;
        Ok(token.text.clone())
    }

    fn parse_selector(&mut self) -> Result<Node, MmlError> {
        let token = self.expect_token(
            |token| matches!(token.kind, TokenKind::String | TokenKind::Identifier),
            "String or Variable",
        )?;

        match token.kind {
            TokenKind::Identifier => self.identifier_ref(token, false),
            _ => Ok(Node::Literal(Literal::String(token.text.clone()))),
        }
    }

    fn parse_value(&mut self) -> Result<Node, MmlError> {
        let negative = self.check_operator(Operator::Minus);
        let token = self.expect_token(
            |token| {
                matches!(
                    token.kind,
                    TokenKind::Number | TokenKind::String | TokenKind::Boolean | TokenKind::Identifier
                )
            },
            "Number or String or Variable",
        )?;

        match token.kind {
            TokenKind::Identifier => self.identifier_ref(token, negative),
            TokenKind::Number => {
                let value = number_value(token)?;
                Ok(Node::Literal(Literal::Number(if negative { -value } else { value })))
            }
            TokenKind::Boolean => Ok(Node::Literal(Literal::Boolean(token.text == "true"))),
            _ => Ok(Node::Literal(Literal::String(token.text.clone()))),
        }
    }

    fn try_parse_position(&mut self) -> Result<Option<Node>, MmlError> {
        if !self.check_keyword(Keyword::At) {
            return Ok(None);
        }

        let negative = self.check_operator(Operator::Minus);
        let token = self.expect_token(
            |token| matches!(token.kind, TokenKind::Number | TokenKind::Identifier),
            "Integer or Variable",
        )?;

        match token.kind {
            TokenKind::Identifier => self.identifier_ref(token, negative).map(Some),
            _ => {
                let value = number_value(token)?.trunc() as i64;
                Ok(Some(Node::Literal(Literal::Integer(if negative {
                    -value
                } else {
                    value
                }))))
            }
        }
    }

    fn identifier_ref(&mut self, token: &Token, negative: bool) -> Result<Node, MmlError> {
        let args = self.try_parse_args()?;
        Ok(Node::IdentifierRef(IdentifierRef {
            name: token.text.clone(),
            args,
            negative,
        }))
    }

    fn try_parse_args(&mut self) -> Result<Option<Vec<Node>>, MmlError> {
        if !self.check_operator(Operator::OpenParen) {
            return Ok(None);
        }
        if self.check_operator(Operator::CloseParen) {
            return Ok(Some(Vec::new()));
        }

        let mut args = Vec::new();
        loop {
            args.push(self.parse_value()?);
            if self.check_operator(Operator::CloseParen) {
                break;
            }
            self.expect_operator(Operator::Comma)?;
        }
        Ok(Some(args))
    }

    fn parse_params(&mut self, preset: &str) -> Result<Vec<String>, MmlError> {
        if !self.check_operator(Operator::OpenParen) {
            let span = self
                .current()
                .map(|token| token.span.clone())
                .unwrap_or_else(|| self.end_span());
            return Err(MmlError::with_span(
                "PARSE_MISSING_PARAMS",
                format!("Missing parameter list for preset '{}'", preset),
                span,
            ));
        }
        if self.check_operator(Operator::CloseParen) {
            return Ok(Vec::new());
        }

        let mut params = Vec::new();
        loop {
            params.push(self.parse_identifier()?);
            if self.check_operator(Operator::CloseParen) {
                break;
            }
            self.expect_operator(Operator::Comma)?;
        }
        Ok(params)
    }
}

fn number_value(token: &Token) -> Result<f64, MmlError> {
    token.text.parse::<f64>().map_err(|_| {
        MmlError::with_span(
            "LEX_INVALID_NUMBER",
            format!("Invalid number \"{}\"", token.text),
            token.span.clone(),
        )
    })
}
