use std::fmt;

use mml_core::SourceSpan;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Keyword,
    String,
    Number,
    Operator,
    Identifier,
    Boolean,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Keyword => "Keyword",
            Self::String => "String",
            Self::Number => "Number",
            Self::Operator => "Operator",
            Self::Identifier => "Identifier",
            Self::Boolean => "Boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    File,
    Include,
    Use,
    Const,
    Preset,
    Change,
    ChangeOrAdd,
    Add,
    Remove,
    Set,
    All,
    At,
}

impl Keyword {
    pub const ALL: [Keyword; 12] = [
        Self::File,
        Self::Include,
        Self::Use,
        Self::Const,
        Self::Preset,
        Self::Change,
        Self::ChangeOrAdd,
        Self::Add,
        Self::Remove,
        Self::Set,
        Self::All,
        Self::At,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Include => "include",
            Self::Use => "use",
            Self::Const => "const",
            Self::Preset => "preset",
            Self::Change => "change",
            Self::ChangeOrAdd => "change_add",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Set => "set",
            Self::All => "all",
            Self::At => "at",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::ChangeOrAdd => &["change_or_add"],
            Self::All => &["change_all"],
            _ => &[],
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|keyword| {
            keyword.as_str().eq_ignore_ascii_case(word)
                || keyword
                    .aliases()
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(word))
        })
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Minus,
    Equals,
    Comma,
}

impl Operator {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            '{' => Some(Self::OpenBrace),
            '}' => Some(Self::CloseBrace),
            '(' => Some(Self::OpenParen),
            ')' => Some(Self::CloseParen),
            '-' => Some(Self::Minus),
            '=' => Some(Self::Equals),
            ',' => Some(Self::Comma),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::OpenBrace => '{',
            Self::CloseBrace => '}',
            Self::OpenParen => '(',
            Self::CloseParen => ')',
            Self::Minus => '-',
            Self::Equals => '=',
            Self::Comma => ',',
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// Equality compares text only; the parser matches operators and keywords by their spelling.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: SourceSpan,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword.as_str()
    }

    pub fn is_operator(&self, operator: Operator) -> bool {
        self.kind == TokenKind::Operator && *self == operator.as_char()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Token {}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

impl PartialEq<char> for Token {
    fn eq(&self, other: &char) -> bool {
        let mut chars = self.text.chars();
        chars.next() == Some(*other) && chars.next().is_none()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod token_tests {
    use super::*;

    fn token(kind: TokenKind, text: &str) -> Token {
        Token::new(kind, text, SourceSpan::synthetic())
    }

    #[test]
    fn keywords_match_case_insensitively_and_accept_aliases() {
        assert_eq!(Keyword::from_word("FILE"), Some(Keyword::File));
        assert_eq!(Keyword::from_word("Change_Add"), Some(Keyword::ChangeOrAdd));
        assert_eq!(Keyword::from_word("change_or_add"), Some(Keyword::ChangeOrAdd));
        assert_eq!(Keyword::from_word("change_all"), Some(Keyword::All));
        assert_eq!(Keyword::from_word("files"), None);
        assert_eq!(Keyword::from_word(""), None);
    }

    #[test]
    fn operators_round_trip_through_chars() {
        for ch in ['{', '}', '(', ')', '-', '=', ','] {
            let operator = Operator::from_char(ch).expect("operator char");
            assert_eq!(operator.as_char(), ch);
        }
        assert!(Operator::from_char('+').is_none());
    }

    #[test]
    fn token_equality_ignores_kind() {
        let string = token(TokenKind::String, "=");
        let operator = token(TokenKind::Operator, "=");
        assert_eq!(string, operator);
        assert!(operator == '=');
        assert!(operator == "=");
        assert!(operator.is_operator(Operator::Equals));
        assert!(!string.is_operator(Operator::Equals));
    }

    #[test]
    fn is_keyword_requires_keyword_kind() {
        assert!(token(TokenKind::Keyword, "set").is_keyword(Keyword::Set));
        assert!(!token(TokenKind::Identifier, "set").is_keyword(Keyword::Set));
    }

    #[test]
    fn tokens_serialize_with_kind_text_and_span() {
        let span = SourceSpan::new(
            mml_core::SourceLocation { line: 2, column: 5 },
            mml_core::SourceLocation { line: 2, column: 7 },
        );
        let value = serde_json::to_value(Token::new(TokenKind::Keyword, "set", span))
            .expect("token should serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "kind": "Keyword",
                "text": "set",
                "span": {
                    "start": { "line": 2, "column": 5 },
                    "end": { "line": 2, "column": 7 }
                }
            })
        );
    }
}
