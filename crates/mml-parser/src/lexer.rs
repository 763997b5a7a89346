use mml_core::{MmlError, SourceLocation, SourceSpan};

use crate::ast::render_number;
use crate::token::{Keyword, Operator, Token, TokenKind};

const UNCLOSED_PREVIEW_CHARS: usize = 10;
const CONTEXT_TOKENS: usize = 2;

type Recognizer = fn(&mut Lexer) -> Result<bool, MmlError>;

// Tried in order; the list restarts from the top after every success.
const RECOGNIZERS: [Recognizer; 7] = [
    Lexer::lex_comment,
    Lexer::lex_keyword,
    Lexer::lex_boolean,
    Lexer::lex_string,
    Lexer::lex_number,
    Lexer::lex_operator,
    Lexer::lex_identifier,
];

pub fn lex(source: &str) -> Result<Vec<Token>, MmlError> {
    Lexer::new(source).run()
}

pub fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_number_part(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '.'
}

fn is_boolean_part(ch: char) -> bool {
    matches!(ch, 't' | 'r' | 'u' | 'e' | 'f' | 'a' | 'l' | 's')
}

struct Lexer {
    chars: Vec<char>,
    locations: Vec<SourceLocation>,
    index: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut locations = Vec::with_capacity(chars.len() + 1);
        let mut location = SourceLocation::start();
        for ch in &chars {
            locations.push(location);
            if *ch == '\n' {
                location.line += 1;
                location.column = 1;
            } else {
                location.column += 1;
            }
        }
        locations.push(location);

        Self {
            chars,
            locations,
            index: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, MmlError> {
        loop {
            self.skip_space();
            let Some(ch) = self.current() else {
                break;
            };

            let mut matched = false;
            for recognizer in RECOGNIZERS {
                if recognizer(&mut self)? {
                    matched = true;
                    break;
                }
            }

            if !matched {
                return Err(MmlError::with_span(
                    "LEX_UNEXPECTED_CHAR",
                    format!(
                        "Unexpected character \"{}\" in \"{}\"",
                        ch,
                        self.context_with(&ch.to_string())
                    ),
                    self.span_from(self.index),
                ));
            }
        }

        Ok(self.tokens)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        prefix
            .chars()
            .enumerate()
            .all(|(offset, ch)| self.peek(offset) == Some(ch))
    }

    // Consumes a run of chars matching `part`; rolls back unless `accept` agrees with the word.
    fn take_while(
        &mut self,
        part: impl Fn(char) -> bool,
        accept: impl Fn(&str) -> bool,
    ) -> Option<String> {
        let start = self.index;
        while self.current().is_some_and(&part) {
            self.index += 1;
        }

        let word: String = self.chars[start..self.index].iter().collect();
        if accept(&word) {
            Some(word)
        } else {
            self.index = start;
            None
        }
    }

    fn take_run(&mut self, part: impl Fn(char) -> bool) -> Option<String> {
        self.take_while(part, |word| !word.is_empty())
    }

    fn skip_space(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.index += 1;
        }
    }

    fn span_from(&self, start: usize) -> SourceSpan {
        let end = self.index.max(start);
        SourceSpan::new(
            self.locations[start.min(self.chars.len())],
            self.locations[end.min(self.chars.len())],
        )
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, start: usize) {
        let span = self.span_from(start);
        self.tokens.push(Token::new(kind, text, span));
    }

    fn context_with(&self, extra: &str) -> String {
        let skip = self.tokens.len().saturating_sub(CONTEXT_TOKENS);
        self.tokens[skip..]
            .iter()
            .map(|token| token.text.as_str())
            .chain(std::iter::once(extra))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn lex_comment(&mut self) -> Result<bool, MmlError> {
        if self.starts_with("//") {
            while self.current().is_some_and(|ch| ch != '\n') {
                self.index += 1;
            }
            return Ok(true);
        }

        if self.starts_with("/*") {
            self.index += 2;
            while self.current().is_some() {
                if self.starts_with("*/") {
                    self.index += 2;
                    break;
                }
                self.index += 1;
            }
            return Ok(true);
        }

        Ok(false)
    }

    fn lex_keyword(&mut self) -> Result<bool, MmlError> {
        let start = self.index;
        let Some(word) = self.take_while(is_identifier_part, |word| {
            Keyword::from_word(word).is_some()
        }) else {
            return Ok(false);
        };

        if let Some(keyword) = Keyword::from_word(&word) {
            self.push(TokenKind::Keyword, keyword.as_str(), start);
        }
        Ok(true)
    }

    fn lex_boolean(&mut self) -> Result<bool, MmlError> {
        let start = self.index;
        let Some(word) =
            self.take_while(is_boolean_part, |word| word == "true" || word == "false")
        else {
            return Ok(false);
        };

        self.push(TokenKind::Boolean, word, start);
        Ok(true)
    }

    fn lex_string(&mut self) -> Result<bool, MmlError> {
        if self.current() != Some('\'') {
            return Ok(false);
        }

        let start = self.index;
        self.index += 1;
        let content = self
            .take_while(|ch| ch != '\'', |_| true)
            .unwrap_or_default();

        if self.current() != Some('\'') {
            let preview: String = content.chars().take(UNCLOSED_PREVIEW_CHARS).collect();
            return Err(MmlError::with_span(
                "LEX_UNCLOSED_QUOTE",
                format!("Unclosed quote in \"{}\"", self.context_with(&format!("'{}", preview))),
                self.span_from(start),
            ));
        }

        self.index += 1;
        self.push(TokenKind::String, content, start);
        Ok(true)
    }

    fn lex_number(&mut self) -> Result<bool, MmlError> {
        let start = self.index;
        let Some(word) = self.take_run(is_number_part) else {
            return Ok(false);
        };

        let value = word.parse::<f64>().map_err(|_| {
            MmlError::with_span(
                "LEX_INVALID_NUMBER",
                format!("Invalid number \"{}\" in \"{}\"", word, self.context_with(&word)),
                self.span_from(start),
            )
        })?;

        self.push(TokenKind::Number, render_number(value), start);
        Ok(true)
    }

    fn lex_operator(&mut self) -> Result<bool, MmlError> {
        let start = self.index;
        let Some(run) = self.take_run(|ch| Operator::from_char(ch).is_some()) else {
            return Ok(false);
        };

        for (offset, ch) in run.chars().enumerate() {
            let span = SourceSpan::new(
                self.locations[start + offset],
                self.locations[start + offset + 1],
            );
            self.tokens
                .push(Token::new(TokenKind::Operator, ch.to_string(), span));
        }
        Ok(true)
    }

    fn lex_identifier(&mut self) -> Result<bool, MmlError> {
        let start = self.index;
        let Some(word) = self.take_run(is_identifier_part) else {
            return Ok(false);
        };

        self.push(TokenKind::Identifier, word, start);
        Ok(true)
    }
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    fn kinds_and_texts(source: &str) -> Vec<(TokenKind, String)> {
        lex(source)
            .expect("lex should pass")
            .into_iter()
            .map(|token| (token.kind, token.text))
            .collect()
    }

    fn pair(kind: TokenKind, text: &str) -> (TokenKind, String) {
        (kind, text.to_string())
    }

    #[test]
    fn const_declaration_lexes_into_four_tokens() {
        assert_eq!(
            kinds_and_texts("const x = 'v'"),
            vec![
                pair(TokenKind::Keyword, "const"),
                pair(TokenKind::Identifier, "x"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::String, "v"),
            ]
        );
    }

    #[test]
    fn spacing_does_not_change_token_sequence() {
        let spaced = kinds_and_texts("add 'item' at 2 { set 'x' = -1.50 }");
        let compact = kinds_and_texts("add'item'at 2{set'x'=-1.50}");
        assert_eq!(spaced, compact);
        assert!(spaced.contains(&pair(TokenKind::Number, "1.5")));
    }

    #[test]
    fn adjacent_operators_split_into_single_char_tokens() {
        assert_eq!(
            kinds_and_texts("((x))"),
            vec![
                pair(TokenKind::Operator, "("),
                pair(TokenKind::Operator, "("),
                pair(TokenKind::Identifier, "x"),
                pair(TokenKind::Operator, ")"),
                pair(TokenKind::Operator, ")"),
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive_and_canonicalized() {
        assert_eq!(
            kinds_and_texts("FILE Change_Add change_all"),
            vec![
                pair(TokenKind::Keyword, "file"),
                pair(TokenKind::Keyword, "change_add"),
                pair(TokenKind::Keyword, "all"),
            ]
        );
        assert_eq!(
            kinds_and_texts("filed"),
            vec![pair(TokenKind::Identifier, "filed")]
        );
    }

    #[test]
    fn boolean_lexing_backtracks_on_partial_words() {
        assert_eq!(
            kinds_and_texts("true false rest"),
            vec![
                pair(TokenKind::Boolean, "true"),
                pair(TokenKind::Boolean, "false"),
                pair(TokenKind::Identifier, "rest"),
            ]
        );
        assert_eq!(
            kinds_and_texts("truex"),
            vec![
                pair(TokenKind::Boolean, "true"),
                pair(TokenKind::Identifier, "x"),
            ]
        );
    }

    #[test]
    fn comments_are_skipped_between_tokens() {
        let source = "// heading\nset /* inline */ 'a' = 1 // trailing";
        assert_eq!(
            kinds_and_texts(source),
            vec![
                pair(TokenKind::Keyword, "set"),
                pair(TokenKind::String, "a"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Number, "1"),
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_consumes_rest_of_input() {
        assert!(kinds_and_texts("/* abc").is_empty());
        assert_eq!(
            kinds_and_texts("x /* never closed\nconst y"),
            vec![pair(TokenKind::Identifier, "x")]
        );
    }

    #[test]
    fn strings_keep_content_verbatim() {
        assert_eq!(
            kinds_and_texts("'a {b} // c' ''"),
            vec![
                pair(TokenKind::String, "a {b} // c"),
                pair(TokenKind::String, ""),
            ]
        );
    }

    #[test]
    fn unclosed_string_reports_preview_and_context() {
        let error = lex("set 'attr' = 'abcdefghijklmnop").expect_err("unclosed quote should fail");
        assert_eq!(error.code, "LEX_UNCLOSED_QUOTE");
        assert!(error.message.contains("attr = 'abcdefghij\""));
        assert!(!error.message.contains("abcdefghijk"));

        let error = lex("'abc").expect_err("unclosed quote should fail");
        assert_eq!(error.code, "LEX_UNCLOSED_QUOTE");
    }

    #[test]
    fn invalid_number_is_fatal() {
        let error = lex("set 'x' = 1.2.3").expect_err("invalid number should fail");
        assert_eq!(error.code, "LEX_INVALID_NUMBER");
        assert!(error.message.contains("\"1.2.3\""));
        assert!(error.message.contains("x = 1.2.3"));
    }

    #[test]
    fn unexpected_character_names_char_and_previous_tokens() {
        let error = lex("const a = 'b' ; x").expect_err("semicolon should fail");
        assert_eq!(error.code, "LEX_UNEXPECTED_CHAR");
        assert_eq!(error.message, "Unexpected character \";\" in \"= b ;\"");
        let span = error.span.expect("span");
        assert_eq!(span.start.line, 1);
        assert_eq!(span.start.column, 15);
    }

    #[test]
    fn token_spans_track_lines() {
        let tokens = lex("const a = 1\n  set 'b' = a").expect("lex should pass");
        let set = tokens.iter().find(|token| token.text == "set").expect("set token");
        assert_eq!(set.span.start, SourceLocation { line: 2, column: 3 });
        assert_eq!(set.span.end, SourceLocation { line: 2, column: 6 });
    }
}
