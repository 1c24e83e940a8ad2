use std::rc::Rc;

use crate::error::{Error, ErrorKind};
use crate::position::Position;
use crate::token::{Token, TokenType};

/// Converts source text into a token stream. The scan is byte-oriented and
/// keeps a live `Position` so every token carries its exact span.
#[derive(Debug)]
pub struct Scanner {
    source: Rc<str>,
    tokens: Vec<Token>,
    pos: Position,
    current: Option<u8>,
}

impl Scanner {
    pub fn new(file_name: &str, source: &str) -> Self {
        let file_name: Rc<str> = Rc::from(file_name);
        let source: Rc<str> = Rc::from(source);
        let pos = Position::new(file_name, source.clone());
        let current = source.as_bytes().first().copied();

        Self {
            source,
            tokens: Vec::new(),
            pos,
            current,
        }
    }

    /// The first lexical error aborts the scan.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, Error> {
        while let Some(c) = self.current {
            match c {
                b' ' | b'\r' | b'\t' | b'\n' => self.advance(),
                b'#' => self.skip_comment(),

                b'(' => self.single(TokenType::LeftParen, "("),
                b')' => self.single(TokenType::RightParen, ")"),
                b'{' => self.single(TokenType::LeftBrace, "{"),
                b'}' => self.single(TokenType::RightBrace, "}"),
                b'[' => self.single(TokenType::LeftBracket, "["),
                b']' => self.single(TokenType::RightBracket, "]"),
                b',' => self.single(TokenType::Comma, ","),
                b'.' => self.single(TokenType::Dot, "."),
                b';' => self.single(TokenType::Semicolon, ";"),
                b':' => self.single(TokenType::Colon, ":"),
                b'%' => self.single(TokenType::Percent, "%"),
                b'?' => self.single(TokenType::QuestionMark, "?"),

                b'+' => self.plus(),
                b'-' => self.minus(),
                b'*' => self.one_or_two(b'=', TokenType::StarEqual, "*=", TokenType::Star, "*"),
                b'/' => self.one_or_two(b'=', TokenType::SlashEqual, "/=", TokenType::Slash, "/"),
                b'!' => self.one_or_two(b'=', TokenType::BangEqual, "!=", TokenType::Bang, "!"),
                b'=' => self.one_or_two(b'=', TokenType::EqualEqual, "==", TokenType::Equal, "="),
                b'<' => self.one_or_two(b'=', TokenType::LessEqual, "<=", TokenType::Less, "<"),
                b'>' => {
                    self.one_or_two(b'=', TokenType::GreaterEqual, ">=", TokenType::Greater, ">")
                }

                b'"' => self.string()?,
                b'0'..=b'9' => self.number(),
                c if c == b'_' || c.is_ascii_alphabetic() => self.identifier(),

                _ => {
                    let start = self.pos.clone();
                    self.advance();
                    return Err(Error::new(
                        ErrorKind::IllegalChar,
                        start,
                        self.pos.clone(),
                        "Cannot tokenize this character",
                    ));
                }
            }
        }

        self.tokens.push(Token::new(
            TokenType::EndOfFile,
            "",
            self.pos.clone(),
            self.pos.clone(),
        ));

        Ok(self.tokens)
    }

    fn advance(&mut self) {
        if let Some(c) = self.current {
            self.pos.advance(c);
            self.current = self.source.as_bytes().get(self.pos.index).copied();
        }
    }

    fn push(&mut self, token_type: TokenType, lexeme: &str, start: Position) {
        self.tokens
            .push(Token::new(token_type, lexeme, start, self.pos.clone()));
    }

    fn single(&mut self, token_type: TokenType, lexeme: &str) {
        let start = self.pos.clone();
        self.advance();
        self.push(token_type, lexeme, start);
    }

    fn one_or_two(
        &mut self,
        expect: u8,
        two: TokenType,
        two_lexeme: &str,
        one: TokenType,
        one_lexeme: &str,
    ) {
        let start = self.pos.clone();
        self.advance();

        if self.current == Some(expect) {
            self.advance();
            self.push(two, two_lexeme, start);
        } else {
            self.push(one, one_lexeme, start);
        }
    }

    fn plus(&mut self) {
        let start = self.pos.clone();
        self.advance();

        match self.current {
            Some(b'+') => {
                self.advance();
                self.push(TokenType::PlusPlus, "++", start);
            }
            Some(b'=') => {
                self.advance();
                self.push(TokenType::PlusEqual, "+=", start);
            }
            _ => self.push(TokenType::Plus, "+", start),
        }
    }

    fn minus(&mut self) {
        let start = self.pos.clone();
        self.advance();

        match self.current {
            Some(b'-') => {
                self.advance();
                self.push(TokenType::MinusMinus, "--", start);
            }
            Some(b'=') => {
                self.advance();
                self.push(TokenType::MinusEqual, "-=", start);
            }
            _ => self.push(TokenType::Minus, "-", start),
        }
    }

    fn skip_comment(&mut self) {
        self.advance();

        while let Some(c) = self.current {
            if c == b'\n' {
                break;
            }
            self.advance();
        }

        self.advance();
    }

    fn string(&mut self) -> Result<(), Error> {
        let start = self.pos.clone();
        self.advance();

        let mut value: Vec<u8> = Vec::new();
        let mut escape = false;

        while let Some(c) = self.current {
            if escape {
                value.push(match c {
                    b'n' => b'\n',
                    b't' => b'\t',
                    other => other,
                });
                escape = false;
            } else if c == b'\\' {
                escape = true;
            } else if c == b'"' {
                break;
            } else {
                value.push(c);
            }

            self.advance();
        }

        if self.current != Some(b'"') {
            return Err(Error::new(
                ErrorKind::ExpectChar,
                start,
                self.pos.clone(),
                "'\"' at the end of a string",
            ));
        }
        self.advance();

        let text = String::from_utf8_lossy(&value).into_owned();
        self.push(TokenType::StringLiteral, &text, start);
        Ok(())
    }

    fn number(&mut self) {
        let start = self.pos.clone();

        while matches!(self.current, Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        if self.current == Some(b'.') {
            self.advance();
            while matches!(self.current, Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        } else if self.current == Some(b'x') {
            self.advance();
            while matches!(self.current, Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
        } else if self.current == Some(b'b') {
            self.advance();
            while matches!(self.current, Some(c) if c == b'0' || c == b'1') {
                self.advance();
            }
        }

        let lexeme = self.source[start.index..self.pos.index].to_owned();
        self.push(TokenType::Number, &lexeme, start);
    }

    fn identifier(&mut self) {
        let start = self.pos.clone();

        while matches!(self.current, Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.advance();
        }

        let text = self.source[start.index..self.pos.index].to_owned();
        let token_type = get_keyword(&text).unwrap_or(TokenType::Identifier);
        self.push(token_type, &text, start);
    }
}

fn get_keyword(text: &str) -> Option<TokenType> {
    match text {
        "nil" => Some(TokenType::Nil),
        "true" => Some(TokenType::True),
        "false" => Some(TokenType::False),
        "var" => Some(TokenType::Var),
        "class" => Some(TokenType::Class),
        "this" => Some(TokenType::This),
        "super" => Some(TokenType::Super),
        "if" => Some(TokenType::If),
        "else" => Some(TokenType::Else),
        "for" => Some(TokenType::For),
        "while" => Some(TokenType::While),
        "break" => Some(TokenType::Break),
        "continue" => Some(TokenType::Continue),
        "func" => Some(TokenType::Func),
        "return" => Some(TokenType::Return),
        "and" => Some(TokenType::And),
        "or" => Some(TokenType::Or),
        "import" => Some(TokenType::Import),
        "as" => Some(TokenType::As),
        "from" => Some(TokenType::From),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        Scanner::new("<test>", source)
            .scan_tokens()
            .expect("failed to scan")
    }

    fn kinds(source: &str) -> Vec<TokenType> {
        scan(source).into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn scans_compound_operators_greedily() {
        assert_eq!(
            kinds("++ -- += -= *= /= == != <= >= = < >"),
            vec![
                TokenType::PlusPlus,
                TokenType::MinusMinus,
                TokenType::PlusEqual,
                TokenType::MinusEqual,
                TokenType::StarEqual,
                TokenType::SlashEqual,
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Equal,
                TokenType::Less,
                TokenType::Greater,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("var classy class"),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Class,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let tokens = scan(r#""a\tb\nc\"d\x""#);
        assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
        assert_eq!(tokens[0].lexeme, "a\tb\nc\"dx");
    }

    #[test]
    fn unterminated_string_is_an_expect_char_error() {
        let err = Scanner::new("<test>", "\"abc").scan_tokens().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpectChar);
    }

    #[test]
    fn numbers_keep_their_raw_spelling() {
        let tokens = scan("12 3.5 0x1F 0b101");
        let lexemes: Vec<&str> = tokens[..4].iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["12", "3.5", "0x1F", "0b101"]);
        assert!(tokens[..4].iter().all(|t| t.token_type == TokenType::Number));
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("1 # the rest is ignored ; var\n2"),
            vec![TokenType::Number, TokenType::Number, TokenType::EndOfFile]
        );
    }

    #[test]
    fn illegal_character_reports_position() {
        let err = Scanner::new("<test>", "var $x;").scan_tokens().unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalChar);
        assert_eq!(err.pos_start.column, 4);
    }

    #[test]
    fn relexing_joined_lexemes_is_stable() {
        let source = "var x = 1 + 2 * foo(3); # trailing";
        let first = scan(source);
        let joined = first
            .iter()
            .map(|t| t.lexeme.clone())
            .collect::<Vec<_>>()
            .join(" ");
        let second = scan(&joined);
        let a: Vec<_> = first.iter().map(|t| t.token_type).collect();
        let b: Vec<_> = second.iter().map(|t| t.token_type).collect();
        assert_eq!(a, b);
    }
}
