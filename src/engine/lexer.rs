//! Hand-rolled tokenizer with line/column tracking
//!
//! Columns are 0-based and lines 1-based; token positions become the
//! statement positions the debugger binds breakpoints to, so the lexer is
//! careful to stamp the position of a token's first character.

use crate::common::{Error, Result};

use super::ast::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    Var,
    Function,
    If,
    Else,
    While,
    For,
    Return,
    Break,
    Continue,
    Debugger,
    True,
    False,
    Null,
    Undefined,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Bang,

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            idx: 0,
            line: 1,
            column: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.idx + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let pos = self.pos();
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit() {
                self.number(pos)?
            } else if c == '"' || c == '\'' {
                self.string(pos)?
            } else if c.is_ascii_alphabetic() || c == '_' || c == '$' {
                self.ident_or_keyword()
            } else {
                self.operator(pos)?
            };
            tokens.push(Token { kind, pos });
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    let pos = self.pos();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_next() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(Error::parse(
                                    "unterminated block comment",
                                    pos.line,
                                    pos.column,
                                ))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, pos: Position) -> Result<TokenKind> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| Error::parse(format!("invalid number '{text}'"), pos.line, pos.column))
    }

    fn string(&mut self, pos: Position) -> Result<TokenKind> {
        let quote = self.bump().unwrap_or('"');
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(c @ ('\\' | '\'' | '"')) => text.push(c),
                    Some(c) => text.push(c),
                    None => {
                        return Err(Error::parse("unterminated string", pos.line, pos.column))
                    }
                },
                Some('\n') | None => {
                    return Err(Error::parse("unterminated string", pos.line, pos.column))
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn ident_or_keyword(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match text.as_str() {
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "debugger" => TokenKind::Debugger,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            _ => TokenKind::Ident(text),
        }
    }

    fn operator(&mut self, pos: Position) -> Result<TokenKind> {
        let c = self.bump().unwrap_or('\0');
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '+' => {
                if self.peek() == Some('+') {
                    self.bump();
                    TokenKind::PlusPlus
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.bump();
                    TokenKind::MinusMinus
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::NotEqEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    TokenKind::AndAnd
                } else {
                    return Err(Error::parse("unexpected character '&'", pos.line, pos.column));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    TokenKind::OrOr
                } else {
                    return Err(Error::parse("unexpected character '|'", pos.line, pos.column));
                }
            }
            other => {
                return Err(Error::parse(
                    format!("unexpected character '{other}'"),
                    pos.line,
                    pos.column,
                ))
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_zero_based_columns() {
        let tokens = tokenize("var x = 1; var y = 2;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].pos, Position::new(1, 0));
        // Second `var` starts after "var x = 1; "
        let second_var = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Var)
            .nth(1)
            .unwrap();
        assert_eq!(second_var.pos, Position::new(1, 11));
    }

    #[test]
    fn test_multiline_positions() {
        let tokens = tokenize("var a = 1;\nvar b = 2;").unwrap();
        let second_var = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Var)
            .nth(1)
            .unwrap();
        assert_eq!(second_var.pos, Position::new(2, 0));
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("i === 2 && i++ <= 3").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("i".into()),
                TokenKind::EqEqEq,
                TokenKind::Number(2.0),
                TokenKind::AndAnd,
                TokenKind::Ident("i".into()),
                TokenKind::PlusPlus,
                TokenKind::Le,
                TokenKind::Number(3.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""i is \n" 'ok'"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str("i is \n".into()));
        assert_eq!(tokens[1].kind, TokenKind::Str("ok".into()));
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = tokenize("// line\n/* block */ var x;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].pos, Position::new(2, 12));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(tokenize("\"oops").is_err());
    }
}
