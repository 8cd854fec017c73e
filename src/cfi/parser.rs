//! CFI parser
//!
//! Grammar accepted (a subset sufficient for text locations):
//! ```text
//! cfi    = ["epubcfi("] path ["," path "," path] [")"]
//! path   = step+ [":" number [assertion]]
//! step   = "/" number [assertion] | "!"
//! ```

use thiserror::Error;

use super::{Cfi, CfiPath, CfiRange, CfiStep};

/// CFI parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfiError {
    #[error("Empty CFI string")]
    Empty,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("Expected '/' or '!' at position {0}")]
    ExpectedStep(usize),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// Parse a CFI string (with or without the `epubcfi(...)` wrapper)
pub fn parse(input: &str) -> Result<Cfi, CfiError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiError::Empty);
    }

    let body = match input.strip_prefix("epubcfi(") {
        Some(rest) => rest.strip_suffix(')').ok_or(CfiError::MissingClosingParen)?,
        None => input,
    };

    let mut parser = Parser::new(body);
    let path = parser.parse_path()?;

    let range = if parser.skip_if(',') {
        let start = parser.parse_path()?;
        parser.expect(',')?;
        let end = parser.parse_path()?;
        Some(CfiRange { start, end })
    } else {
        None
    };

    if let Some(ch) = parser.peek() {
        return Err(CfiError::UnexpectedChar(ch, parser.pos));
    }

    Ok(Cfi { path, range })
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), CfiError> {
        if self.skip_if(expected) {
            Ok(())
        } else {
            Err(CfiError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos))
        }
    }

    fn parse_number(&mut self) -> Result<u32, CfiError> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiError::ExpectedNumber(start))
    }

    /// Read a `[...]` assertion body, honouring `^` escapes
    fn parse_bracket(&mut self) -> Result<String, CfiError> {
        let start = self.pos;
        self.expect('[')?;
        let mut content = String::new();
        loop {
            match self.advance() {
                Some('^') => match self.advance() {
                    Some(ch) => content.push(ch),
                    None => return Err(CfiError::UnclosedBracket(start)),
                },
                Some(']') => return Ok(content),
                Some(ch) => content.push(ch),
                None => return Err(CfiError::UnclosedBracket(start)),
            }
        }
    }

    fn parse_path(&mut self) -> Result<CfiPath, CfiError> {
        let mut path = CfiPath::default();

        loop {
            match self.peek() {
                Some('/') => {
                    self.advance();
                    let index = self.parse_number()?;
                    let id = if self.peek() == Some('[') {
                        let assertion = self.parse_bracket()?;
                        // "[id;s=a]" keeps the id, "[;s=a]" is only a side bias
                        let id = assertion.split(';').next().unwrap_or_default();
                        (!id.is_empty()).then(|| id.to_string())
                    } else {
                        None
                    };
                    path.steps.push(CfiStep::Element { index, id });
                }
                Some('!') => {
                    self.advance();
                    path.steps.push(CfiStep::Indirection);
                }
                _ => break,
            }
        }

        if path.steps.is_empty() {
            return Err(CfiError::ExpectedStep(self.pos));
        }

        if self.skip_if(':') {
            path.offset = Some(self.parse_number()?);
            if self.peek() == Some('[') {
                self.parse_bracket()?;
            }
        }

        Ok(path)
    }
}
