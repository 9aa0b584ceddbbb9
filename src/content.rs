use std::collections::HashMap;

use crate::lexer::{is_delim, is_whitespace, LexError, Lexer, Token};
use crate::model::Object;

/// Synthetic operator emitted for `BI … ID … EI` inline images.
pub const INLINE_IMAGE_OP: &str = "INLINE_IMAGE";

/// One content-stream instruction: an operator with the operands that
/// preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
}

/// Pulls `Operation`s out of a decoded content stream.
///
/// Operands accumulate in a flat buffer that is drained whenever an
/// operator keyword arrives; PDF operators tolerate extra or missing
/// operands, so no arity checking happens here. Trailing operands without
/// an operator are discarded at end of input.
pub struct ContentStreamParser<'a> {
    lexer: Lexer<'a>,
    operands: Vec<Object>,
}

impl<'a> ContentStreamParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            operands: Vec::with_capacity(8),
        }
    }

    pub fn next(&mut self) -> Result<Option<Operation>, LexError> {
        loop {
            let token = match self.lexer.next_token()? {
                Some(token) => token,
                None => {
                    self.operands.clear();
                    return Ok(None);
                }
            };
            match token {
                Token::Keyword(op) => {
                    if op == "BI" {
                        return self.parse_inline_image().map(Some);
                    }
                    return Ok(Some(Operation {
                        operator: op,
                        operands: std::mem::take(&mut self.operands),
                    }));
                }
                other => {
                    if let Some(obj) = self.object_from_token(other)? {
                        self.operands.push(obj);
                    }
                }
            }
        }
    }

    fn object_from_token(&mut self, token: Token) -> Result<Option<Object>, LexError> {
        Ok(match token {
            Token::Null => Some(Object::Null),
            Token::Boolean(v) => Some(Object::Boolean(v)),
            Token::Number(v) => Some(Object::Number(v)),
            Token::LiteralString(v) => Some(Object::LiteralString(v)),
            Token::HexString(v) => Some(Object::HexString(v)),
            Token::Name(v) => Some(Object::Name(v)),
            Token::ArrayStart => Some(Object::Array(self.parse_array()?)),
            Token::DictStart => Some(Object::Dictionary(self.parse_dict()?)),
            Token::Keyword(v) => Some(Object::Keyword(v)),
            Token::ArrayEnd | Token::DictEnd => None,
        })
    }

    fn parse_array(&mut self) -> Result<Vec<Object>, LexError> {
        let mut items = Vec::new();
        while let Some(token) = self.lexer.next_token()? {
            match token {
                Token::ArrayEnd => break,
                Token::Keyword(_) => {}
                other => {
                    if let Some(obj) = self.object_from_token(other)? {
                        items.push(obj);
                    }
                }
            }
        }
        Ok(items)
    }

    fn parse_dict(&mut self) -> Result<HashMap<String, Object>, LexError> {
        let mut dict = HashMap::new();
        while let Some(token) = self.lexer.next_token()? {
            let key = match token {
                Token::DictEnd => break,
                Token::Name(v) => v,
                _ => continue,
            };
            let value = match self.lexer.next_token()? {
                Some(token) => self.object_from_token(token)?,
                None => break,
            };
            if let Some(value) = value {
                dict.insert(key, value);
            }
        }
        Ok(dict)
    }

    /// `BI` switches to inline-image mode: name/value pairs up to `ID`,
    /// then raw sample data up to a delimited `EI` marker. The image never
    /// contributes text; only its dictionary is surfaced.
    fn parse_inline_image(&mut self) -> Result<Operation, LexError> {
        let mut dict = HashMap::new();
        while let Some(token) = self.lexer.next_token()? {
            let key = match token {
                Token::Keyword(ref kw) if kw == "ID" => break,
                Token::Name(v) => v,
                _ => {
                    return Err(LexError {
                        offset: self.lexer.position(),
                        message: "expected name in inline image dictionary",
                    })
                }
            };
            let value = match self.lexer.next_token()? {
                Some(token) => self.object_from_token(token)?,
                None => break,
            };
            if let Some(value) = value {
                dict.insert(key, value);
            }
        }

        self.skip_inline_image_data();
        self.operands.clear();
        Ok(Operation {
            operator: INLINE_IMAGE_OP.to_string(),
            operands: vec![Object::Dictionary(dict)],
        })
    }

    fn skip_inline_image_data(&mut self) {
        let input = self.lexer.input();
        let mut pos = self.lexer.position();

        // ID is followed by exactly one EOL sequence; any other byte is
        // already sample data.
        if pos < input.len() {
            if input[pos] == b'\r' {
                pos += 1;
                if pos < input.len() && input[pos] == b'\n' {
                    pos += 1;
                }
            } else if input[pos] == b'\n' {
                pos += 1;
            }
        }

        let mut i = pos;
        while i + 1 < input.len() {
            if input[i] == b'E' && input[i + 1] == b'I' {
                let prev_ok = i > 0 && is_boundary(input[i - 1]);
                let next_ok = i + 2 >= input.len() || is_boundary(input[i + 2]);
                if prev_ok && next_ok {
                    self.lexer.set_position(i + 2);
                    return;
                }
            }
            i += 1;
        }
        self.lexer.set_position(input.len());
    }
}

fn is_boundary(byte: u8) -> bool {
    is_whitespace(byte) || is_delim(byte)
}
