use std::collections::HashMap;
use std::fmt;

/// Maps character codes to Unicode text, as extracted from a ToUnicode
/// stream. Keys are zero-padded uppercase hex strings so that the same
/// normalization serves one- and two-byte codes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMap {
    map: HashMap<String, String>,
}

impl CMap {
    pub fn new() -> CMap {
        CMap::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    fn insert(&mut self, code: u32, text: String) {
        self.map.insert(format!("{:04X}", code), text);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CMapError {
    pub message: String,
}

impl fmt::Display for CMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed ToUnicode CMap: {}", self.message)
    }
}

impl std::error::Error for CMapError {}

// Guards against hostile lo/hi pairs; real ToUnicode ranges are tiny.
const MAX_RANGE_SPAN: u32 = 0x1_0000;

/// Extracts `beginbfchar`/`beginbfrange` mappings from a ToUnicode stream
/// payload. Every other CMap directive is ignored.
pub fn parse_cmap(data: &[u8]) -> Result<CMap, CMapError> {
    let mut tokens = CMapTokenizer::new(data);
    let mut cmap = CMap::new();
    while let Some(token) = tokens.next() {
        match token.as_str() {
            "beginbfchar" => parse_bfchar_section(&mut tokens, &mut cmap)?,
            "beginbfrange" => parse_bfrange_section(&mut tokens, &mut cmap)?,
            _ => {}
        }
    }
    Ok(cmap)
}

fn parse_bfchar_section(tokens: &mut CMapTokenizer<'_>, cmap: &mut CMap) -> Result<(), CMapError> {
    while let Some(token) = tokens.next() {
        if token == "endbfchar" {
            break;
        }
        let src = hex_token_bytes(&token)?;
        let dst = match tokens.next() {
            Some(token) => hex_token_bytes(&token)?,
            None => break,
        };
        cmap.insert(code_value(&src)?, utf16be_string(&dst));
    }
    Ok(())
}

fn parse_bfrange_section(tokens: &mut CMapTokenizer<'_>, cmap: &mut CMap) -> Result<(), CMapError> {
    while let Some(token) = tokens.next() {
        if token == "endbfrange" {
            break;
        }
        let lo = code_value(&hex_token_bytes(&token)?)?;
        let hi = match tokens.next() {
            Some(token) => code_value(&hex_token_bytes(&token)?)?,
            None => break,
        };
        let dst = match tokens.next() {
            Some(token) => token,
            None => break,
        };

        if dst == "[" {
            // Explicit per-code list; surplus entries are consumed but
            // ignored.
            let usable = hi >= lo && hi - lo < MAX_RANGE_SPAN;
            let mut code = lo;
            while let Some(entry) = tokens.next() {
                if entry == "]" {
                    break;
                }
                let text = utf16be_string(&hex_token_bytes(&entry)?);
                if usable && code <= hi {
                    cmap.insert(code, text);
                    code = code.saturating_add(1);
                }
            }
        } else {
            let base = hex_token_bytes(&dst)?;
            let units = utf16be_units(&base);
            if units.is_empty() || hi < lo || hi - lo >= MAX_RANGE_SPAN {
                continue;
            }
            // Consecutive codes increment the final UTF-16 code unit.
            for offset in 0..=(hi - lo) {
                let mut mapped = units.clone();
                let last = mapped.len() - 1;
                mapped[last] = mapped[last].wrapping_add(offset as u16);
                cmap.insert(lo + offset, String::from_utf16_lossy(&mapped));
            }
        }
    }
    Ok(())
}

fn hex_token_bytes(token: &str) -> Result<Vec<u8>, CMapError> {
    let inner = token
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .ok_or_else(|| CMapError {
            message: format!("expected <hex> token, found {:?}", token),
        })?;
    let mut out = Vec::with_capacity(inner.len() / 2);
    let mut nibbles = inner.chars().filter(|c| !c.is_ascii_whitespace());
    loop {
        let hi = match nibbles.next() {
            Some(c) => c,
            None => break,
        };
        let lo = nibbles.next().unwrap_or('0');
        let hi = hi.to_digit(16).ok_or_else(|| CMapError {
            message: format!("invalid hex digit {:?}", hi),
        })?;
        let lo = lo.to_digit(16).ok_or_else(|| CMapError {
            message: format!("invalid hex digit {:?}", lo),
        })?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

fn code_value(bytes: &[u8]) -> Result<u32, CMapError> {
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(CMapError {
            message: format!("source code of {} bytes", bytes.len()),
        });
    }
    Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

fn utf16be_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn utf16be_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16be_units(bytes))
}

/// Whitespace-separated CMap token scanner; `<…>` groups and the square
/// brackets of explicit range lists are single tokens.
struct CMapTokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CMapTokenizer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next(&mut self) -> Option<String> {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return None;
        }
        let b = self.data[self.pos];
        if b == b'<' {
            let start = self.pos;
            self.pos += 1;
            while self.pos < self.data.len() && self.data[self.pos] != b'>' {
                self.pos += 1;
            }
            if self.pos < self.data.len() {
                self.pos += 1;
            }
            return Some(String::from_utf8_lossy(&self.data[start..self.pos]).to_string());
        }
        if b == b'[' || b == b']' {
            self.pos += 1;
            return Some((b as char).to_string());
        }
        let start = self.pos;
        while self.pos < self.data.len()
            && !self.data[self.pos].is_ascii_whitespace()
            && self.data[self.pos] != b'['
            && self.data[self.pos] != b']'
            && self.data[self.pos] != b'<'
        {
            self.pos += 1;
        }
        Some(String::from_utf8_lossy(&self.data[start..self.pos]).to_string())
    }
}
