use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::Read;

use crate::lexer::{Lexer, Token};
use crate::model::Object;

const MAX_REF_DEPTH: usize = 8;
const MAX_PAGE_TREE_DEPTH: usize = 32;

static NULL_OBJECT: Object = Object::Null;

#[derive(Debug)]
pub enum ReaderError {
    InvalidHeader,
    NoCatalog,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::InvalidHeader => write!(f, "not a PDF file (missing %PDF header)"),
            ReaderError::NoCatalog => write!(f, "no document catalog found"),
        }
    }
}

impl std::error::Error for ReaderError {}

#[derive(Debug)]
pub enum PageError {
    OutOfRange { index: u32, count: u32 },
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::OutOfRange { index, count } => {
                write!(f, "page index {} out of range ({} pages)", index, count)
            }
        }
    }
}

impl std::error::Error for PageError {}

/// Random-access view of a parsed PDF file.
///
/// The file is scanned linearly for `N G obj` headers instead of following
/// the physical cross-reference table; damaged or missing xref sections do
/// not prevent reading. Stream payloads are filter-decoded at scan time, so
/// every `Object::Stream` handed out carries plain bytes.
#[derive(Debug)]
pub struct Reader {
    objects: HashMap<(u32, u16), Object>,
    trailer: Option<HashMap<String, Object>>,
    pages: Vec<HashMap<String, Object>>,
    encrypted: bool,
}

impl Reader {
    pub fn new(data: &[u8]) -> Result<Reader, ReaderError> {
        let probe = &data[..data.len().min(1024)];
        if memchr::memmem::find(probe, b"%PDF-").is_none() {
            return Err(ReaderError::InvalidHeader);
        }

        let mut scanner = Scanner::new(Lexer::new(data));
        let (mut objects, trailer) = scanner.scan_all();
        expand_object_streams(&mut objects);

        let encrypted = trailer
            .as_ref()
            .map_or(false, |t| t.contains_key("Encrypt"));

        let mut reader = Reader {
            objects,
            trailer,
            pages: Vec::new(),
            encrypted,
        };
        reader.pages = reader.collect_pages()?;
        Ok(reader)
    }

    pub fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    /// The trailer Info dictionary, if the document carries one.
    pub fn get_info(&self) -> Option<&HashMap<String, Object>> {
        let info = self.trailer.as_ref()?.get("Info")?;
        self.resolve(info).as_dict()
    }

    /// The page dictionary at a 0-based index, with `/Resources` and
    /// `/MediaBox` already inherited from ancestor nodes.
    pub fn get_page(&self, index: u32) -> Result<&HashMap<String, Object>, PageError> {
        self.pages
            .get(index as usize)
            .ok_or(PageError::OutOfRange {
                index,
                count: self.num_pages(),
            })
    }

    /// Dereferences indirect references, chasing chains up to a fixed
    /// depth. Non-references pass through; unresolvable references yield
    /// the null object.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..MAX_REF_DEPTH {
            match current {
                Object::Reference { obj_num, gen_num } => {
                    match self.objects.get(&(*obj_num, *gen_num)) {
                        Some(next) => current = next,
                        None => return &NULL_OBJECT,
                    }
                }
                _ => return current,
            }
        }
        &NULL_OBJECT
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn collect_pages(&self) -> Result<Vec<HashMap<String, Object>>, ReaderError> {
        let root = self
            .trailer
            .as_ref()
            .and_then(|t| t.get("Root"))
            .map(|r| self.resolve(r))
            .and_then(|r| r.as_dict())
            .ok_or(ReaderError::NoCatalog)?;
        let mut pages = Vec::new();
        if let Some(pages_root) = root.get("Pages") {
            self.walk_page_tree(pages_root, None, None, &mut pages, MAX_PAGE_TREE_DEPTH);
        }
        Ok(pages)
    }

    fn walk_page_tree(
        &self,
        node: &Object,
        inherited_resources: Option<&Object>,
        inherited_media_box: Option<&Object>,
        out: &mut Vec<HashMap<String, Object>>,
        depth: usize,
    ) {
        if depth == 0 {
            return;
        }
        let dict = match self.resolve(node).as_dict() {
            Some(v) => v,
            None => return,
        };
        let resources = dict.get("Resources").or(inherited_resources);
        let media_box = dict.get("MediaBox").or(inherited_media_box);
        match dict.get("Type").and_then(|v| v.as_name()) {
            Some("Page") => {
                let mut page = dict.clone();
                if let Some(resources) = resources {
                    page.entry("Resources".to_string())
                        .or_insert_with(|| resources.clone());
                }
                if let Some(media_box) = media_box {
                    page.entry("MediaBox".to_string())
                        .or_insert_with(|| media_box.clone());
                }
                out.push(page);
            }
            _ => {
                if let Some(Object::Array(kids)) = dict.get("Kids") {
                    for kid in kids {
                        self.walk_page_tree(kid, resources, media_box, out, depth - 1);
                    }
                }
            }
        }
    }
}

/// Linear object scanner over the raw file bytes.
struct Scanner<'a> {
    lexer: Lexer<'a>,
    peeked: VecDeque<Token>,
}

impl<'a> Scanner<'a> {
    fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            peeked: VecDeque::new(),
        }
    }

    fn scan_all(&mut self) -> (HashMap<(u32, u16), Object>, Option<HashMap<String, Object>>) {
        let mut objects: HashMap<(u32, u16), Object> = HashMap::new();
        let mut trailer: Option<HashMap<String, Object>> = None;

        while let Some(token) = self.next_token() {
            match token {
                Token::Number(first) => {
                    let obj_num = match u32_value(first) {
                        Some(v) => v,
                        None => continue,
                    };
                    let gen_num = match self.peek_token_n(1) {
                        Some(Token::Number(v)) => u16_value(*v),
                        _ => None,
                    };
                    let has_obj_keyword =
                        matches!(self.peek_token_n(2), Some(Token::Keyword(kw)) if kw == "obj");
                    if let (Some(gen_num), true) = (gen_num, has_obj_keyword) {
                        let _ = self.next_token();
                        let _ = self.next_token();
                        if let Some(obj) = self.parse_indirect_object(&objects) {
                            if trailer.is_none() {
                                if let Object::Stream { dict, .. } = &obj {
                                    if dict.get("Type").and_then(|v| v.as_name()) == Some("XRef") {
                                        trailer = Some(dict.clone());
                                    }
                                }
                            }
                            objects.insert((obj_num, gen_num), obj);
                        }
                    }
                }
                Token::Keyword(ref kw) if kw == "trailer" => {
                    if let Some(Object::Dictionary(dict)) = self.parse_object(&objects) {
                        // Incremental updates append a fresh trailer; the
                        // last one seen wins.
                        trailer = Some(dict);
                    }
                }
                _ => {}
            }
        }

        (objects, trailer)
    }

    fn parse_indirect_object(
        &mut self,
        objects: &HashMap<(u32, u16), Object>,
    ) -> Option<Object> {
        let obj = self.parse_object(objects)?;
        loop {
            match self.peek_token_n(1) {
                Some(Token::Keyword(kw)) if kw == "endobj" => {
                    let _ = self.next_token();
                    break;
                }
                Some(_) => {
                    let _ = self.next_token();
                }
                None => break,
            }
        }
        Some(obj)
    }

    fn parse_object(&mut self, objects: &HashMap<(u32, u16), Object>) -> Option<Object> {
        let token = self.next_token()?;
        match token {
            Token::Null => Some(Object::Null),
            Token::Boolean(v) => Some(Object::Boolean(v)),
            Token::Number(v) => Some(self.parse_number_or_ref(v)),
            Token::LiteralString(v) => Some(Object::LiteralString(v)),
            Token::HexString(v) => Some(Object::HexString(v)),
            Token::Name(v) => Some(Object::Name(v)),
            Token::ArrayStart => Some(Object::Array(self.parse_array(objects))),
            Token::DictStart => self.parse_dict_or_stream(objects),
            // Keywords are operators, not data values.
            Token::Keyword(_) => None,
            Token::DictEnd | Token::ArrayEnd => None,
        }
    }

    /// Two whole numbers followed by the keyword `R` collapse into an
    /// indirect reference.
    fn parse_number_or_ref(&mut self, first: f64) -> Object {
        let obj_num = u32_value(first);
        let gen_num = match (obj_num, self.peek_token_n(1)) {
            (Some(_), Some(Token::Number(v))) => u16_value(*v),
            _ => None,
        };
        if let (Some(obj_num), Some(gen_num)) = (obj_num, gen_num) {
            let is_ref = matches!(self.peek_token_n(2), Some(Token::Keyword(kw)) if kw == "R");
            if is_ref {
                let _ = self.next_token();
                let _ = self.next_token();
                return Object::Reference { obj_num, gen_num };
            }
        }
        Object::Number(first)
    }

    fn parse_array(&mut self, objects: &HashMap<(u32, u16), Object>) -> Vec<Object> {
        let mut items = Vec::new();
        loop {
            match self.peek_token_n(1) {
                Some(Token::ArrayEnd) => {
                    let _ = self.next_token();
                    break;
                }
                None => break,
                Some(_) => {}
            }
            // Tokens that do not form a value were already consumed.
            if let Some(obj) = self.parse_object(objects) {
                items.push(obj);
            }
        }
        items
    }

    fn parse_dict_or_stream(&mut self, objects: &HashMap<(u32, u16), Object>) -> Option<Object> {
        let mut dict = HashMap::new();
        loop {
            match self.peek_token_n(1) {
                Some(Token::DictEnd) => {
                    let _ = self.next_token();
                    break;
                }
                None => break,
                Some(_) => {}
            }
            let key = match self.next_token() {
                Some(Token::Name(v)) => v,
                _ => break,
            };
            match self.parse_object(objects) {
                Some(value) => {
                    dict.insert(key, value);
                }
                None => break,
            }
        }

        let has_stream_keyword =
            matches!(self.peek_token_n(1), Some(Token::Keyword(kw)) if kw == "stream");
        if !has_stream_keyword {
            return Some(Object::Dictionary(dict));
        }

        let _ = self.next_token();
        let length = self.stream_length(&dict, objects);
        self.peeked.clear();
        let stream_start = self.lexer.position();
        let mut data = match length {
            Some(length) => self.lexer.consume_stream(length),
            None => self.lexer.consume_stream_until_endstream(),
        };

        if length.is_some() {
            let next_is_marker = matches!(
                self.peek_token_n(1),
                Some(Token::Keyword(kw)) if kw == "endstream" || kw == "endobj"
            );
            if !next_is_marker {
                // Declared length did not land on the marker; fall back to
                // scanning for it.
                self.peeked.clear();
                self.lexer.set_position(stream_start);
                data = self.lexer.consume_stream_until_endstream();
            }
        }

        if matches!(self.peek_token_n(1), Some(Token::Keyword(kw)) if kw == "endstream") {
            let _ = self.next_token();
        }

        let data = decode_stream_data(&dict, &data);
        Some(Object::Stream { dict, data })
    }

    fn stream_length(
        &self,
        dict: &HashMap<String, Object>,
        objects: &HashMap<(u32, u16), Object>,
    ) -> Option<usize> {
        let mut length = dict.get("Length")?;
        for _ in 0..MAX_REF_DEPTH {
            match length {
                Object::Number(_) => {
                    let v = length.as_i64()?;
                    return if v >= 0 { usize::try_from(v).ok() } else { None };
                }
                Object::Reference { obj_num, gen_num } => {
                    length = objects.get(&(*obj_num, *gen_num))?;
                }
                _ => return None,
            }
        }
        None
    }

    /// Tokens are pulled permissively: a lexically broken region is skipped
    /// and the scan continues, so binary junk between objects cannot stop
    /// object recovery.
    fn next_token(&mut self) -> Option<Token> {
        if let Some(token) = self.peeked.pop_front() {
            return Some(token);
        }
        self.pull_token()
    }

    fn pull_token(&mut self) -> Option<Token> {
        loop {
            match self.lexer.next_token() {
                Ok(token) => return token,
                Err(err) => {
                    let resume = err.offset.saturating_add(1);
                    if resume >= self.lexer.input().len() {
                        return None;
                    }
                    self.lexer.set_position(resume);
                }
            }
        }
    }

    fn peek_token_n(&mut self, n: usize) -> Option<&Token> {
        while self.peeked.len() < n {
            match self.pull_token() {
                Some(token) => self.peeked.push_back(token),
                None => break,
            }
        }
        self.peeked.get(n - 1)
    }
}

fn u32_value(v: f64) -> Option<u32> {
    if v.is_finite() && v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&v) {
        Some(v as u32)
    } else {
        None
    }
}

fn u16_value(v: f64) -> Option<u16> {
    if v.is_finite() && v.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&v) {
        Some(v as u16)
    } else {
        None
    }
}

/// Object streams hold indirect objects needed later; expand them after the
/// scan. Direct objects from incremental updates supersede stale entries,
/// so gaps are filled but existing objects are never overwritten.
fn expand_object_streams(objects: &mut HashMap<(u32, u16), Object>) {
    let mut object_stream_keys: Vec<(u32, u16)> = objects
        .iter()
        .filter_map(|(key, obj)| match obj {
            Object::Stream { dict, .. }
                if dict.get("Type").and_then(|v| v.as_name()) == Some("ObjStm") =>
            {
                Some(*key)
            }
            _ => None,
        })
        .collect();
    object_stream_keys.sort_unstable();

    let mut updates: HashMap<(u32, u16), Object> = HashMap::new();
    for key in object_stream_keys {
        let (dict, data) = match objects.get(&key) {
            Some(Object::Stream { dict, data }) => (dict, data),
            _ => continue,
        };
        let n = dict.get("N").and_then(|v| v.as_i64()).unwrap_or(0).max(0) as usize;
        let first = dict
            .get("First")
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            .max(0) as usize;
        if n == 0 || first == 0 || data.len() < first {
            continue;
        }

        let mut header = Scanner::new(Lexer::new(&data[..first]));
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let obj_num = match header.next_token() {
                Some(Token::Number(v)) => match u32_value(v) {
                    Some(v) => v,
                    None => break,
                },
                _ => break,
            };
            let offset = match header.next_token() {
                Some(Token::Number(v)) if v >= 0.0 && v.fract() == 0.0 => v as usize,
                _ => break,
            };
            entries.push((obj_num, offset));
        }

        for (obj_num, offset) in entries {
            let entry_key = (obj_num, 0);
            let pos = first + offset;
            if pos >= data.len()
                || objects.contains_key(&entry_key)
                || updates.contains_key(&entry_key)
            {
                continue;
            }
            if let Some(obj) = parse_object_at(data, pos) {
                updates.insert(entry_key, obj);
            }
        }
    }

    for (key, obj) in updates {
        objects.insert(key, obj);
    }
}

fn parse_object_at(data: &[u8], offset: usize) -> Option<Object> {
    let mut lexer = Lexer::new(data);
    lexer.set_position(offset);
    let mut scanner = Scanner::new(lexer);
    let objects = HashMap::new();
    scanner.parse_object(&objects)
}

fn decode_stream_data(dict: &HashMap<String, Object>, data: &[u8]) -> Vec<u8> {
    let is_flate = match dict.get("Filter") {
        Some(Object::Name(name)) => name == "FlateDecode",
        Some(Object::Array(items)) => {
            matches!(items.first(), Some(Object::Name(name)) if name == "FlateDecode")
        }
        _ => false,
    };
    if is_flate {
        flate_decode(data)
    } else {
        data.to_vec()
    }
}

fn flate_decode(data: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    let _ = decoder.read_to_end(&mut out);
    out
}
