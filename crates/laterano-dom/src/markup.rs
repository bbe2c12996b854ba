//! Lenient HTML-subset parser and serializer.
//!
//! Parsing never fails: stray closing tags are dropped, unclosed elements are
//! closed at end of input, and anything that does not look like a tag is text.

use crate::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

impl Document {
    /// Parses `markup` into a new detached fragment.
    pub fn parse_fragment(&mut self, markup: &str) -> NodeId {
        let fragment = self.create_fragment();
        Parser::new(markup).run(self, fragment);
        fragment
    }

    /// Parses a component template. A single top-level element is returned
    /// as-is; anything else is wrapped in a `div`.
    pub fn parse_template(&mut self, markup: &str) -> NodeId {
        let fragment = self.parse_fragment(markup);
        let children = self.children(fragment).to_vec();
        let significant: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| !matches!(self.kind(*c), Some(NodeKind::Text(t)) if t.trim().is_empty()))
            .collect();

        let root = match significant.as_slice() {
            [only] if self.is_element(*only) => {
                self.detach(*only);
                *only
            }
            _ => {
                let div = self.create_element("div");
                for c in children {
                    self.append_child(div, c);
                }
                div
            }
        };
        self.remove_subtree(fragment);
        root
    }

    /// Replaces all children of `id` with parsed `markup`.
    pub fn set_inner_markup(&mut self, id: NodeId, markup: &str) {
        self.clear_children(id);
        Parser::new(markup).run(self, id);
    }

    pub fn outer_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for c in self.children(id) {
            self.write_markup(*c, &mut out);
        }
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Fragment) => {
                for c in self.children(id) {
                    self.write_markup(*c, out);
                }
            }
            Some(NodeKind::Element { tag, attrs, .. }) => {
                out.push('<');
                out.push_str(tag);
                for a in attrs {
                    out.push(' ');
                    out.push_str(&a.name);
                    out.push_str("=\"");
                    out.push_str(&escape(&a.value, true));
                    out.push('"');
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                for c in self.children(id) {
                    match self.kind(*c) {
                        Some(NodeKind::Text(t)) if is_raw_text(tag) => out.push_str(t),
                        _ => self.write_markup(*c, out),
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Some(NodeKind::Text(t)) => out.push_str(&escape(t, false)),
            Some(NodeKind::Comment(c)) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            None => {}
        }
    }
}

fn escape(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|end| *end <= 10).and_then(|end| {
            let name = &tail[1..end];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => numeric_entity(name),
            };
            ch.map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn numeric_entity(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(i) => self.pos += i + needle.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn run(mut self, doc: &mut Document, root: NodeId) {
        let mut stack = vec![root];
        let mut text = String::new();

        while let Some(c) = self.peek() {
            let top = *stack.last().unwrap_or(&root);
            if self.rest().starts_with("<!--") {
                flush_text(doc, top, &mut text);
                self.pos += 4;
                let data = match self.rest().find("-->") {
                    Some(i) => &self.rest()[..i],
                    None => self.rest(),
                };
                let comment = doc.create_comment(data);
                doc.append_child(top, comment);
                self.skip_past("-->");
            } else if c == '<' && self.peek_second() == Some('/') {
                flush_text(doc, top, &mut text);
                self.pos += 2;
                let name = self.read_name().to_ascii_lowercase();
                self.skip_past(">");
                if let Some(depth) = stack
                    .iter()
                    .rposition(|n| *n != root && doc.tag(*n) == Some(name.as_str()))
                {
                    stack.truncate(depth);
                }
            } else if c == '<' && self.peek_second() == Some('!') {
                flush_text(doc, top, &mut text);
                self.skip_past(">");
            } else if c == '<' && self.peek_second().is_some_and(|c| c.is_ascii_alphabetic()) {
                flush_text(doc, top, &mut text);
                self.bump();
                let (el, tag, self_closing) = self.read_start_tag(doc);
                doc.append_child(top, el);
                if is_raw_text(&tag) {
                    let close = format!("</{tag}");
                    let body = match self.rest().to_ascii_lowercase().find(&close) {
                        Some(i) => &self.rest()[..i],
                        None => self.rest(),
                    };
                    if !body.is_empty() {
                        let t = doc.create_text(body);
                        doc.append_child(el, t);
                    }
                    self.pos += body.len();
                    self.skip_past(">");
                } else if !self_closing && !is_void(&tag) {
                    stack.push(el);
                }
            } else {
                text.push(c);
                self.bump();
            }
        }
        let top = *stack.last().unwrap_or(&root);
        flush_text(doc, top, &mut text);
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '>' || c == '=' || (c == '/' && self.peek_second() == Some('>')) {
                break;
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn read_start_tag(&mut self, doc: &mut Document) -> (NodeId, String, bool) {
        let tag = self.read_name().to_ascii_lowercase();
        let el = doc.create_element(tag.as_str());
        let mut self_closing = false;

        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') if self.peek_second() == Some('>') => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                _ => {}
            }

            let name = self.read_name().to_ascii_lowercase();
            if name.is_empty() {
                // Lone `/` or `=`; skip it rather than loop forever.
                self.bump();
                continue;
            }
            self.skip_ws();
            let value = if self.peek() == Some('=') {
                self.bump();
                self.skip_ws();
                decode_entities(self.read_attr_value())
            } else {
                String::new()
            };
            if !doc.has_attribute(el, &name) {
                doc.set_attribute(el, &name, value);
            }
        }
        (el, tag, self_closing)
    }

    fn read_attr_value(&mut self) -> &'a str {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                let end = self.rest().find(q).map_or(self.src.len(), |i| start + i);
                self.pos = (end + 1).min(self.src.len());
                &self.src[start..end]
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !c.is_whitespace() && c != '>') {
                    self.bump();
                }
                &self.src[start..self.pos]
            }
        }
    }
}

fn flush_text(doc: &mut Document, parent: NodeId, text: &mut String) {
    if text.is_empty() {
        return;
    }
    let node = doc.create_text(decode_entities(text));
    doc.append_child(parent, node);
    text.clear();
}
