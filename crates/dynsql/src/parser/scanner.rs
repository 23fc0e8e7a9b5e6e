//! Low-level markup scanning shared by the template and mapper parsers.

use crate::error::DynSqlError;

/// An opening tag such as `<foreach collection="ids" item="id">`.
#[derive(Debug, Clone)]
pub(crate) struct Tag {
    pub name: String,
    pub attrs: Vec<Attr>,
    pub self_closing: bool,
    /// Byte offset of the `<`.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Attr {
    pub name: String,
    pub value: String,
    /// Byte offset of the first character of the value.
    pub offset: usize,
    /// Source offsets of positions in the decoded `value`.
    pub offsets: OffsetMap,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

/// A cursor over template source text.
pub(crate) struct Cursor<'s> {
    src: &'s str,
    pos: usize,
    template: String,
}

impl<'s> Cursor<'s> {
    pub fn new(template: impl Into<String>, src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            template: template.into(),
        }
    }

    pub fn src(&self) -> &'s str {
        self.src
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
    }

    pub fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn error_at(&self, offset: usize, message: impl Into<String>) -> DynSqlError {
        DynSqlError::syntax(self.template.clone(), self.src, offset, message)
    }

    pub fn error(&self, message: impl Into<String>) -> DynSqlError {
        self.error_at(self.pos, message)
    }

    pub fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// True when the cursor sits on `<` starting an element, closing tag,
    /// comment or CDATA section. A `<` followed by anything else is text.
    pub fn at_markup(&self) -> bool {
        let mut chars = self.rest().chars();
        if chars.next() != Some('<') {
            return false;
        }
        matches!(chars.next(), Some(c) if c == '/' || c == '!' || c.is_ascii_alphabetic())
    }

    /// Consume text up to the next markup (or end of input).
    pub fn take_text(&mut self) -> (&'s str, usize) {
        let start = self.pos;
        while !self.eof() && !self.at_markup() {
            let step = self.rest().chars().next().map(char::len_utf8).unwrap_or(1);
            self.pos += step;
        }
        (&self.src[start..self.pos], start)
    }

    /// Skip a `<!-- ... -->` comment. The cursor must be on `<!--`.
    pub fn skip_comment(&mut self) -> Result<(), DynSqlError> {
        let start = self.pos;
        match self.rest()[4..].find("-->") {
            Some(end) => {
                self.pos += 4 + end + 3;
                Ok(())
            }
            None => Err(self.error_at(start, "unclosed comment")),
        }
    }

    /// Read a `<![CDATA[ ... ]]>` section, returning its raw content.
    pub fn take_cdata(&mut self) -> Result<(&'s str, usize), DynSqlError> {
        let start = self.pos;
        let body_start = start + "<![CDATA[".len();
        match self.src[body_start..].find("]]>") {
            Some(end) => {
                self.pos = body_start + end + 3;
                Ok((&self.src[body_start..body_start + end], body_start))
            }
            None => Err(self.error_at(start, "unclosed CDATA section")),
        }
    }

    /// Skip a `<?...?>` processing instruction or `<!DOCTYPE ...>` declaration.
    pub fn skip_declaration(&mut self) -> Result<(), DynSqlError> {
        let start = self.pos;
        if self.starts_with("<?") {
            return match self.rest().find("?>") {
                Some(end) => {
                    self.pos += end + 2;
                    Ok(())
                }
                None => Err(self.error_at(start, "unclosed processing instruction")),
            };
        }
        let mut depth = 0usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => {
                    self.pos += i + 1;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(self.error_at(start, "unclosed declaration"))
    }

    fn take_name(&mut self) -> &'s str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Read an opening tag. The cursor must be on `<` followed by a letter.
    pub fn read_tag(&mut self) -> Result<Tag, DynSqlError> {
        let offset = self.pos;
        self.pos += 1;
        let name = self.take_name().to_string();
        let mut attrs: Vec<Attr> = Vec::new();

        loop {
            let before_ws = self.pos;
            self.skip_ws();
            if self.starts_with("/>") {
                self.pos += 2;
                return Ok(Tag {
                    name,
                    attrs,
                    self_closing: true,
                    offset,
                });
            }
            if self.starts_with(">") {
                self.pos += 1;
                return Ok(Tag {
                    name,
                    attrs,
                    self_closing: false,
                    offset,
                });
            }
            if self.eof() {
                return Err(self.error_at(offset, format!("unterminated <{name}> tag")));
            }
            if self.pos == before_ws {
                return Err(self.error(format!("expected whitespace between attributes of <{name}>")));
            }

            let attr_offset = self.pos;
            let attr_name = self.take_name().to_string();
            if attr_name.is_empty() {
                let ch = self.rest().chars().next().unwrap_or(' ');
                return Err(self.error(format!("unexpected '{ch}' in <{name}> tag")));
            }
            self.skip_ws();
            if !self.starts_with("=") {
                return Err(self.error(format!("attribute '{attr_name}' of <{name}> needs a value")));
            }
            self.pos += 1;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error(format!("value of '{attr_name}' must be quoted"))),
            };
            self.pos += 1;
            let value_start = self.pos;
            let Some(len) = self.rest().find(quote) else {
                return Err(self.error_at(value_start - 1, format!("unterminated value of '{attr_name}'")));
            };
            let raw = &self.src[value_start..value_start + len];
            self.pos = value_start + len + 1;

            if attrs.iter().any(|a| a.name == attr_name) {
                return Err(self.error_at(attr_offset, format!("duplicate attribute '{attr_name}' on <{name}>")));
            }
            let (value, offsets) = decode_entities(raw, value_start).map_err(|rel| {
                self.error_at(value_start + rel, "unknown character entity")
            })?;
            attrs.push(Attr {
                name: attr_name,
                value,
                offset: value_start,
                offsets,
            });
        }
    }

    /// Read a closing tag `</name>`, returning its name and offset.
    pub fn read_close_tag(&mut self) -> Result<(&'s str, usize), DynSqlError> {
        let offset = self.pos;
        self.pos += 2;
        let name = self.take_name();
        self.skip_ws();
        if !self.starts_with(">") {
            return Err(self.error_at(offset, format!("malformed closing tag </{name}")));
        }
        self.pos += 1;
        Ok((name, offset))
    }

    /// Skip the content of an element whose opening tag was just read,
    /// including its closing tag. Nested elements are balanced by name.
    pub fn skip_element(&mut self, tag: &Tag) -> Result<(), DynSqlError> {
        if tag.self_closing {
            return Ok(());
        }
        let mut open: Vec<String> = vec![tag.name.clone()];
        while let Some(top) = open.last().cloned() {
            if self.eof() {
                return Err(self.error_at(tag.offset, format!("unclosed <{}>", tag.name)));
            }
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("<![CDATA[") {
                self.take_cdata()?;
            } else if self.starts_with("</") {
                let (name, offset) = self.read_close_tag()?;
                if name != top {
                    return Err(self.error_at(offset, format!("expected </{top}>, found </{name}>")));
                }
                open.pop();
            } else if self.at_markup() && !self.starts_with("<!") {
                let inner = self.read_tag()?;
                if !inner.self_closing {
                    open.push(inner.name);
                }
            } else if self.starts_with("<!") {
                self.skip_declaration()?;
            } else {
                self.take_text();
            }
        }
        Ok(())
    }
}

/// Maps byte offsets in entity-decoded text back to the source it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OffsetMap {
    base: usize,
    /// `(decoded, raw)` offsets just past each entity, relative to `base`.
    shifts: Vec<(usize, usize)>,
}

impl OffsetMap {
    /// Text that was taken from the source unchanged, starting at `base`.
    pub fn verbatim(base: usize) -> Self {
        Self {
            base,
            shifts: Vec::new(),
        }
    }

    /// Source offset of byte `decoded` of the decoded text.
    pub fn source_offset(&self, decoded: usize) -> usize {
        let delta = match self.shifts.partition_point(|&(d, _)| d <= decoded) {
            0 => 0,
            i => {
                let (d, r) = self.shifts[i - 1];
                r - d
            }
        };
        self.base + decoded + delta
    }
}

/// Decode the five predefined XML entities plus numeric character
/// references in `raw`, which starts at source offset `base`. On failure
/// returns the offset of the bad `&` within `raw`.
pub(crate) fn decode_entities(raw: &str, base: usize) -> Result<(String, OffsetMap), usize> {
    let mut offsets = OffsetMap::verbatim(base);
    if !raw.contains('&') {
        return Ok((raw.to_string(), offsets));
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut consumed = 0;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';').filter(|&s| s <= 10) else {
            return Err(consumed + amp);
        };
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                match code.and_then(char::from_u32) {
                    Some(c) => c,
                    None => return Err(consumed + amp),
                }
            }
        };
        out.push(decoded);
        let step = amp + 1 + semi + 1;
        consumed += step;
        offsets.shifts.push((out.len(), consumed));
        rest = &rest[step..];
    }
    out.push_str(rest);
    Ok((out, offsets))
}
