//! Streaming Markup Tokenizer
//!
//! Single pass over a dump chunk, yielding one tag at a time without
//! building a document tree. Text content is skipped; only element
//! structure and attributes matter to the graph builder.
//!
//! Supported subset: start/end/self-closing tags, single or double
//! quoted attributes, predefined entities and numeric character
//! references, comments, processing instructions and declarations
//! (the last three are skipped).

use std::borrow::Cow;

use thiserror::Error;

/// Malformed markup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct SyntaxError {
    /// 1-based line where the offending tag starts
    pub line: usize,
    pub reason: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

/// Attributes of a start tag, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes<'a> {
    items: Vec<(&'a str, Cow<'a, str>)>,
}

impl<'a> Attributes<'a> {
    /// Value of the first attribute with this name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(n, v)| (*n, v.as_ref()))
    }
}

/// A single tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Start {
        name: &'a str,
        attrs: Attributes<'a>,
        self_closing: bool,
    },
    End {
        name: &'a str,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENIZER
// ═══════════════════════════════════════════════════════════════════════════════

/// Pull tokenizer over borrowed text
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    newlines: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            newlines: 0,
        }
    }

    /// Newlines consumed so far
    #[inline]
    pub fn lines_consumed(&self) -> usize {
        self.newlines
    }

    /// 1-based line of the cursor
    #[inline]
    pub fn line(&self) -> usize {
        self.newlines + 1
    }

    /// Next tag, or `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, SyntaxError> {
        let src = self.src;
        loop {
            let rest = &src[self.pos..];
            let Some(offset) = rest.find('<') else {
                self.advance(rest.len());
                return Ok(None);
            };
            self.advance(offset);

            let rest = &src[self.pos..];
            if rest.starts_with("<!--") {
                self.skip_past("-->", "unterminated comment")?;
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "unterminated processing instruction")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">", "unterminated declaration")?;
            } else if rest.starts_with("</") {
                return self.end_tag().map(Some);
            } else {
                return self.start_tag().map(Some);
            }
        }
    }

    fn advance(&mut self, len: usize) {
        let end = self.pos + len;
        self.newlines += count_newlines(&self.src[self.pos..end]);
        self.pos = end;
    }

    fn skip_past(&mut self, terminator: &str, reason: &str) -> Result<(), SyntaxError> {
        match self.src[self.pos..].find(terminator) {
            Some(i) => {
                self.advance(i + terminator.len());
                Ok(())
            }
            None => Err(self.error(reason)),
        }
    }

    fn error(&self, reason: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line(),
            reason: reason.into(),
        }
    }

    fn end_tag(&mut self) -> Result<Token<'a>, SyntaxError> {
        let src = self.src;
        let rest = &src[self.pos..];
        let close = rest
            .find('>')
            .ok_or_else(|| self.error("unterminated end tag"))?;
        let name = rest[2..close].trim();
        if name.is_empty() {
            return Err(self.error("empty end tag"));
        }
        self.advance(close + 1);
        Ok(Token::End { name })
    }

    fn start_tag(&mut self) -> Result<Token<'a>, SyntaxError> {
        let src = self.src;
        let bytes = src.as_bytes();

        let mut i = self.pos + 1;
        let name_start = i;
        while i < bytes.len() && !is_name_end(bytes[i]) {
            i += 1;
        }
        let name = &src[name_start..i];
        if name.is_empty() {
            return Err(self.error("missing tag name"));
        }

        let mut items = Vec::new();
        loop {
            i = skip_whitespace(bytes, i);
            match bytes.get(i) {
                None => return Err(self.error(format!("unterminated tag <{name}>"))),
                Some(b'>') => {
                    self.advance(i + 1 - self.pos);
                    return Ok(Token::Start {
                        name,
                        attrs: Attributes { items },
                        self_closing: false,
                    });
                }
                Some(b'/') => {
                    if bytes.get(i + 1) != Some(&b'>') {
                        return Err(self.error(format!("stray '/' in tag <{name}>")));
                    }
                    self.advance(i + 2 - self.pos);
                    return Ok(Token::Start {
                        name,
                        attrs: Attributes { items },
                        self_closing: true,
                    });
                }
                Some(_) => {
                    let attr_start = i;
                    while i < bytes.len() && !is_name_end(bytes[i]) && bytes[i] != b'=' {
                        i += 1;
                    }
                    let attr_name = &src[attr_start..i];
                    if attr_name.is_empty() {
                        return Err(self.error(format!("missing attribute name in <{name}>")));
                    }

                    i = skip_whitespace(bytes, i);
                    if bytes.get(i) != Some(&b'=') {
                        return Err(self.error(format!("attribute {attr_name} has no value")));
                    }
                    i = skip_whitespace(bytes, i + 1);

                    let quote = match bytes.get(i) {
                        Some(&q) if q == b'"' || q == b'\'' => q,
                        _ => {
                            return Err(self.error(format!("unquoted value for {attr_name}")));
                        }
                    };
                    let value_start = i + 1;
                    let Some(len) = bytes[value_start..].iter().position(|&b| b == quote) else {
                        return Err(self.error(format!("unterminated value for {attr_name}")));
                    };
                    let raw = &src[value_start..value_start + len];
                    i = value_start + len + 1;

                    let value = unescape(raw).map_err(|reason| self.error(reason))?;
                    items.push((attr_name, value));
                }
            }
        }
    }
}

#[inline]
fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

#[inline]
fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Count `\n` bytes in a slice
#[inline]
pub fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// Resolve entity and character references in an attribute value
pub fn unescape(raw: &str) -> Result<Cow<'_, str>, String> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let semi = tail
            .find(';')
            .ok_or_else(|| format!("unterminated entity in {raw:?}"))?;
        let entity = &tail[..semi];
        let ch = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => decode_char_ref(entity).ok_or_else(|| format!("unknown entity &{entity};"))?,
        };
        out.push(ch);
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn decode_char_ref(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(src: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
        let mut tokenizer = Tokenizer::new(src);
        let mut tokens = Vec::new();
        while let Some(token) = tokenizer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[test]
    fn test_start_end_and_self_closing() {
        let tokens = collect(r#"<object name="CAkSound"><field name="ulID" value="5"/></object>"#)
            .unwrap();
        assert_eq!(tokens.len(), 3);

        match &tokens[0] {
            Token::Start { name, attrs, self_closing } => {
                assert_eq!(*name, "object");
                assert_eq!(attrs.get("name"), Some("CAkSound"));
                assert!(!self_closing);
            }
            other => panic!("unexpected token {other:?}"),
        }
        match &tokens[1] {
            Token::Start { name, attrs, self_closing } => {
                assert_eq!(*name, "field");
                assert_eq!(attrs.get("value"), Some("5"));
                assert_eq!(attrs.len(), 2);
                assert!(*self_closing);
            }
            other => panic!("unexpected token {other:?}"),
        }
        assert_eq!(tokens[2], Token::End { name: "object" });
    }

    #[test]
    fn test_skips_prolog_comments_and_text() {
        let src = "<?xml version=\"1.0\"?>\n<!DOCTYPE base>\n<!-- a <comment> -->\n<base>text</base>";
        let tokens = collect(src).unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(matches!(tokens[0], Token::Start { name: "base", .. }));
        assert_eq!(tokens[1], Token::End { name: "base" });
    }

    #[test]
    fn test_single_quotes_and_spacing() {
        let tokens = collect("<field name = 'x'\n value='1' />").unwrap();
        match &tokens[0] {
            Token::Start { attrs, self_closing, .. } => {
                assert_eq!(attrs.get("name"), Some("x"));
                assert_eq!(attrs.get("value"), Some("1"));
                assert!(*self_closing);
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn test_entities() {
        assert_eq!(unescape("a &lt;b&gt; &amp; &quot;c&quot;").unwrap(), "a <b> & \"c\"");
        assert_eq!(unescape("&#65;&#x42;").unwrap(), "AB");
        assert!(matches!(unescape("plain").unwrap(), Cow::Borrowed(_)));
        assert!(unescape("&bogus;").is_err());
        assert!(unescape("a & b").is_err());
    }

    #[test]
    fn test_line_tracking() {
        let mut tokenizer = Tokenizer::new("<a>\n\n<b/>\n</a>\n");
        tokenizer.next_token().unwrap();
        assert_eq!(tokenizer.line(), 1);
        tokenizer.next_token().unwrap();
        assert_eq!(tokenizer.line(), 3);
        tokenizer.next_token().unwrap();
        assert!(tokenizer.next_token().unwrap().is_none());
        assert_eq!(tokenizer.lines_consumed(), 4);
    }

    #[test]
    fn test_truncated_tag_reports_line() {
        let err = collect("<a>\n<field name=\"x\" value=\"1").unwrap_err();
        assert_eq!(err.line, 2);

        let err = collect("<a>\n\n<field name=x/>").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.reason.contains("unquoted"));
    }

    #[test]
    fn test_unterminated_comment() {
        assert!(collect("<!-- never closed").is_err());
    }
}
