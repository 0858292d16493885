//! Controller variable protocol
//!
//! Requests are single self-closing XML elements:
//! - `<ShowVar Name="n"/>` reads a variable
//! - `<SetVar Name="n" Value="v"/>` writes one
//!
//! A reply is one XML document. Its root tag and root attributes are the
//! result; the tag name is stored under the [`TAG_KEY`] key. Replies arrive
//! on a byte stream with no length prefix, so they are framed by the close of
//! the root element.

use fourcell_core::{CellError, Result};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;

/// Key holding the root tag name in a [`Reply`]
pub const TAG_KEY: &str = "Tag";

/// Read request for `name`
pub fn show_var(name: &str) -> String {
    format!(r#"<ShowVar Name="{}"/>"#, escape(name))
}

/// Write request setting `name` to `value`
pub fn set_var(name: &str, value: &str) -> String {
    format!(r#"<SetVar Name="{}" Value="{}"/>"#, escape(name), escape(value))
}

/// Root tag and attributes of one reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    fields: BTreeMap<String, String>,
}

impl Reply {
    pub fn tag(&self) -> &str {
        self.get(TAG_KEY).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// The `Value` attribute
    pub fn value(&self) -> Option<&str> {
        self.get("Value")
    }

    /// `Value` as an integer, `default` when absent or not numeric
    pub fn int_value(&self, default: i64) -> i64 {
        self.value()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// All fields, tag included
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn from_root(root: &BytesStart<'_>) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for attr in root.attributes() {
            let attr = attr.map_err(|e| CellError::ProtocolError(format!("bad attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| CellError::ProtocolError(format!("bad attribute value: {}", e)))?
                .into_owned();
            fields.insert(key, value);
        }
        fields.insert(
            TAG_KEY.to_string(),
            String::from_utf8_lossy(root.name().as_ref()).into_owned(),
        );
        Ok(Self { fields })
    }
}

/// Accumulates stream bytes and cuts them into whole replies
#[derive(Debug)]
pub struct ReplyFramer {
    buf: Vec<u8>,
    max_bytes: usize,
}

impl ReplyFramer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_bytes,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet consumed
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Take the next complete reply; `None` while more bytes are needed.
    ///
    /// Bytes after the reply's root element stay buffered.
    pub fn next_reply(&mut self) -> Result<Option<Reply>> {
        let (reply, consumed) = match self.scan()? {
            Some(found) => found,
            None if self.buf.len() >= self.max_bytes => {
                return Err(CellError::ProtocolError(format!(
                    "no complete reply within {} bytes",
                    self.max_bytes
                )));
            }
            None => return Ok(None),
        };
        if consumed > self.max_bytes {
            return Err(CellError::ProtocolError(format!(
                "reply of {} bytes exceeds {} bytes",
                consumed, self.max_bytes
            )));
        }
        self.buf.drain(..consumed);
        Ok(Some(reply))
    }

    fn scan(&self) -> Result<Option<(Reply, usize)>> {
        let mut reader = Reader::from_reader(self.buf.as_slice());
        let mut depth = 0usize;
        let mut root: Option<Reply> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(quick_xml::Error::Syntax(_)) => return Ok(None), // truncated
                Err(e) => return Err(CellError::ProtocolError(format!("malformed reply: {}", e))),
            };

            match event {
                Event::Empty(ref e) if depth == 0 => {
                    let reply = Reply::from_root(e)?;
                    return Ok(Some((reply, reader.buffer_position() as usize)));
                }
                Event::Start(ref e) => {
                    if depth == 0 {
                        root = Some(Reply::from_root(e)?);
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(reply) = root.take() {
                            return Ok(Some((reply, reader.buffer_position() as usize)));
                        }
                    }
                }
                Event::Text(ref t) if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) => {
                    return Err(CellError::ProtocolError(format!(
                        "text outside reply: {}",
                        String::from_utf8_lossy(t)
                    )));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> ReplyFramer {
        ReplyFramer::new(4096)
    }

    #[test]
    fn test_requests_escape_values() {
        assert_eq!(show_var("SYNC_VAR"), r#"<ShowVar Name="SYNC_VAR"/>"#);
        assert_eq!(
            set_var("MSG", r#"a<b & "c""#),
            r#"<SetVar Name="MSG" Value="a&lt;b &amp; &quot;c&quot;"/>"#
        );
    }

    #[test]
    fn test_empty_root_reply() {
        let mut f = framer();
        f.push(br#"<ShowVar Name="SYNC_VAR" Value="3"/>"#);
        let reply = f.next_reply().unwrap().unwrap();
        assert_eq!(reply.tag(), "ShowVar");
        assert_eq!(reply.get("Name"), Some("SYNC_VAR"));
        assert_eq!(reply.int_value(0), 3);
        assert_eq!(f.pending(), 0);
    }

    #[test]
    fn test_reply_split_across_reads() {
        let mut f = framer();
        f.push(br#"<?xml version="1.0"?><Robot Val"#);
        assert_eq!(f.next_reply().unwrap(), None);
        f.push(br#"ue="-1"><Data A="1"/>"#);
        assert_eq!(f.next_reply().unwrap(), None);
        f.push(b"</Robot>");

        let reply = f.next_reply().unwrap().unwrap();
        assert_eq!(reply.tag(), "Robot");
        assert_eq!(reply.int_value(0), -1);
        // attributes of nested elements are not part of the result
        assert_eq!(reply.get("A"), None);
    }

    #[test]
    fn test_trailing_bytes_kept() {
        let mut f = framer();
        f.push(br#"<A Value="1"/><B Value="2"/><C"#);
        assert_eq!(f.next_reply().unwrap().unwrap().tag(), "A");
        assert_eq!(f.next_reply().unwrap().unwrap().tag(), "B");
        assert_eq!(f.next_reply().unwrap(), None);
        f.push(b"/>");
        assert_eq!(f.next_reply().unwrap().unwrap().tag(), "C");
    }

    #[test]
    fn test_unescapes_attributes() {
        let mut f = framer();
        f.push(br#"<ShowVar Value="a &amp; b"/>"#);
        assert_eq!(f.next_reply().unwrap().unwrap().value(), Some("a & b"));
    }

    #[test]
    fn test_size_bound() {
        let mut f = ReplyFramer::new(32);
        f.push(b"<Robot>");
        f.push(&[b' '; 40]);
        assert!(matches!(f.next_reply(), Err(CellError::ProtocolError(_))));
    }

    #[test]
    fn test_malformed_reply() {
        let mut f = framer();
        f.push(b"<A></B>");
        assert!(matches!(f.next_reply(), Err(CellError::ProtocolError(_))));

        let mut f = framer();
        f.push(b"garbage <A/>");
        assert!(matches!(f.next_reply(), Err(CellError::ProtocolError(_))));
    }

    #[test]
    fn test_missing_value_defaults() {
        let mut f = framer();
        f.push(br#"<ShowVar Name="CELL_SEL"/>"#);
        assert_eq!(f.next_reply().unwrap().unwrap().int_value(-1), -1);
    }
}
