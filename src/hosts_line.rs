//! Single hosts-file line parsing.

use std::fmt;
use std::net::IpAddr;

use crate::error::LineParseError;

/// Marker starting a comment, either as a whole line or trailing a mapping.
pub const COMMENT_CHAR: char = '#';

/// One physical line of a hosts file.
///
/// An unmodified line writes back exactly the bytes it was read from, so
/// unrelated lines round-trip byte-for-byte. The parsed fields are a view
/// over `raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsLine {
    /// Line text without the trailing newline. For a line that is not
    /// valid UTF-8 this is a lossy decode; the file bytes are kept
    /// separately and written back unchanged.
    pub raw: String,

    /// Parsed address, present only for well-formed mapping lines.
    pub address: Option<IpAddr>,

    /// Names following the address, in file order. A trailing `# comment`
    /// is not part of the list.
    pub hostnames: Vec<String>,

    /// Set when the first field of a non-comment line is not an address.
    pub parse_error: Option<LineParseError>,

    original: Option<Vec<u8>>,
}

impl HostsLine {
    /// Parses one line. Never fails: malformed lines carry
    /// [`parse_error`](Self::parse_error) instead.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut line = Self {
            raw,
            address: None,
            hostnames: Vec::new(),
            parse_error: None,
            original: None,
        };
        if line.is_comment() {
            return line;
        }

        let mut fields = line
            .raw
            .split_whitespace()
            .take_while(|f| !f.starts_with(COMMENT_CHAR));
        let Some(first) = fields.next() else {
            return line;
        };
        let hostnames = fields.map(str::to_string).collect();

        match first.parse::<IpAddr>() {
            Ok(address) => line.address = Some(address),
            Err(source) => {
                line.parse_error = Some(LineParseError {
                    raw: line.raw.clone(),
                    source,
                });
            }
        }
        line.hostnames = hostnames;
        line
    }

    /// Parses one line read from disk, without its `\n` or `\r\n`.
    ///
    /// Bytes that are not UTF-8 are decoded lossily for parsing, and the
    /// exact input is what [`as_bytes`](Self::as_bytes) returns.
    #[must_use]
    pub fn parse_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::parse(text),
            Err(_) => {
                let mut line = Self::parse(String::from_utf8_lossy(bytes));
                line.original = Some(bytes.to_vec());
                line
            }
        }
    }

    /// Builds an `<address> <name> <name>...` line.
    #[must_use]
    pub fn from_mapping<S: AsRef<str>>(address: IpAddr, hostnames: &[S]) -> Self {
        let mut raw = address.to_string();
        for name in hostnames {
            raw.push(' ');
            raw.push_str(name.as_ref());
        }
        Self::parse(raw)
    }

    /// Bytes written back to the file for this line.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.original.as_deref().unwrap_or(self.raw.as_bytes())
    }

    /// Trailing `# ...` text of a mapping line, `#` included.
    #[must_use]
    pub fn trailing_comment(&self) -> Option<&str> {
        if self.is_comment() {
            return None;
        }
        let mut prev_space = true;
        for (i, c) in self.raw.char_indices() {
            if c == COMMENT_CHAR && prev_space {
                return Some(&self.raw[i..]);
            }
            prev_space = c.is_whitespace();
        }
        None
    }

    /// `true` if the trimmed line starts with `#`.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.raw.trim_start().starts_with(COMMENT_CHAR)
    }

    /// `true` for empty or whitespace-only lines.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// `true` if this line maps `address` and can take part in lookups.
    #[must_use]
    pub fn maps(&self, address: IpAddr) -> bool {
        self.address == Some(address)
    }
}

impl fmt::Display for HostsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
