//! `aopacket`: the AO2 network packet codec.
//!
//! AO2 packets are `HEADER#ARG1#ARG2#...#%` records. The `%` delimiter is
//! consumed by the transport layer (`aowire`); this crate parses and formats
//! the remaining `#`-separated token and tunnels the four reserved
//! metacharacters through user-supplied fields.
//!
//! The codec is purely syntactic: it knows nothing about field semantics.

pub mod escape;

pub use escape::{decode, encode};

/// A parsed AO2 packet: a non-empty header plus a list of body arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: String,
    pub body: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    EmptyHeader,
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::EmptyHeader => write!(f, "packet header cannot be empty"),
        }
    }
}

impl std::error::Error for PacketError {}

impl Packet {
    pub fn new(header: impl Into<String>, body: Vec<String>) -> Self {
        Self {
            header: header.into(),
            body,
        }
    }

    /// Parse one record token (the bytes between two `%` delimiters, already
    /// trimmed of surrounding whitespace).
    ///
    /// The final empty segment produced by the trailing `#` of a well-formed
    /// record is not part of the body.
    pub fn parse(data: &str) -> Result<Self, PacketError> {
        let mut parts = data.split('#');
        let header = parts.next().unwrap_or("");
        if header.trim().is_empty() {
            return Err(PacketError::EmptyHeader);
        }
        let mut body: Vec<String> = parts.map(str::to_string).collect();
        if body.last().is_some_and(|s| s.is_empty()) {
            body.pop();
        }
        Ok(Self {
            header: header.to_string(),
            body,
        })
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}#%", self.header)
        } else {
            write!(f, "{}#{}#%", self.header, self.body.join("#"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_body() {
        let p = Packet::parse("MS#chat#-#Phoenix#").unwrap();
        assert_eq!(p.header, "MS");
        assert_eq!(p.body, vec!["chat", "-", "Phoenix"]);
    }

    #[test]
    fn parses_bare_header() {
        let p = Packet::parse("CH#").unwrap();
        assert_eq!(p.header, "CH");
        assert!(p.body.is_empty());

        let p = Packet::parse("askchaa").unwrap();
        assert_eq!(p.header, "askchaa");
        assert!(p.body.is_empty());
    }

    #[test]
    fn keeps_intentionally_empty_arguments() {
        // Only the frame's own trailing separator is dropped; an empty
        // argument in the middle (or second-to-last) survives.
        let p = Packet::parse("CT#name##").unwrap();
        assert_eq!(p.body, vec!["name", ""]);

        let p = Packet::parse("CT##msg#").unwrap();
        assert_eq!(p.body, vec!["", "msg"]);
    }

    #[test]
    fn rejects_blank_header() {
        assert_eq!(Packet::parse("#a#b#"), Err(PacketError::EmptyHeader));
        assert_eq!(Packet::parse("   #a#"), Err(PacketError::EmptyHeader));
        assert_eq!(Packet::parse(""), Err(PacketError::EmptyHeader));
    }

    #[test]
    fn formats_with_trailing_delimiter() {
        let p = Packet::new("ID", vec!["0".into(), "gavel".into(), "0.1.0".into()]);
        assert_eq!(p.to_string(), "ID#0#gavel#0.1.0#%");

        let p = Packet::new("DONE", vec![]);
        assert_eq!(p.to_string(), "DONE#%");
    }

    #[test]
    fn round_trips() {
        for raw in [
            Packet::new("HI", vec!["abcdef".into()]),
            Packet::new("DONE", vec![]),
            Packet::new("CT", vec!["name".into(), "".into()]),
            Packet::new("SC", vec!["Phoenix".into(), "Edgeworth".into()]),
        ] {
            let wire = raw.to_string();
            let token = wire.strip_suffix('%').unwrap();
            assert_eq!(Packet::parse(token).unwrap(), raw);
        }
    }
}
