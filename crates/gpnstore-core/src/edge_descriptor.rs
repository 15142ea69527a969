//! Shorthand edge descriptor parsing (§6, input only).
//!
//! A single-line shorthand for describing an edge to add between two node
//! files, of the form:
//!
//! ```text
//! edge_name: node_file1 <--> node_file2
//! edge_name: node_file1 <--> node_file2 : [selector]
//! ```
//!
//! This is a pure string-to-struct parser; it does not touch the
//! filesystem or a node's schema. Resolving `node_file1`/`node_file2` into
//! actual node files is the graph-of-nodes container's job, not this
//! crate's.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{NodeError, Result};

/// The five named parts of a parsed shorthand descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDescriptor {
    pub edge_name: String,
    pub node_file1: String,
    pub direction: EdgeDirection,
    pub node_file2: String,
    /// The bracketed attribute selector, including its brackets, if present.
    pub selector: Option<String>,
}

/// One of the six directions the shorthand grammar accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// `->`: one-to-one, left-to-right.
    Right,
    /// `-->`: one-to-many, left-to-right.
    RightWide,
    /// `<-`: one-to-one, right-to-left.
    Left,
    /// `<--`: one-to-many, right-to-left.
    LeftWide,
    /// `<->`: one-to-one, both directions.
    Both,
    /// `<-->`: one-to-many, both directions.
    BothWide,
}

impl EdgeDirection {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "->" => EdgeDirection::Right,
            "-->" => EdgeDirection::RightWide,
            "<-" => EdgeDirection::Left,
            "<--" => EdgeDirection::LeftWide,
            "<->" => EdgeDirection::Both,
            "<-->" => EdgeDirection::BothWide,
            _ => return None,
        })
    }

    /// Whether this direction implies an edge should also be added from
    /// `node_file2` back to `node_file1`.
    pub fn is_bidirectional(self) -> bool {
        matches!(self, EdgeDirection::Both | EdgeDirection::BothWide)
    }

    pub fn as_token(self) -> &'static str {
        match self {
            EdgeDirection::Right => "->",
            EdgeDirection::RightWide => "-->",
            EdgeDirection::Left => "<-",
            EdgeDirection::LeftWide => "<--",
            EdgeDirection::Both => "<->",
            EdgeDirection::BothWide => "<-->",
        }
    }
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?x)
            ^\s*
            (?P<edge_name>[^<>:"/\\|?*]+?)\s*
            :\s*
            (?P<node_file1>[^<>:"/\\|?*]+?)\s+
            (?P<direction>->|-->|<->|<-->|<-|<--)\s+
            (?P<node_file2>[^<>:"/\\|?*]+?)\s*
            (?:
                :\s*
                (?P<selector>\[.*\])?
            )?
            \s*$
            "#,
        )
        .expect("shorthand edge descriptor pattern is a compile-time constant")
    })
}

/// Parse a shorthand edge descriptor. Returns `InvalidDescriptor` if
/// `string` does not match the grammar described in the module docs.
pub fn parse_edge_descriptor(string: &str) -> Result<EdgeDescriptor> {
    let captures = pattern()
        .captures(string)
        .ok_or_else(|| NodeError::validation(format!("invalid edge descriptor: {string:?}")))?;

    let edge_name = captures["edge_name"].trim().to_string();
    let node_file1 = captures["node_file1"].trim().to_string();
    let node_file2 = captures["node_file2"].trim().to_string();
    let direction = EdgeDirection::from_token(&captures["direction"])
        .ok_or_else(|| NodeError::validation(format!("invalid edge descriptor: {string:?}")))?;
    let selector = captures.name("selector").map(|m| m.as_str().to_string());

    Ok(EdgeDescriptor {
        edge_name,
        node_file1,
        direction,
        node_file2,
        selector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_descriptor() {
        let parsed = parse_edge_descriptor("population: mynode1 <--> mynode2").unwrap();
        assert_eq!(
            parsed,
            EdgeDescriptor {
                edge_name: "population".to_string(),
                node_file1: "mynode1".to_string(),
                direction: EdgeDirection::BothWide,
                node_file2: "mynode2".to_string(),
                selector: None,
            }
        );
    }

    #[test]
    fn parses_descriptor_with_selector() {
        let parsed =
            parse_edge_descriptor(r#"population: mynode1 <--> mynode2 : [age="20to34"]"#).unwrap();
        assert_eq!(parsed.selector.as_deref(), Some(r#"[age="20to34"]"#));
        assert_eq!(parsed.direction.as_token(), "<-->");
    }

    #[test]
    fn accepts_every_direction_token() {
        for token in ["->", "-->", "<-", "<--", "<->", "<-->"] {
            let descriptor = format!("e: a {token} b");
            let parsed = parse_edge_descriptor(&descriptor).unwrap();
            assert_eq!(parsed.direction.as_token(), token);
        }
    }

    #[test]
    fn rejects_malformed_descriptor() {
        assert!(parse_edge_descriptor("not a descriptor at all").is_err());
        assert!(parse_edge_descriptor("name: onlyonefile").is_err());
    }

    #[test]
    fn bidirectional_tokens_report_is_bidirectional() {
        assert!(EdgeDirection::Both.is_bidirectional());
        assert!(EdgeDirection::BothWide.is_bidirectional());
        assert!(!EdgeDirection::Right.is_bidirectional());
    }
}
