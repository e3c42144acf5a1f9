//! A parser library for the RTS AI text format.
//!
//! The format is loosely based on braces `{}` and `key = value` assignments. It is
//! used for AI content definitions (unit types, AI personalities), engine
//! configuration and the persisted AI save block. Lists may hold bare values
//! (`{ 1 2 3 }`) or anonymous blocks (`{ { need = worker } { sleep = 5 } }`).
//!
//! [`de`] maps a parse tree onto serde types and [`ser`] writes serde types back
//! out in the same format.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use encoding_rs::UTF_8;
use encoding_rs_io::DecodeReaderBytesBuilder;

pub mod de;
pub mod error;
pub mod ser;

pub use de::{from_node, from_str};
pub use error::{Error, ParseError};
pub use ser::to_string;

/// Represents a token scanned from a text file.
#[derive(Debug, Clone, PartialEq)]
pub enum RtsTxtToken {
    /// An alphanumeric identifier (keys, values).
    Identifier(String),
    /// A quoted string value.
    StringValue(String),
    /// A floating point number.
    FloatValue(f64),
    /// An integer number.
    IntValue(i64),
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `=`
    Equals,
}

impl RtsTxtToken {
    fn describe(&self) -> String {
        match self {
            RtsTxtToken::Identifier(s) => s.clone(),
            RtsTxtToken::StringValue(s) => format!("\"{}\"", s),
            RtsTxtToken::FloatValue(f) => f.to_string(),
            RtsTxtToken::IntValue(i) => i.to_string(),
            RtsTxtToken::LeftBrace => "{".to_string(),
            RtsTxtToken::RightBrace => "}".to_string(),
            RtsTxtToken::Equals => "=".to_string(),
        }
    }
}

/// Represents an item in the Abstract Syntax Tree (AST).
#[derive(Debug, Clone, PartialEq)]
pub enum RtsTxtAstItem {
    /// An empty placeholder node.
    Brace,
    /// A `key = value` assignment. Children are `[key, value]`.
    Assignment,
    /// A list of assignments, values or nested blocks.
    AssignmentList,
    /// An identifier value.
    Identifier(String),
    /// A string value.
    StringValue(String),
    /// A float value.
    FloatValue(f64),
    /// An integer value.
    IntValue(i64),
}

/// A node in the parse tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RtsTxtParseNode {
    /// Child nodes (for lists or assignments).
    pub children: Vec<RtsTxtParseNode>,
    /// The type of item and its data.
    pub entry: RtsTxtAstItem,
}

impl RtsTxtParseNode {
    /// Creates a new empty node with `Brace` type.
    pub fn new() -> RtsTxtParseNode {
        RtsTxtParseNode {
            children: Vec::new(),
            entry: RtsTxtAstItem::Brace,
        }
    }

    fn with_entry(entry: RtsTxtAstItem) -> RtsTxtParseNode {
        RtsTxtParseNode {
            children: Vec::new(),
            entry,
        }
    }

    /// Counts the total number of nodes in this subtree (inclusive).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Returns the value assigned to `key` in this list, if any.
    pub fn get(&self, key: &str) -> Option<&RtsTxtParseNode> {
        self.children.iter().find_map(|child| {
            if child.entry != RtsTxtAstItem::Assignment {
                return None;
            }
            match child.children.first().map(|k| &k.entry) {
                Some(RtsTxtAstItem::Identifier(k)) | Some(RtsTxtAstItem::StringValue(k))
                    if k == key =>
                {
                    child.children.get(1)
                }
                _ => None,
            }
        })
    }
}

impl Default for RtsTxtParseNode {
    fn default() -> Self {
        Self::new()
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '=' || c == '{' || c == '}' || c == '#' || c == '"'
}

fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

/// Splits text into tokens. Comments (`#` to end of line) are dropped.
pub fn tokenize(contents: &str) -> Vec<RtsTxtToken> {
    let mut tokens: Vec<RtsTxtToken> = Vec::new();
    let mut chars = contents.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while let Some(&nc) = chars.peek() {
                    if nc == '\n' || nc == '\r' {
                        break;
                    }
                    chars.next();
                }
            }
            '{' => {
                tokens.push(RtsTxtToken::LeftBrace);
                chars.next();
            }
            '}' => {
                tokens.push(RtsTxtToken::RightBrace);
                chars.next();
            }
            '=' => {
                tokens.push(RtsTxtToken::Equals);
                chars.next();
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                for nc in chars.by_ref() {
                    if nc == '"' {
                        break;
                    }
                    s.push(nc);
                }
                tokens.push(RtsTxtToken::StringValue(s));
            }
            _ => {
                let mut s = String::new();
                while let Some(&nc) = chars.peek() {
                    if is_delimiter(nc) {
                        break;
                    }
                    s.push(nc);
                    chars.next();
                }

                // "inf" and "nan" parse as floats in Rust; only treat words that
                // start like a number as numbers so identifiers survive.
                if looks_numeric(&s) {
                    if let Ok(i) = s.parse::<i64>() {
                        tokens.push(RtsTxtToken::IntValue(i));
                        continue;
                    }
                    if let Ok(f) = s.parse::<f64>() {
                        tokens.push(RtsTxtToken::FloatValue(f));
                        continue;
                    }
                }
                tokens.push(RtsTxtToken::Identifier(s));
            }
        }
    }
    tokens
}

fn parse_terminal(
    tokens: &[RtsTxtToken],
    pos: usize,
) -> Result<(RtsTxtParseNode, usize), ParseError> {
    let tok = tokens
        .get(pos)
        .ok_or(ParseError::UnexpectedEof { position: pos })?;
    let entry = match tok {
        RtsTxtToken::Identifier(s) => RtsTxtAstItem::Identifier(s.clone()),
        RtsTxtToken::IntValue(i) => RtsTxtAstItem::IntValue(*i),
        RtsTxtToken::FloatValue(f) => RtsTxtAstItem::FloatValue(*f),
        RtsTxtToken::StringValue(s) => RtsTxtAstItem::StringValue(s.clone()),
        _ => {
            return Err(ParseError::UnexpectedToken {
                position: pos,
                token: tok.describe(),
                expected: "a value".to_string(),
            });
        }
    };
    Ok((RtsTxtParseNode::with_entry(entry), pos + 1))
}

/// Parses list items starting at `pos`. A nested list ends at its matching `}`
/// and returns the position after it; the top level ends at end of input.
fn parse_assignment_list(
    tokens: &[RtsTxtToken],
    pos: usize,
    nested: bool,
) -> Result<(RtsTxtParseNode, usize), ParseError> {
    let mut list = RtsTxtParseNode::with_entry(RtsTxtAstItem::AssignmentList);
    let mut pos = pos;

    loop {
        let Some(tok) = tokens.get(pos) else {
            if nested {
                return Err(ParseError::UnexpectedEof { position: pos });
            }
            return Ok((list, pos));
        };

        match tok {
            RtsTxtToken::RightBrace => {
                if nested {
                    return Ok((list, pos + 1));
                }
                return Err(ParseError::UnexpectedToken {
                    position: pos,
                    token: tok.describe(),
                    expected: "a key or value".to_string(),
                });
            }
            RtsTxtToken::LeftBrace => {
                let (inner, next) = parse_assignment_list(tokens, pos + 1, true)?;
                list.children.push(inner);
                pos = next;
            }
            RtsTxtToken::Equals => {
                return Err(ParseError::InvalidLhs {
                    position: pos,
                    found: tok.describe(),
                });
            }
            _ => {
                let (lhs, next) = parse_terminal(tokens, pos)?;
                if tokens.get(next) != Some(&RtsTxtToken::Equals) {
                    list.children.push(lhs);
                    pos = next;
                    continue;
                }

                let rhs_pos = next + 1;
                let (rhs, after) = match tokens.get(rhs_pos) {
                    None | Some(RtsTxtToken::RightBrace) | Some(RtsTxtToken::Equals) => {
                        return Err(ParseError::MissingRhs { position: rhs_pos });
                    }
                    Some(RtsTxtToken::LeftBrace) => {
                        parse_assignment_list(tokens, rhs_pos + 1, true)?
                    }
                    Some(_) => parse_terminal(tokens, rhs_pos)?,
                };

                let mut assignment = RtsTxtParseNode::with_entry(RtsTxtAstItem::Assignment);
                assignment.children.push(lhs);
                assignment.children.push(rhs);
                list.children.push(assignment);
                pos = after;
            }
        }
    }
}

pub trait RtsTxt {
    /// Reads and tokenizes a file. Invalid UTF-8 is replaced rather than rejected.
    fn open_txt(path: &Path) -> std::io::Result<Vec<RtsTxtToken>> {
        let file = File::open(path)?;
        let mut buf_reader = BufReader::new(
            DecodeReaderBytesBuilder::new()
                .encoding(Some(UTF_8))
                .build(file),
        );
        let mut contents = String::new();
        buf_reader.read_to_string(&mut contents)?;
        Ok(tokenize(&contents))
    }

    fn parse(tokens: Vec<RtsTxtToken>) -> Result<RtsTxtParseNode, ParseError> {
        if tokens.is_empty() {
            return Err(ParseError::EmptyInput);
        }
        let (node, consumed) = parse_assignment_list(&tokens, 0, false)?;
        if consumed != tokens.len() {
            return Err(ParseError::UnconsumedTokens {
                position: consumed,
                remaining: tokens.len() - consumed,
            });
        }
        Ok(node)
    }

    fn parse_str(contents: &str) -> Result<RtsTxtParseNode, ParseError> {
        Self::parse(tokenize(contents))
    }
}

pub struct DefaultRtsTxt {}
impl RtsTxt for DefaultRtsTxt {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent() {
        let r = DefaultRtsTxt::open_txt(Path::new("path/to/nowhere"));
        assert!(r.is_err());
    }

    #[test]
    fn tokenizes_numbers_and_identifiers() {
        let tokens = tokenize("a = -12 b = 1.5 c = unit-worker d = inf # trailing");
        assert_eq!(tokens[2], RtsTxtToken::IntValue(-12));
        assert_eq!(tokens[5], RtsTxtToken::FloatValue(1.5));
        assert_eq!(tokens[8], RtsTxtToken::Identifier("unit-worker".to_string()));
        assert_eq!(tokens[11], RtsTxtToken::Identifier("inf".to_string()));
        assert_eq!(tokens.len(), 12);
    }

    #[test]
    fn parses_anonymous_blocks() {
        let ast = DefaultRtsTxt::parse_str("script = { { need = worker } { sleep = 5 } }")
            .expect("parse");
        let script = ast.get("script").expect("script key");
        assert_eq!(script.children.len(), 2);
        assert!(
            script
                .children
                .iter()
                .all(|c| c.entry == RtsTxtAstItem::AssignmentList)
        );
    }

    #[test]
    fn unbalanced_braces_are_reported() {
        let err = DefaultRtsTxt::parse_str("a = { b = 1").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));

        let err = DefaultRtsTxt::parse_str("a = 1 }").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn missing_rhs_is_reported() {
        let err = DefaultRtsTxt::parse_str("a = }").unwrap_err();
        assert!(matches!(err, ParseError::MissingRhs { .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            DefaultRtsTxt::parse(Vec::new()).unwrap_err(),
            ParseError::EmptyInput
        );
    }
}
