//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt::Write;

use crate::{PortSet, Softwire};

// Type aliases.
pub type ParseResult<T> = Result<T, ParseError>;

// Softwire text syntax errors.
#[derive(Debug, Eq, PartialEq)]
pub enum ParseError {
    UnexpectedEof,
    UnexpectedToken(String),
    UnknownField(String),
    InvalidValue(String, String),
    MissingField(&'static str),
}

// ===== impl Softwire =====

impl Softwire {
    /// Renders the softwire as one native text block, e.g.
    /// `softwire { ipv4 192.0.2.1; psid 7; b4-ipv6 2001:db8::2;
    /// br-address 2001:db8::1; port-set { psid-length 4;
    /// reserved-ports-bit-count 12; } }`.
    pub fn to_config_text(&self) -> String {
        let mut text = String::new();
        write!(
            text,
            "softwire {{ ipv4 {}; psid {}; b4-ipv6 {}; br-address {};",
            self.ipv4, self.psid, self.b4_ipv6, self.br_address
        )
        .unwrap();
        if let Some(port_set) = &self.port_set {
            write!(
                text,
                " port-set {{ psid-length {}; reserved-ports-bit-count {}; }}",
                port_set.psid_length, port_set.shift
            )
            .unwrap();
        }
        text.push_str(" }");
        text
    }
}

// ===== global functions =====

/// Renders a batch of softwires as newline-concatenated text blocks, the
/// payload format of bulk add mutations.
pub fn format_softwires<'a>(
    softwires: impl IntoIterator<Item = &'a Softwire>,
) -> String {
    softwires
        .into_iter()
        .map(Softwire::to_config_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses one or more softwire text blocks.
pub fn parse_softwires(text: &str) -> ParseResult<Vec<Softwire>> {
    let mut parser = Parser::new(text);
    let mut softwires = Vec::new();
    while !parser.at_eof() {
        parser.expect("softwire")?;
        parser.expect("{")?;
        softwires.push(parse_softwire_body(&mut parser)?);
    }
    Ok(softwires)
}

// ===== helper functions =====

fn parse_softwire_body(parser: &mut Parser<'_>) -> ParseResult<Softwire> {
    let mut ipv4 = None;
    let mut psid = None;
    let mut b4_ipv6 = None;
    let mut br_address = None;
    let mut port_set = None;

    loop {
        let field = parser.next()?;
        match field.as_str() {
            "}" => break,
            "ipv4" => ipv4 = Some(parser.leaf_value(&field)?),
            "psid" => psid = Some(parser.leaf_value(&field)?),
            "b4-ipv6" => b4_ipv6 = Some(parser.leaf_value(&field)?),
            "br-address" => br_address = Some(parser.leaf_value(&field)?),
            "port-set" => {
                parser.expect("{")?;
                port_set = Some(parse_port_set_body(parser)?);
            }
            _ => return Err(ParseError::UnknownField(field)),
        }
    }

    Ok(Softwire {
        ipv4: ipv4.ok_or(ParseError::MissingField("ipv4"))?,
        psid: psid.ok_or(ParseError::MissingField("psid"))?,
        b4_ipv6: b4_ipv6.ok_or(ParseError::MissingField("b4-ipv6"))?,
        br_address: br_address
            .ok_or(ParseError::MissingField("br-address"))?,
        port_set,
    })
}

fn parse_port_set_body(parser: &mut Parser<'_>) -> ParseResult<PortSet> {
    let mut psid_length = None;
    let mut shift = None;

    loop {
        let field = parser.next()?;
        match field.as_str() {
            "}" => break,
            "psid-length" => psid_length = Some(parser.leaf_value(&field)?),
            "reserved-ports-bit-count" => {
                shift = Some(parser.leaf_value(&field)?)
            }
            _ => return Err(ParseError::UnknownField(field)),
        }
    }

    Ok(PortSet {
        psid_length: psid_length
            .ok_or(ParseError::MissingField("psid-length"))?,
        shift: shift
            .ok_or(ParseError::MissingField("reserved-ports-bit-count"))?,
    })
}

// Whitespace-delimited tokenizer; braces and semicolons are tokens of their
// own wherever they appear.
struct Parser<'a> {
    tokens: std::vec::IntoIter<&'a str>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Parser<'a> {
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            let mut rem = word;
            while let Some(pos) = rem.find(['{', '}', ';']) {
                if pos > 0 {
                    tokens.push(&rem[..pos]);
                }
                tokens.push(&rem[pos..pos + 1]);
                rem = &rem[pos + 1..];
            }
            if !rem.is_empty() {
                tokens.push(rem);
            }
        }
        Parser {
            tokens: tokens.into_iter(),
        }
    }

    fn at_eof(&self) -> bool {
        self.tokens.as_slice().is_empty()
    }

    fn next(&mut self) -> ParseResult<String> {
        self.tokens
            .next()
            .map(str::to_owned)
            .ok_or(ParseError::UnexpectedEof)
    }

    fn expect(&mut self, token: &str) -> ParseResult<()> {
        let next = self.next()?;
        if next != token {
            return Err(ParseError::UnexpectedToken(next));
        }
        Ok(())
    }

    // Parses a leaf value followed by its ';' terminator.
    fn leaf_value<T>(&mut self, field: &str) -> ParseResult<T>
    where
        T: std::str::FromStr,
    {
        let token = self.next()?;
        let value = token.parse().map_err(|_| {
            ParseError::InvalidValue(field.to_owned(), token)
        })?;
        self.expect(";")?;
        Ok(value)
    }
}

// ===== impl ParseError =====

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedEof => {
                write!(f, "unexpected end of softwire text")
            }
            ParseError::UnexpectedToken(token) => {
                write!(f, "unexpected token \"{token}\"")
            }
            ParseError::UnknownField(field) => {
                write!(f, "unknown field \"{field}\"")
            }
            ParseError::InvalidValue(field, value) => {
                write!(f, "invalid value \"{value}\" for field \"{field}\"")
            }
            ParseError::MissingField(field) => {
                write!(f, "missing required field \"{field}\"")
            }
        }
    }
}

impl std::error::Error for ParseError {}
