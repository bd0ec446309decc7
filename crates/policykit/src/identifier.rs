//! Identifier codec for authentication policies.
//!
//! A policy lives at `database.schema.name`. The tracked-state key is a single
//! token built from those three parts:
//!
//! ```text
//! database|schema|name
//! ```
//!
//! Inside a part, `\` is written `\\` and `|` is written `\|`; no other escape
//! exists. Parts are case-sensitive and kept byte-for-byte, so
//! `decode(encode(id)) == id` for every valid identifier.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Separator between the three parts of a token.
pub const SEPARATOR: char = '|';

const ESCAPE: char = '\\';

/// Hierarchical location of an authentication policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyIdentifier {
    database: String,
    schema: String,
    name: String,
}

impl PolicyIdentifier {
    /// Build an identifier, rejecting empty parts.
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let id = Self {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
        };
        id.validate()?;
        Ok(id)
    }

    fn validate(&self) -> Result<()> {
        for (part, value) in self.parts() {
            if value.is_empty() {
                return Err(Error::MalformedIdentifierInput { part });
            }
        }
        Ok(())
    }

    fn parts(&self) -> [(&'static str, &str); 3] {
        [
            ("database", &self.database),
            ("schema", &self.schema),
            ("name", &self.name),
        ]
    }

    /// Top-level container.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Nested container.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Leaf name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `database.schema.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.name)
    }

    /// Encode into a tracked-state token.
    pub fn encode(&self) -> Result<String> {
        encode(&self.database, &self.schema, &self.name)
    }
}

impl fmt::Display for PolicyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

impl FromStr for PolicyIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// Encode the three parts of a policy path into one token.
pub fn encode(database: &str, schema: &str, name: &str) -> Result<String> {
    let mut token = String::with_capacity(database.len() + schema.len() + name.len() + 2);
    for (i, (part, value)) in [("database", database), ("schema", schema), ("name", name)]
        .into_iter()
        .enumerate()
    {
        if value.is_empty() {
            return Err(Error::MalformedIdentifierInput { part });
        }
        if i > 0 {
            token.push(SEPARATOR);
        }
        for c in value.chars() {
            if c == SEPARATOR || c == ESCAPE {
                token.push(ESCAPE);
            }
            token.push(c);
        }
    }
    Ok(token)
}

/// Decode a token produced by [`encode`].
pub fn decode(token: &str) -> Result<PolicyIdentifier> {
    let mut parts: Vec<String> = vec![String::new()];
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(next @ (SEPARATOR | ESCAPE)) => push_char(&mut parts, next),
                Some(other) => {
                    return Err(Error::undecodable(
                        token,
                        format!("unknown escape sequence '\\{other}'"),
                    ));
                }
                None => return Err(Error::undecodable(token, "truncated escape sequence")),
            },
            SEPARATOR => parts.push(String::new()),
            _ => push_char(&mut parts, c),
        }
    }

    if parts.len() != 3 {
        return Err(Error::undecodable(
            token,
            format!("expected 3 parts separated by '{SEPARATOR}', found {}", parts.len()),
        ));
    }

    let name = parts.pop().unwrap_or_default();
    let schema = parts.pop().unwrap_or_default();
    let database = parts.pop().unwrap_or_default();

    PolicyIdentifier::new(database, schema, name).map_err(|e| match e {
        Error::MalformedIdentifierInput { part } => {
            Error::undecodable(token, format!("{part} is empty"))
        }
        other => other,
    })
}

fn push_char(parts: &mut [String], c: char) {
    if let Some(last) = parts.last_mut() {
        last.push(c);
    }
}
