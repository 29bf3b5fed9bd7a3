//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// Type aliases.
pub type PathResult<T> = Result<T, PathError>;

/// A parsed schema data path.
///
/// Paths address one node of a configuration or state tree. Each component
/// names a child node; components addressing one entry of a list carry a
/// query mapping key-leaf names to literal values, e.g.
/// `/br-instances/binding/bind-instance[name=br]/binding-table`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DataPath {
    components: Vec<PathComponent>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PathComponent {
    pub name: String,
    pub query: BTreeMap<String, String>,
}

// Path syntax errors.
#[derive(Debug, Eq, PartialEq)]
pub enum PathError {
    Empty,
    MissingLeadingSlash,
    EmptyComponent(usize),
    UnterminatedQuery(usize),
    EmptyQueryKey(usize),
    MissingQueryValue(usize),
}

// ===== impl DataPath =====

impl DataPath {
    pub fn parse(path: &str) -> PathResult<DataPath> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let rem = path
            .strip_prefix('/')
            .ok_or(PathError::MissingLeadingSlash)?;

        let mut components = Vec::new();
        for (index, piece) in split_components(rem).into_iter().enumerate() {
            components.push(PathComponent::parse(index, piece)?);
        }

        Ok(DataPath { components })
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the concatenation of `self` and `other`.
    pub fn join(&self, other: &DataPath) -> DataPath {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        DataPath { components }
    }

    /// Walks the path positionally, comparing component names against the
    /// pattern. Queries are ignored; the pattern must cover the whole path.
    pub fn matches(&self, pattern: &[&str]) -> bool {
        self.components.len() == pattern.len()
            && self
                .components
                .iter()
                .zip(pattern)
                .all(|(component, name)| component.name == *name)
    }

    /// Checks the query of the component at `index` (0-based).
    ///
    /// With no predicate, returns whether the component carries any
    /// key/value query. With a predicate, returns whether every given
    /// key/value pair is present and equal.
    pub fn has_query(
        &self,
        index: usize,
        predicate: Option<&[(&str, &str)]>,
    ) -> bool {
        let Some(component) = self.components.get(index) else {
            return false;
        };
        match predicate {
            None => !component.query.is_empty(),
            Some(pairs) => pairs.iter().all(|(key, value)| {
                component.query.get(*key).map(|v| v.as_str()) == Some(*value)
            }),
        }
    }

    /// Returns the query value for `key` at the component at `index`.
    pub fn query_value(&self, index: usize, key: &str) -> Option<&str> {
        self.components
            .get(index)?
            .query
            .get(key)
            .map(|value| value.as_str())
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "/{}", component.name)?;
            for (key, value) in &component.query {
                write!(f, "[{key}={value}]")?;
            }
        }
        Ok(())
    }
}

// ===== impl PathComponent =====

impl PathComponent {
    fn parse(index: usize, piece: &str) -> PathResult<PathComponent> {
        let (name, mut rem) = match piece.find('[') {
            Some(pos) => piece.split_at(pos),
            None => (piece, ""),
        };
        if name.is_empty() {
            return Err(PathError::EmptyComponent(index));
        }

        let mut query = BTreeMap::new();
        while !rem.is_empty() {
            // Invariant from the split above: `rem` starts at a '['.
            let end = rem
                .find(']')
                .ok_or(PathError::UnterminatedQuery(index))?;
            let predicate = &rem[1..end];
            let (key, value) = predicate
                .split_once('=')
                .ok_or(PathError::MissingQueryValue(index))?;
            if key.is_empty() {
                return Err(PathError::EmptyQueryKey(index));
            }
            query.insert(key.to_owned(), value.to_owned());
            rem = &rem[end + 1..];
            if !rem.is_empty() && !rem.starts_with('[') {
                return Err(PathError::UnterminatedQuery(index));
            }
        }

        Ok(PathComponent {
            name: name.to_owned(),
            query,
        })
    }
}

// ===== impl PathError =====

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "empty path"),
            PathError::MissingLeadingSlash => {
                write!(f, "path doesn't start with '/'")
            }
            PathError::EmptyComponent(index) => {
                write!(f, "empty path component at position {index}")
            }
            PathError::UnterminatedQuery(index) => {
                write!(f, "unterminated list query at position {index}")
            }
            PathError::EmptyQueryKey(index) => {
                write!(f, "empty list query key at position {index}")
            }
            PathError::MissingQueryValue(index) => {
                write!(f, "list query without '=' at position {index}")
            }
        }
    }
}

impl std::error::Error for PathError {}

// ===== helper functions =====

// Splits the slash-separated components of a path, keeping slashes that
// appear inside bracketed list queries as part of their component.
fn split_components(path: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (pos, ch) in path.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = i32::max(depth - 1, 0),
            '/' if depth == 0 => {
                pieces.push(&path[start..pos]);
                start = pos + 1;
            }
            _ => (),
        }
    }
    pieces.push(&path[start..]);
    pieces
}
