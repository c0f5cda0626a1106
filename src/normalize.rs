use crate::error::ConfigError;
use crate::matching::union_find::UnionFind;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

const ENGLISH_TOKENS: &str = include_str!("../data/street_tokens.txt");

/// Synonym groups of interchangeable street-name tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    origin: String,
    groups: Vec<Vec<String>>,
}

impl TokenTable {
    /// Parse one comma separated group per line; `#` starts a comment.
    pub fn parse(origin: &str, text: &str) -> Self {
        let groups = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .map(|line| {
                line.split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|g| !g.is_empty())
            .collect();
        Self {
            origin: origin.to_string(),
            groups,
        }
    }

    /// The built-in U.S. English table.
    pub fn english() -> Self {
        Self::parse("builtin:english", ENGLISH_TOKENS)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading token table {}", path.display()))?;
        Ok(Self::parse(&path.display().to_string(), &text))
    }

    pub fn from_groups<G, S>(groups: G) -> Self
    where
        G: IntoIterator,
        G::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = groups
            .into_iter()
            .map(|g| {
                g.into_iter()
                    .map(|t| t.as_ref().trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|g| !g.is_empty())
            .collect();
        Self {
            origin: "inline".into(),
            groups,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }
}

/// Maps street tokens to canonical class identifiers.
///
/// Groups that share a token are unioned into one class and each class is
/// named by a hash of its sorted members, so the result does not depend on
/// the order of groups or of tokens within a group.
#[derive(Debug, Clone)]
pub struct TokenNormalizer {
    classes: HashMap<String, String>,
}

impl TokenNormalizer {
    pub fn new(table: &TokenTable) -> Result<Self, ConfigError> {
        if table.groups.is_empty() {
            return Err(ConfigError::EmptyTokenTable {
                origin: table.origin.clone(),
            });
        }
        let mut uf: UnionFind<String> = UnionFind::new();
        for group in &table.groups {
            let first = &group[0];
            uf.make_set(first.clone());
            for token in &group[1..] {
                uf.union(first, token);
            }
        }
        let mut classes = HashMap::with_capacity(uf.len());
        for mut members in uf.groups() {
            members.sort();
            let id = format!("{:016x}", xxh3_64(members.join("\u{1f}").as_bytes()));
            for token in members {
                classes.insert(token, id.clone());
            }
        }
        Ok(Self { classes })
    }

    pub fn english() -> Self {
        // The embedded table is never empty.
        Self::new(&TokenTable::english()).unwrap_or_else(|_| Self {
            classes: HashMap::new(),
        })
    }

    /// Class identifier for a lowercase token, if the table knows it.
    pub fn class_of(&self, token: &str) -> Option<&str> {
        self.classes.get(token).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Lowercase, split on whitespace, swap known tokens for their class and
    /// concatenate without separators. Word order is preserved.
    pub fn normalize(&self, street: &str) -> String {
        let lowered = street.to_lowercase();
        let mut out = String::with_capacity(lowered.len());
        for token in lowered.split_whitespace() {
            match self.classes.get(token) {
                Some(class) => out.push_str(class),
                None => out.push_str(token),
            }
        }
        out
    }
}
