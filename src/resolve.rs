//! Argument reference resolution
//!
//! A tool's argument lists may reference other lists of the same tool with
//! the `@name` token. Resolution substitutes every reference in place with
//! the fully expanded referenced list. Expansion is a tree walk: a list
//! referenced twice is expanded twice. `@@text` is a literal `@text`.

use crate::error::ReferenceError;
use std::collections::BTreeMap;
use tracing::trace;

/// Prefix marking a reference token
pub const REFERENCE_PREFIX: char = '@';

/// A single argument token after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Literal(&'a str),
    Reference(&'a str),
}

impl<'a> Token<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.strip_prefix(REFERENCE_PREFIX) {
            Some(rest) if rest.starts_with(REFERENCE_PREFIX) => Token::Literal(rest),
            Some(name) => Token::Reference(name),
            None => Token::Literal(raw),
        }
    }
}

/// Names of every list directly referenced by `tokens`
pub fn references(tokens: &[String]) -> impl Iterator<Item = &str> {
    tokens.iter().filter_map(|token| match Token::parse(token) {
        Token::Reference(name) => Some(name),
        Token::Literal(_) => None,
    })
}

/// Expand the list `start` of `tool` into a flat argument vector
///
/// Every independent error found during the walk is collected; duplicates
/// (the same error reached through repeated references) are reported once.
pub fn resolve_arguments(
    tool: &str,
    lists: &BTreeMap<String, Vec<String>>,
    start: &str,
) -> Result<Vec<String>, Vec<ReferenceError>> {
    let mut resolver = Resolver {
        tool,
        lists,
        output: Vec::new(),
        errors: Vec::new(),
    };

    if lists.contains_key(start) {
        resolver.expand(start, vec![start.to_string()]);
    } else {
        resolver.errors.push(ReferenceError::Unknown {
            tool: tool.to_string(),
            name: start.to_string(),
            chain: Vec::new(),
        });
    }

    if resolver.errors.is_empty() {
        trace!(tool, start, args = ?resolver.output, "resolved arguments");
        Ok(resolver.output)
    } else {
        let mut errors = resolver.errors;
        let mut seen = Vec::with_capacity(errors.len());
        errors.retain(|err| {
            if seen.contains(err) {
                false
            } else {
                seen.push(err.clone());
                true
            }
        });
        Err(errors)
    }
}

struct Resolver<'a> {
    tool: &'a str,
    lists: &'a BTreeMap<String, Vec<String>>,
    output: Vec<String>,
    errors: Vec<ReferenceError>,
}

impl Resolver<'_> {
    // `path` is owned per branch so sibling expansions never see each other's visits
    fn expand(&mut self, name: &str, path: Vec<String>) {
        let Some(tokens) = self.lists.get(name) else {
            return;
        };

        for raw in tokens {
            let target = match Token::parse(raw) {
                Token::Literal(literal) => {
                    self.output.push(literal.to_string());
                    continue;
                }
                Token::Reference(target) => target,
            };

            if path.iter().any(|visited| visited == target) {
                let mut trace = path.clone();
                trace.push(target.to_string());
                self.errors.push(ReferenceError::Cycle {
                    tool: self.tool.to_string(),
                    trace,
                });
                continue;
            }

            if !self.lists.contains_key(target) {
                self.errors.push(ReferenceError::Unknown {
                    tool: self.tool.to_string(),
                    name: target.to_string(),
                    chain: path.clone(),
                });
                continue;
            }

            let mut branch = path.clone();
            branch.push(target.to_string());
            self.expand(target, branch);
        }
    }
}
