//! Layered toggle maps

use crate::map::{MetadataIter, ToggleMap};
use crate::metadata::Metadata;
use crate::toggle::Toggle;
use std::collections::HashSet;

/// Two toggle maps queried in order, the first taking precedence
///
/// Both sides are queried on every call, so mutations to either are visible
/// immediately. Built with [`ToggleMapExt::or_else`](crate::ToggleMapExt::or_else).
#[derive(Debug, Clone)]
pub struct OrElse<A, B> {
    first: A,
    second: B,
}

impl<A: ToggleMap, B: ToggleMap> OrElse<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Higher precedence map
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Fallback map
    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A: ToggleMap, B: ToggleMap> ToggleMap for OrElse<A, B> {
    fn get(&self, id: &str) -> Toggle {
        self.first.get(id).or_else(&self.second.get(id))
    }

    fn iter(&self) -> MetadataIter {
        let first: Vec<Metadata> = self.first.iter().collect();
        let seen: HashSet<String> = first.iter().map(|md| md.id.clone()).collect();
        let rest = self.second.iter().filter(move |md| !seen.contains(&md.id));
        Box::new(first.into_iter().chain(rest))
    }
}
