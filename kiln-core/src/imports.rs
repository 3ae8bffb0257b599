//! Deduplicated set of Go package paths required by a template.
//!
//! Every mutation bumps [`ImportSet::version`] and drops the cached listing;
//! [`ImportSet::list`] rebuilds it on the next read. `add_all` is a batch:
//! the version moves exactly once no matter how many names it carries.

use std::cell::OnceCell;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ImportSet {
    values: HashSet<String>,
    version: u64,
    batch: bool,
    cache: OnceCell<Vec<String>>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name` if absent. Returns `true` when the set changed.
    ///
    /// Surrounding whitespace and quotes are stripped. Empty names, and names
    /// with inner whitespace or quotes (such as an aliased import), are
    /// ignored.
    pub fn add(&mut self, name: &str) -> bool {
        let Some(name) = normalize(name) else {
            return false;
        };
        if self.values.contains(name) {
            return false;
        }
        self.values.insert(name.to_owned());
        self.cache.take();
        if !self.batch {
            self.version += 1;
        }
        true
    }

    /// Insert every name under a single version bump.
    pub fn add_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.batch = true;
        for name in names {
            self.add(name.as_ref());
        }
        self.batch = false;
        self.version += 1;
    }

    /// Remove `name` if present. Returns `true` when the set changed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(name) = normalize(name) else {
            return false;
        };
        if !self.values.remove(name) {
            return false;
        }
        self.cache.take();
        self.version += 1;
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        normalize(name).is_some_and(|n| self.values.contains(n))
    }

    /// Current members, sorted. Memoized until the next mutation.
    pub fn list(&self) -> &[String] {
        self.cache.get_or_init(|| {
            let mut names: Vec<String> = self.values.iter().cloned().collect();
            names.sort();
            names
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn normalize(name: &str) -> Option<&str> {
    let name = name.trim();
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name)
        .trim();
    let bare = !name.is_empty()
        && !name.contains(|c: char| c.is_whitespace() || c == '"' || c == '`');
    bare.then_some(name)
}
