//! Contributor identity registry, deduplicated by email.

use rustc_hash::FxHashMap;

use crate::model::Contributor;

/// Maps author identities to stable numeric ids within a pipeline run.
///
/// Lookup is by email only; the display name stored is whichever was
/// first seen for that email. There is no alias/merge logic, so the same
/// human committing under two addresses stays two contributors.
#[derive(Default)]
pub struct ContributorRegistry {
    by_email: FxHashMap<String, i64>,
    contributors: Vec<Contributor>,
}

impl ContributorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, name: &str, email: &str) -> i64 {
        if let Some(&id) = self.by_email.get(email) {
            return id;
        }
        let id = self.contributors.len() as i64 + 1;
        self.contributors.push(Contributor {
            id,
            name: name.to_string(),
            email: email.to_string(),
        });
        self.by_email.insert(email.to_string(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn into_contributors(self) -> Vec<Contributor> {
        self.contributors
    }
}
