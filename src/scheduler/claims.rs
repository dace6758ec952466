use std::collections::BTreeSet;

use crate::board::Task;

/// Conservative over-approximation of the files a task's worker will
/// write. Derived from the task's scope items plus any path-like tokens in
/// its plan document; two live workers must never hold overlapping claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    paths: BTreeSet<String>,
}

impl ClaimSet {
    pub fn predict(task: &Task, plan_doc: Option<&str>) -> Self {
        let mut paths = BTreeSet::new();

        for item in &task.scope {
            for token in item.split_whitespace() {
                if let Some(path) = normalize_path_token(token) {
                    paths.insert(path);
                }
            }
        }

        if let Some(doc) = plan_doc {
            for token in backtick_tokens(doc) {
                if let Some(path) = normalize_path_token(token) {
                    paths.insert(path);
                }
            }
        }

        Self { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Two claim sets overlap when any claim of one equals or is a path
    /// prefix of a claim of the other.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.paths.iter().any(|a| {
            other
                .paths
                .iter()
                .any(|b| is_path_prefix(a, b) || is_path_prefix(b, a))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

/// A token counts as a path when it has a directory separator or a file
/// extension. Globs are widened to their fixed prefix, which keeps the
/// approximation conservative.
fn normalize_path_token(token: &str) -> Option<String> {
    let token = token
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == ',' || c == ';'
            || c == ':' || c == '(' || c == ')');

    if token.is_empty() || token.contains("://") {
        return None;
    }

    let looks_like_path = token.contains('/')
        || std::path::Path::new(token)
            .extension()
            .is_some_and(|ext| ext.len() <= 5);
    if !looks_like_path {
        return None;
    }

    let mut path = token.trim_start_matches("./").to_string();

    // Widen globs to the fixed prefix before the first wildcard.
    if let Some(star) = path.find('*') {
        path.truncate(star);
        while path.ends_with('/') {
            path.pop();
        }
    }
    while path.ends_with('/') {
        path.pop();
    }

    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn is_path_prefix(prefix: &str, path: &str) -> bool {
    if prefix == path {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn backtick_tokens(doc: &str) -> impl Iterator<Item = &str> {
    doc.split('`').skip(1).step_by(2)
}
