//! Pattern search and replacement.
//!
//! Patterns are ordinary expressions compared with `==`, so a wildcard in a
//! pattern matches any subtree. Matches are located by their child-index
//! path from the root and visited in pre-order.

use super::Exp;

impl Exp {
    /// Collect the paths of every subtree equal to `pattern`. A match does
    /// not stop the descent into its own children unless `once` is set, in
    /// which case the walk ends at the first match.
    fn do_search(&self, pattern: &Exp, path: &mut Vec<usize>, found: &mut Vec<Vec<usize>>, once: bool) {
        if pattern == self {
            found.push(path.clone());
            if once {
                return;
            }
        }
        for i in 0..self.arity() {
            if once && !found.is_empty() {
                return;
            }
            if let Some(child) = self.child(i) {
                path.push(i);
                child.do_search(pattern, path, found, once);
                path.pop();
            }
        }
    }

    fn matching_paths(&self, pattern: &Exp, once: bool) -> Vec<Vec<usize>> {
        let mut found = Vec::new();
        self.do_search(pattern, &mut Vec::new(), &mut found, once);
        found
    }

    /// The subtree reached by following child indices from this node.
    pub fn at_path(&self, path: &[usize]) -> Option<&Exp> {
        path.iter().try_fold(self, |e, &i| e.child(i))
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Exp> {
        let mut cur = self;
        for &i in path {
            cur = cur.child_mut(i)?;
        }
        Some(cur)
    }

    /// First subtree (in pre-order) equal to `pattern`. Useful with
    /// wildcards: searching for `r[WILD]` returns the concrete `r[2]`.
    pub fn search(&self, pattern: &Exp) -> Option<&Exp> {
        let found = self.matching_paths(pattern, true);
        found.first().and_then(|path| self.at_path(path))
    }

    /// Every subtree equal to `pattern`, in pre-order.
    pub fn search_all(&self, pattern: &Exp) -> Vec<&Exp> {
        self.matching_paths(pattern, false)
            .iter()
            .filter_map(|path| self.at_path(path))
            .collect()
    }

    /// Replace the first match of `pattern` with a copy of `replacement`.
    /// Returns whether anything was replaced.
    pub fn search_replace(&mut self, pattern: &Exp, replacement: &Exp) -> bool {
        self.search_replace_with(pattern, replacement, true)
    }

    /// Replace every match of `pattern` with its own copy of `replacement`.
    /// Returns whether anything was replaced.
    pub fn search_replace_all(&mut self, pattern: &Exp, replacement: &Exp) -> bool {
        self.search_replace_with(pattern, replacement, false)
    }

    /// Replace matches of `pattern`, stopping after the first when
    /// `first_only` is set. A match nested inside an already replaced
    /// subtree no longer exists and is skipped. When the root itself matches
    /// the whole expression is replaced.
    pub fn search_replace_with(&mut self, pattern: &Exp, replacement: &Exp, first_only: bool) -> bool {
        let found = self.matching_paths(pattern, first_only);
        let mut replaced: Vec<&[usize]> = Vec::new();
        for path in &found {
            if replaced.iter().any(|done| path.starts_with(done)) {
                continue;
            }
            if let Some(slot) = self.at_path_mut(path) {
                *slot = replacement.clone();
                replaced.push(path);
            }
            if first_only {
                break;
            }
        }
        !replaced.is_empty()
    }
}
