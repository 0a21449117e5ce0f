//! Phase 2: a serial leaf scan that skips any leaf whose nearest cached
//! ancestor is already known clean (spec.md §4.9). Runs after
//! [`crate::phase1::Phase1::is_done`] to fetch the dirty leaves phase 1
//! could not rule out.

use std::collections::HashSet;

use crate::plan::parent_of;

pub struct Phase2<'a> {
    clean_cache: &'a HashSet<u64>,
    cursor: u64,
    last_leaf_path: u64,
}

impl<'a> Phase2<'a> {
    pub fn new(first_leaf_path: u64, last_leaf_path: u64, clean_cache: &'a HashSet<u64>) -> Self {
        Self {
            clean_cache,
            cursor: first_leaf_path,
            last_leaf_path,
        }
    }

    fn has_clean_ancestor(&self, mut path: u64) -> bool {
        while path > 1 {
            path = parent_of(path);
            if self.clean_cache.contains(&path) {
                return true;
            }
        }
        false
    }
}

impl<'a> Iterator for Phase2<'a> {
    /// The next leaf path that genuinely needs fetching.
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while self.cursor <= self.last_leaf_path {
            let path = self.cursor;
            self.cursor += 1;
            if !self.has_clean_ancestor(path) {
                return Some(path);
            }
        }
        None
    }
}
