//! Diff algorithm for generating user sync plans
//!
//! Users are matched on a single key: the lower-cased local email against the
//! lower-cased directory userName. No other attribute is compared, so a user
//! present on both sides is left alone even if its names differ.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use sync_core::{LocalUserRecord, RemoteUserRecord};

/// Work computed for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffPlan {
    /// Local records with no directory user
    pub to_create: Vec<LocalUserRecord>,
    /// Directory users with no local record
    pub to_delete: Vec<RemoteUserRecord>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    pub fn total_operations(&self) -> usize {
        self.to_create.len() + self.to_delete.len()
    }
}

/// Diff engine for generating sync plans
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Partition both collections into create and delete work.
    ///
    /// Duplicate local emails are kept; each one is attempted and the directory
    /// decides which wins.
    pub fn generate_plan(
        &self,
        remote: Vec<RemoteUserRecord>,
        local: Vec<LocalUserRecord>,
    ) -> DiffPlan {
        let remote_keys: HashSet<String> = remote.iter().map(RemoteUserRecord::match_key).collect();
        let local_keys: HashSet<String> = local.iter().map(LocalUserRecord::match_key).collect();

        let to_create = local
            .into_iter()
            .filter(|record| !remote_keys.contains(&record.match_key()))
            .collect();

        let to_delete = remote
            .into_iter()
            .filter(|user| !local_keys.contains(&user.match_key()))
            .collect();

        DiffPlan {
            to_create,
            to_delete,
        }
    }
}
