/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::ScrapedMemory;

/// Display order of the saved list. Storage order is always save order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// A save was attempted for a URL that is already in the set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateMemory {
    pub url: String,
}

impl fmt::Display for DuplicateMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is already saved in memory", self.url)
    }
}

impl std::error::Error for DuplicateMemory {}

/// Transient, process-lifetime list of saved memories keyed by URL.
#[derive(Clone, Debug, Default)]
pub struct SavedMemorySet {
    entries: Vec<ScrapedMemory>,
    urls: HashSet<String>,
}

impl SavedMemorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Append in save order. Duplicates are rejected, never merged.
    pub fn insert(&mut self, memory: ScrapedMemory) -> Result<(), DuplicateMemory> {
        if !self.urls.insert(memory.url.clone()) {
            return Err(DuplicateMemory { url: memory.url });
        }
        self.entries.push(memory);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the requested display order.
    pub fn ordered(&self, order: SavedOrder) -> Vec<&ScrapedMemory> {
        match order {
            SavedOrder::OldestFirst => self.entries.iter().collect(),
            SavedOrder::NewestFirst => self.entries.iter().rev().collect(),
        }
    }
}
