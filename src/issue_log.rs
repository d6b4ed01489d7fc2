// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Thread-safe issue store with ID allocation.
//!
//! Hands out increasing issue IDs and rejects any attempt to store two
//! issues under the same ID.

use crate::base::{IssueId, UserId};
use crate::issue::Issue;
use crate::LibraryError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use std::sync::atomic::{AtomicU32, Ordering};

/// Every issue ever created, open or closed.
#[derive(Debug)]
pub struct IssueLog {
    issues: DashMap<IssueId, Issue>,
    next_id: AtomicU32,
}

impl IssueLog {
    pub fn new() -> Self {
        Self {
            issues: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Reserves the next issue ID.
    pub fn next_id(&self) -> IssueId {
        IssueId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Stores a new issue.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::DuplicateIssue`] if an issue with the same ID
    /// is already stored.
    pub fn insert(&self, issue: Issue) -> Result<(), LibraryError> {
        match self.issues.entry(issue.id()) {
            Entry::Occupied(_) => Err(LibraryError::DuplicateIssue),
            Entry::Vacant(entry) => {
                entry.insert(issue);
                Ok(())
            }
        }
    }

    pub fn get(&self, issue_id: IssueId) -> Option<Issue> {
        self.issues.get(&issue_id).map(|issue| issue.value().clone())
    }

    pub(crate) fn get_mut(&self, issue_id: IssueId) -> Option<RefMut<'_, IssueId, Issue>> {
        self.issues.get_mut(&issue_id)
    }

    /// Issues matching `predicate`, in checkout order.
    pub fn filter(&self, predicate: impl Fn(&Issue) -> bool) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self
            .issues
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        issues.sort_by_key(Issue::id);
        issues
    }

    pub fn all(&self) -> Vec<Issue> {
        self.filter(|_| true)
    }

    pub fn open_for_user(&self, user_id: UserId) -> usize {
        self.issues
            .iter()
            .filter(|entry| entry.is_open() && entry.user_id() == user_id)
            .count()
    }
}

impl Default for IssueLog {
    fn default() -> Self {
        Self::new()
    }
}
