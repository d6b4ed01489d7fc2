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

//! Book catalog entries and the availability ledger.
//!
//! Each [`Book`] keeps its copy counters next to the set of issues that
//! currently hold a copy, behind one mutex. The engine takes that mutex as
//! the row lock for every checkout and return on the book, so the counter
//! and the open-issue set always move together:
//!
//! ```text
//! available_copies == total_copies - open_issues.len()
//! ```
//!
//! # Example
//!
//! ```
//! use library_ledger_rs::{Book, BookDetails, BookId};
//!
//! let book = Book::new(BookId(1), BookDetails::new("Clean Code", 3));
//! assert_eq!(book.available_copies(), 3);
//! ```

use crate::LibraryError;
use crate::base::{BookId, IssueId};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Editable book fields, used both to catalog and to update a book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    pub total_copies: u32,
}

impl BookDetails {
    pub fn new(title: impl Into<String>, total_copies: u32) -> Self {
        Self {
            title: title.into(),
            total_copies,
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    /// Trims text fields and rejects a blank title. Blank optionals become `None`.
    pub(crate) fn normalized(self) -> Result<Self, LibraryError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(LibraryError::EmptyTitle);
        }
        let trim = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            title,
            author: trim(self.author),
            isbn: trim(self.isbn),
            total_copies: self.total_copies,
        })
    }
}

/// Point-in-time copy of a book's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSnapshot {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub total_copies: u32,
    pub available_copies: u32,
}

#[derive(Debug)]
pub(crate) struct BookData {
    id: BookId,
    title: String,
    author: Option<String>,
    isbn: Option<String>,
    total_copies: u32,
    available_copies: u32,
    /// Issues currently holding a copy of this book.
    open_issues: HashSet<IssueId>,
}

impl BookData {
    fn new(id: BookId, details: BookDetails) -> Self {
        Self {
            id,
            title: details.title,
            author: details.author,
            isbn: details.isbn,
            total_copies: details.total_copies,
            available_copies: details.total_copies,
            open_issues: HashSet::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available_copies <= self.total_copies,
            "Invariant violated: available {} exceeds total {}",
            self.available_copies,
            self.total_copies
        );
        debug_assert_eq!(
            self.available_copies as usize + self.open_issues.len(),
            self.total_copies as usize,
            "Invariant violated: available + open issues must equal total"
        );
    }

    pub(crate) fn isbn(&self) -> Option<&str> {
        self.isbn.as_deref()
    }

    pub(crate) fn available_copies(&self) -> u32 {
        self.available_copies
    }

    pub(crate) fn open_issue_count(&self) -> usize {
        self.open_issues.len()
    }

    /// Takes one copy out for `issue_id`.
    pub(crate) fn decrement_on_checkout(&mut self, issue_id: IssueId) -> Result<(), LibraryError> {
        if self.available_copies == 0 {
            return Err(LibraryError::Unavailable { book_id: self.id });
        }
        if !self.open_issues.insert(issue_id) {
            return Err(LibraryError::DuplicateIssue);
        }
        self.available_copies -= 1;
        self.assert_invariants();
        Ok(())
    }

    /// Puts the copy held by `issue_id` back on the shelf.
    ///
    /// An issue that is not holding a copy is rejected, so a second return
    /// can never inflate the counter.
    pub(crate) fn increment_on_return(&mut self, issue_id: IssueId) -> Result<(), LibraryError> {
        if !self.open_issues.remove(&issue_id) {
            return Err(LibraryError::AlreadyReturned { issue_id });
        }
        self.available_copies = (self.available_copies + 1).min(self.total_copies);
        self.assert_invariants();
        Ok(())
    }

    /// Replaces the editable fields, recomputing availability from the open set.
    pub(crate) fn apply(&mut self, details: BookDetails) -> Result<(), LibraryError> {
        let open = self.open_issues.len() as u32;
        if details.total_copies < open {
            return Err(LibraryError::InvalidCopies {
                total: details.total_copies,
                open,
            });
        }
        self.title = details.title;
        self.author = details.author;
        self.isbn = details.isbn;
        self.total_copies = details.total_copies;
        self.available_copies = details.total_copies - open;
        self.assert_invariants();
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            total_copies: self.total_copies,
            available_copies: self.available_copies,
        }
    }
}

/// A cataloged book title and its copies.
#[derive(Debug)]
pub struct Book {
    inner: Mutex<BookData>,
}

impl Book {
    pub fn new(id: BookId, details: BookDetails) -> Self {
        Self {
            inner: Mutex::new(BookData::new(id, details)),
        }
    }

    pub fn total_copies(&self) -> u32 {
        self.inner.lock().total_copies
    }

    pub fn available_copies(&self) -> u32 {
        self.inner.lock().available_copies()
    }

    /// Number of copies currently out on loan.
    pub fn open_issue_count(&self) -> usize {
        self.inner.lock().open_issue_count()
    }

    pub fn snapshot(&self) -> BookSnapshot {
        self.inner.lock().snapshot()
    }

    /// Acquires the row lock for this book.
    pub(crate) fn lock(&self) -> MutexGuard<'_, BookData> {
        self.inner.lock()
    }
}
