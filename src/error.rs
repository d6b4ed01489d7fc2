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

//! Error types for library operations.
//!
//! Every error is a rejected operation: the engine leaves all entity state
//! unchanged when it returns one, and nothing here is retried automatically.

use crate::base::{BookId, IssueId, UserId};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The kind of entity a [`LibraryError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Book,
    User,
    Issue,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Book => "book",
            Self::User => "user",
            Self::Issue => "issue",
        };
        f.write_str(name)
    }
}

/// Library operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// Referenced book, user, or issue does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: u32 },

    /// Every copy of the book is currently issued
    #[error("no copies of book {book_id} are available")]
    Unavailable { book_id: BookId },

    /// The issue is already closed
    #[error("issue {issue_id} has already been returned")]
    AlreadyReturned { issue_id: IssueId },

    /// The user's membership does not allow borrowing
    #[error("user {user_id} is not eligible to borrow")]
    UserNotEligible { user_id: UserId },

    /// Book cannot be deleted while copies are out
    #[error("book {book_id} has {open} open issue(s)")]
    BookHasOpenIssues { book_id: BookId, open: usize },

    /// User cannot be deleted while holding loans
    #[error("user {user_id} has {open} open issue(s)")]
    UserHasOpenIssues { user_id: UserId, open: usize },

    /// Total copies would drop below the number of copies out on loan
    #[error("total copies {total} is below the {open} copies currently issued")]
    InvalidCopies { total: u32, open: u32 },

    /// Book title is empty or whitespace
    #[error("book title must not be empty")]
    EmptyTitle,

    /// User name is empty or whitespace
    #[error("user name must not be empty")]
    EmptyName,

    /// ISBN already belongs to another book
    #[error("ISBN {0} is already registered")]
    DuplicateIsbn(String),

    /// Email already belongs to another user
    #[error("email {0} is already registered")]
    DuplicateEmail(String),

    /// Loan period of zero days
    #[error("loan period must be at least one day")]
    InvalidLoanPeriod,

    /// Return processed before the book was issued
    #[error("return date {returned} precedes issue date {issued}")]
    InvalidReturnDate {
        issued: NaiveDate,
        returned: NaiveDate,
    },

    /// Issue ID collision in the issue log
    #[error("duplicate issue ID")]
    DuplicateIssue,

    /// Fine for the overdue days does not fit in a decimal
    #[error("fine for {overdue_days} overdue day(s) overflows")]
    FineOverflow { overdue_days: u32 },
}

impl LibraryError {
    pub fn book_not_found(book_id: BookId) -> Self {
        Self::NotFound {
            entity: EntityKind::Book,
            id: book_id.0,
        }
    }

    pub fn user_not_found(user_id: UserId) -> Self {
        Self::NotFound {
            entity: EntityKind::User,
            id: user_id.0,
        }
    }

    pub fn issue_not_found(issue_id: IssueId) -> Self {
        Self::NotFound {
            entity: EntityKind::Issue,
            id: issue_id.0,
        }
    }
}
