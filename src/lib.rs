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

//! # Library Ledger
//!
//! This library provides a loan engine for a lending library: a book
//! catalog with per-title copy counts, registered users, and issue (loan)
//! records that move copies off and back onto the shelf, with overdue fines
//! fixed at return time.
//!
//! ## Core Components
//!
//! - [`Library`]: Central engine owning books, users, and issues
//! - [`Book`]: Catalog entry and availability ledger for its copies
//! - [`Issue`]: A loan of one copy to one user, `Open` until returned
//! - [`FinePolicy`]: Pure overdue-fine calculation
//! - [`LoanPolicy`]: Loan period, fine rate, and membership rules
//! - [`LibraryError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use library_ledger_rs::{BookDetails, Library, UserDetails};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let library = Library::new();
//! let book = library.add_book(BookDetails::new("Clean Code", 2)).unwrap();
//! let user = library.add_user(UserDetails::new("Alice")).unwrap();
//!
//! let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let issue = library.checkout(book.id, user.id, today).unwrap();
//! assert_eq!(issue.due_date(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
//! assert_eq!(library.get_book(book.id).unwrap().available_copies, 1);
//!
//! // Three days late at the default rate of 1.00 per day.
//! let returned = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
//! let closed = library.return_book(issue.id(), returned).unwrap();
//! assert_eq!(closed.fine(), Some(dec!(3.00)));
//! assert_eq!(library.get_book(book.id).unwrap().available_copies, 2);
//! ```
//!
//! ## Thread Safety
//!
//! The engine handles concurrent access with one lock per book, so checkouts
//! and returns on different titles proceed in parallel while those on the
//! same title are serialized.

mod base;
pub mod book;
pub mod config;
mod engine;
pub mod error;
pub mod fine;
mod issue;
mod issue_log;
mod report;
pub mod user;

pub use base::{BookId, IssueId, UserId};
pub use book::{Book, BookDetails, BookSnapshot};
pub use config::{ConfigError, LoanPolicy};
pub use engine::Library;
pub use error::{EntityKind, LibraryError};
pub use fine::{FinePolicy, overdue_days};
pub use issue::{Issue, IssueStatus};
pub use issue_log::IssueLog;
pub use report::ReportSummary;
pub use user::{MembershipStatus, User, UserDetails};
