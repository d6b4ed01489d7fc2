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

//! Loan lifecycle engine.
//!
//! The [`Library`] owns the book, user, and issue tables and is the only way
//! to move a copy between the shelf and a borrower.
//!
//! # Operations
//!
//! - **Checkout**: Opens an issue for one copy of a book and takes that copy
//!   off the shelf.
//! - **Return**: Closes an open issue, fixes its fine, and puts the copy back.
//! - **Catalog / membership**: Add, edit, and delete books and users. Deleting
//!   anything an open issue refers to is rejected.
//! - **Reporting**: Summary counts and overdue listings.
//!
//! # Thread Safety
//!
//! Each book's mutex is the row lock for that book. Checkout and return both
//! run their precondition checks and their mutations while holding it, so two
//! checkouts on the last copy, or two returns of the same issue, cannot
//! interleave. Locks are always taken in the order
//! books map → book mutex → users map → issues map.

use crate::base::{BookId, IssueId, UserId};
use crate::book::{Book, BookDetails, BookSnapshot};
use crate::config::LoanPolicy;
use crate::fine::FinePolicy;
use crate::issue::Issue;
use crate::issue_log::IssueLog;
use crate::report::ReportSummary;
use crate::user::{MembershipStatus, User, UserDetails};
use crate::LibraryError;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

/// In-memory library: catalog, members, and loans.
///
/// # Invariants
///
/// - For every book, `0 <= available_copies <= total_copies`.
/// - For every book, `available_copies == total_copies - open issues on it`.
/// - Issues only move `Open` -> `Closed`; a closed issue never changes.
/// - A fine is computed once, at return, and stored on the issue.
pub struct Library {
    policy: LoanPolicy,
    fine_policy: FinePolicy,
    books: DashMap<BookId, Book>,
    users: DashMap<UserId, User>,
    issues: IssueLog,
    /// ISBN -> owning book, for uniqueness.
    isbn_index: DashMap<String, BookId>,
    /// Email -> owning user, for uniqueness.
    email_index: DashMap<String, UserId>,
    next_book_id: AtomicU32,
    next_user_id: AtomicU32,
}

impl Library {
    /// Creates an empty library with the default loan policy.
    pub fn new() -> Self {
        Self::with_policy(LoanPolicy::default())
    }

    /// Creates an empty library with the given loan policy.
    pub fn with_policy(policy: LoanPolicy) -> Self {
        Library {
            fine_policy: FinePolicy::from(&policy),
            policy,
            books: DashMap::new(),
            users: DashMap::new(),
            issues: IssueLog::new(),
            isbn_index: DashMap::new(),
            email_index: DashMap::new(),
            next_book_id: AtomicU32::new(1),
            next_user_id: AtomicU32::new(1),
        }
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    pub fn fine_policy(&self) -> &FinePolicy {
        &self.fine_policy
    }

    // === Catalog ===

    /// Catalogs a new book with every copy available.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::EmptyTitle`] - Title is blank.
    /// - [`LibraryError::DuplicateIsbn`] - ISBN already belongs to another book.
    pub fn add_book(&self, details: BookDetails) -> Result<BookSnapshot, LibraryError> {
        let details = details.normalized()?;
        if let Some(isbn) = &details.isbn {
            if self.isbn_index.contains_key(isbn) {
                return Err(LibraryError::DuplicateIsbn(isbn.clone()));
            }
        }

        let book_id = BookId(self.next_book_id.fetch_add(1, Ordering::Relaxed));
        if let Some(isbn) = &details.isbn {
            self.reserve_isbn(isbn, book_id)?;
        }

        let book = Book::new(book_id, details);
        let snapshot = book.snapshot();
        self.books.insert(book_id, book);

        info!(%book_id, title = %snapshot.title, copies = snapshot.total_copies, "book added");
        Ok(snapshot)
    }

    /// Replaces a book's details.
    ///
    /// Availability is recomputed from the copies on loan, so raising
    /// `total_copies` adds shelf copies and lowering it removes them.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - No such book.
    /// - [`LibraryError::EmptyTitle`] - Title is blank.
    /// - [`LibraryError::DuplicateIsbn`] - ISBN already belongs to another book.
    /// - [`LibraryError::InvalidCopies`] - New total is below the copies on loan.
    pub fn update_book(
        &self,
        book_id: BookId,
        details: BookDetails,
    ) -> Result<BookSnapshot, LibraryError> {
        let details = details.normalized()?;
        let book = self
            .books
            .get(&book_id)
            .ok_or_else(|| LibraryError::book_not_found(book_id))?;
        let mut data = book.lock();

        let old_isbn = data.isbn().map(str::to_string);
        let new_isbn = details.isbn.clone();
        if let Some(isbn) = &new_isbn {
            self.reserve_isbn(isbn, book_id)?;
        }

        if let Err(e) = data.apply(details) {
            if let Some(isbn) = new_isbn.as_ref().filter(|isbn| old_isbn.as_ref() != Some(*isbn)) {
                self.release_isbn(isbn, book_id);
            }
            return Err(e);
        }
        if let Some(isbn) = old_isbn.as_ref().filter(|isbn| new_isbn.as_ref() != Some(*isbn)) {
            self.release_isbn(isbn, book_id);
        }

        let snapshot = data.snapshot();
        debug!(%book_id, total = snapshot.total_copies, "book updated");
        Ok(snapshot)
    }

    /// Removes a book from the catalog.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - No such book.
    /// - [`LibraryError::BookHasOpenIssues`] - Copies are still on loan.
    pub fn delete_book(&self, book_id: BookId) -> Result<BookSnapshot, LibraryError> {
        let snapshot = match self.books.entry(book_id) {
            Entry::Vacant(_) => return Err(LibraryError::book_not_found(book_id)),
            Entry::Occupied(entry) => {
                let open = entry.get().open_issue_count();
                if open > 0 {
                    warn!(%book_id, open, "refusing to delete book with open issues");
                    return Err(LibraryError::BookHasOpenIssues { book_id, open });
                }
                let (_, book) = entry.remove_entry();
                book.snapshot()
            }
        };

        if let Some(isbn) = &snapshot.isbn {
            self.release_isbn(isbn, book_id);
        }
        info!(%book_id, "book deleted");
        Ok(snapshot)
    }

    pub fn get_book(&self, book_id: BookId) -> Option<BookSnapshot> {
        self.books.get(&book_id).map(|book| book.snapshot())
    }

    /// All books, ordered by ID.
    pub fn books(&self) -> Vec<BookSnapshot> {
        let mut books: Vec<BookSnapshot> = self.books.iter().map(|book| book.snapshot()).collect();
        books.sort_by_key(|book| book.id);
        books
    }

    fn reserve_isbn(&self, isbn: &str, book_id: BookId) -> Result<(), LibraryError> {
        match self.isbn_index.entry(isbn.to_string()) {
            Entry::Occupied(entry) if *entry.get() != book_id => {
                Err(LibraryError::DuplicateIsbn(isbn.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(book_id);
                Ok(())
            }
        }
    }

    fn release_isbn(&self, isbn: &str, book_id: BookId) {
        self.isbn_index.remove_if(isbn, |_, owner| *owner == book_id);
    }

    // === Membership ===

    /// Registers a new user.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::EmptyName`] - Name is blank.
    /// - [`LibraryError::DuplicateEmail`] - Email already belongs to another user.
    pub fn add_user(&self, details: UserDetails) -> Result<User, LibraryError> {
        let details = details.normalized()?;
        if let Some(email) = &details.email {
            if self.email_index.contains_key(email) {
                return Err(LibraryError::DuplicateEmail(email.clone()));
            }
        }

        let user_id = UserId(self.next_user_id.fetch_add(1, Ordering::Relaxed));
        if let Some(email) = &details.email {
            self.reserve_email(email, user_id)?;
        }

        let user = User::new(user_id, details);
        self.users.insert(user_id, user.clone());

        info!(%user_id, name = %user.name, "user added");
        Ok(user)
    }

    /// Replaces a user's details, including membership status.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - No such user.
    /// - [`LibraryError::EmptyName`] - Name is blank.
    /// - [`LibraryError::DuplicateEmail`] - Email already belongs to another user.
    pub fn update_user(&self, user_id: UserId, details: UserDetails) -> Result<User, LibraryError> {
        let details = details.normalized()?;
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| LibraryError::user_not_found(user_id))?;

        if let Some(email) = &details.email {
            self.reserve_email(email, user_id)?;
        }
        if let Some(old) = user.email.as_ref().filter(|old| details.email.as_ref() != Some(*old)) {
            self.release_email(old, user_id);
        }
        user.apply(details);

        debug!(%user_id, status = ?user.status, "user updated");
        Ok(user.value().clone())
    }

    /// Changes only a user's membership status.
    pub fn set_user_status(
        &self,
        user_id: UserId,
        status: MembershipStatus,
    ) -> Result<User, LibraryError> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| LibraryError::user_not_found(user_id))?;
        user.status = status;

        debug!(%user_id, ?status, "membership status changed");
        Ok(user.value().clone())
    }

    /// Removes a user.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] - No such user.
    /// - [`LibraryError::UserHasOpenIssues`] - User still holds books.
    pub fn delete_user(&self, user_id: UserId) -> Result<User, LibraryError> {
        let user = match self.users.entry(user_id) {
            Entry::Vacant(_) => return Err(LibraryError::user_not_found(user_id)),
            Entry::Occupied(entry) => {
                // Checkout holds a read guard on this user while opening an
                // issue, so the count cannot go stale under the write guard.
                let open = self.issues.open_for_user(user_id);
                if open > 0 {
                    warn!(%user_id, open, "refusing to delete user with open issues");
                    return Err(LibraryError::UserHasOpenIssues { user_id, open });
                }
                entry.remove()
            }
        };

        if let Some(email) = &user.email {
            self.release_email(email, user_id);
        }
        info!(%user_id, "user deleted");
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|user| user.value().clone())
    }

    /// All users, ordered by ID.
    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|user| user.value().clone()).collect();
        users.sort_by_key(|user| user.id);
        users
    }

    fn reserve_email(&self, email: &str, user_id: UserId) -> Result<(), LibraryError> {
        match self.email_index.entry(email.to_string()) {
            Entry::Occupied(entry) if *entry.get() != user_id => {
                Err(LibraryError::DuplicateEmail(email.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(user_id);
                Ok(())
            }
        }
    }

    fn release_email(&self, email: &str, user_id: UserId) {
        self.email_index.remove_if(email, |_, owner| *owner == user_id);
    }

    // === Loan lifecycle ===

    /// Lends one copy of `book_id` to `user_id` for the policy's loan period.
    ///
    /// See [`Library::checkout_with_period`] for errors.
    pub fn checkout(
        &self,
        book_id: BookId,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Issue, LibraryError> {
        self.checkout_with_period(book_id, user_id, today, self.policy.loan_period_days)
    }

    /// Lends one copy of `book_id` to `user_id`, due `loan_days` after `today`.
    ///
    /// # Errors
    ///
    /// Checked in this order; any error leaves every table unchanged.
    ///
    /// - [`LibraryError::InvalidLoanPeriod`] - `loan_days` is zero or the due
    ///   date falls outside the calendar range.
    /// - [`LibraryError::NotFound`] - Unknown book or user.
    /// - [`LibraryError::UserNotEligible`] - Membership is not active and the
    ///   policy requires it.
    /// - [`LibraryError::Unavailable`] - Every copy is on loan.
    pub fn checkout_with_period(
        &self,
        book_id: BookId,
        user_id: UserId,
        today: NaiveDate,
        loan_days: u32,
    ) -> Result<Issue, LibraryError> {
        let due_date = Issue::due_date_for(today, loan_days)?;

        let book = self
            .books
            .get(&book_id)
            .ok_or_else(|| LibraryError::book_not_found(book_id))?;
        let mut ledger = book.lock();

        let user = self
            .users
            .get(&user_id)
            .ok_or_else(|| LibraryError::user_not_found(user_id))?;
        if self.policy.require_active_membership && !user.status.can_borrow() {
            debug!(%user_id, status = ?user.status, "checkout rejected: membership not active");
            return Err(LibraryError::UserNotEligible { user_id });
        }

        if ledger.available_copies() == 0 {
            debug!(%book_id, "checkout rejected: no copies available");
            return Err(LibraryError::Unavailable { book_id });
        }

        let issue = Issue::with_due_date(self.issues.next_id(), book_id, user_id, today, due_date);
        ledger.decrement_on_checkout(issue.id())?;
        if let Err(e) = self.issues.insert(issue.clone()) {
            ledger.increment_on_return(issue.id())?;
            return Err(e);
        }
        let available = ledger.available_copies();
        drop(user);
        drop(ledger);

        info!(
            issue_id = %issue.id(),
            %book_id,
            %user_id,
            due = %issue.due_date(),
            available,
            "book checked out"
        );
        Ok(issue)
    }

    /// Closes an open issue on `today`, fixing its fine and restoring the copy.
    ///
    /// # Errors
    ///
    /// Any error leaves every table unchanged.
    ///
    /// - [`LibraryError::NotFound`] - Unknown issue.
    /// - [`LibraryError::AlreadyReturned`] - Issue is already closed.
    /// - [`LibraryError::InvalidReturnDate`] - `today` is before the issue date.
    pub fn return_book(&self, issue_id: IssueId, today: NaiveDate) -> Result<Issue, LibraryError> {
        let issue = self
            .issues
            .get(issue_id)
            .ok_or_else(|| LibraryError::issue_not_found(issue_id))?;
        if !issue.is_open() {
            warn!(%issue_id, "return rejected: issue already closed");
            return Err(LibraryError::AlreadyReturned { issue_id });
        }

        let book_id = issue.book_id();
        // A book with copies on loan cannot be deleted, so a missing book
        // means a concurrent return closed this issue first.
        let Some(book) = self.books.get(&book_id) else {
            warn!(%issue_id, %book_id, "return rejected: issue closed concurrently");
            return Err(LibraryError::AlreadyReturned { issue_id });
        };
        let mut ledger = book.lock();

        let mut entry = self
            .issues
            .get_mut(issue_id)
            .ok_or_else(|| LibraryError::issue_not_found(issue_id))?;
        if !entry.is_open() {
            warn!(%issue_id, "return rejected: issue already closed");
            return Err(LibraryError::AlreadyReturned { issue_id });
        }
        if today < entry.issue_date() {
            return Err(LibraryError::InvalidReturnDate {
                issued: entry.issue_date(),
                returned: today,
            });
        }

        let fine = self.fine_policy.fine(entry.due_date(), today).inspect_err(|e| {
            warn!(%issue_id, error = %e, "return rejected: fine not computable");
        })?;
        ledger.increment_on_return(issue_id)?;
        entry.close(today, fine)?;
        let closed = entry.value().clone();
        let available = ledger.available_copies();
        drop(entry);
        drop(ledger);

        info!(%issue_id, %book_id, %fine, available, "book returned");
        Ok(closed)
    }

    pub fn get_issue(&self, issue_id: IssueId) -> Option<Issue> {
        self.issues.get(issue_id)
    }

    /// Every issue, open and closed, in checkout order.
    pub fn issues(&self) -> Vec<Issue> {
        self.issues.all()
    }

    /// Issues not yet returned, in checkout order.
    pub fn open_issues(&self) -> Vec<Issue> {
        self.issues.filter(Issue::is_open)
    }

    pub fn open_issues_for_user(&self, user_id: UserId) -> Vec<Issue> {
        self.issues
            .filter(|issue| issue.is_open() && issue.user_id() == user_id)
    }

    /// Open issues past their due date as of `today`.
    pub fn list_overdue(&self, today: NaiveDate) -> Vec<Issue> {
        self.issues.filter(|issue| issue.is_overdue(today))
    }

    /// The fine an issue would carry if returned `today`.
    ///
    /// Closed issues report the fine stored at return time.
    pub fn estimate_fine(&self, issue_id: IssueId, today: NaiveDate) -> Result<Decimal, LibraryError> {
        self.issues
            .get(issue_id)
            .ok_or_else(|| LibraryError::issue_not_found(issue_id))?
            .estimated_fine(&self.fine_policy, today)
    }

    // === Reporting ===

    /// Summary counts as of `today`.
    pub fn report_summary(&self, today: NaiveDate) -> ReportSummary {
        let issues = self.issues.all();
        let active_issues = issues.iter().filter(|issue| issue.is_open()).count();
        let overdue_count = issues.iter().filter(|issue| issue.is_overdue(today)).count();
        let fines_collected: Decimal = issues.iter().filter_map(Issue::fine).sum();

        ReportSummary {
            total_books: self.books.len(),
            total_users: self.users.len(),
            active_issues,
            overdue_count,
            fines_collected,
        }
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ids_are_assigned_sequentially() {
        let library = Library::new();
        let a = library.add_book(BookDetails::new("A", 1)).unwrap();
        let b = library.add_book(BookDetails::new("B", 1)).unwrap();
        assert_eq!((a.id, b.id), (BookId(1), BookId(2)));

        let u = library.add_user(UserDetails::new("Alice")).unwrap();
        assert_eq!(u.id, UserId(1));
    }

    #[test]
    fn duplicate_isbn_does_not_consume_an_id() {
        let library = Library::new();
        library
            .add_book(BookDetails::new("Clean Code", 1).with_isbn("9780132350884"))
            .unwrap();
        let dup = library.add_book(BookDetails::new("Copy", 1).with_isbn("9780132350884"));
        assert_eq!(dup, Err(LibraryError::DuplicateIsbn("9780132350884".into())));

        let next = library.add_book(BookDetails::new("Next", 1)).unwrap();
        assert_eq!(next.id, BookId(2));
    }

    #[test]
    fn isbn_moves_with_update() {
        let library = Library::new();
        let book = library
            .add_book(BookDetails::new("Clean Code", 1).with_isbn("111"))
            .unwrap();
        library
            .update_book(book.id, BookDetails::new("Clean Code", 1).with_isbn("222"))
            .unwrap();

        // The old ISBN is free again, the new one is taken.
        assert!(library.add_book(BookDetails::new("X", 1).with_isbn("111")).is_ok());
        assert!(matches!(
            library.add_book(BookDetails::new("Y", 1).with_isbn("222")),
            Err(LibraryError::DuplicateIsbn(_))
        ));
    }

    #[test]
    fn failed_update_keeps_isbn_index() {
        let library = Library::new();
        let book = library
            .add_book(BookDetails::new("Clean Code", 2).with_isbn("111"))
            .unwrap();
        let user = library.add_user(UserDetails::new("Alice")).unwrap();
        library.checkout(book.id, user.id, date(2024, 1, 1)).unwrap();
        library.checkout(book.id, user.id, date(2024, 1, 1)).unwrap();

        let result = library.update_book(book.id, BookDetails::new("Clean Code", 1).with_isbn("333"));
        assert_eq!(result, Err(LibraryError::InvalidCopies { total: 1, open: 2 }));

        // "333" was released, "111" still belongs to the book.
        assert!(library.add_book(BookDetails::new("X", 1).with_isbn("333")).is_ok());
        assert!(library.add_book(BookDetails::new("Y", 1).with_isbn("111")).is_err());
    }

    #[test]
    fn email_is_unique_and_released_on_delete() {
        let library = Library::new();
        let alice = library
            .add_user(UserDetails::new("Alice").with_email("a@example.org"))
            .unwrap();
        assert_eq!(
            library.add_user(UserDetails::new("Eve").with_email("a@example.org")),
            Err(LibraryError::DuplicateEmail("a@example.org".into()))
        );

        library.delete_user(alice.id).unwrap();
        assert!(
            library
                .add_user(UserDetails::new("Eve").with_email("a@example.org"))
                .is_ok()
        );
    }

    #[test]
    fn update_user_keeps_own_email() {
        let library = Library::new();
        let alice = library
            .add_user(UserDetails::new("Alice").with_email("a@example.org"))
            .unwrap();
        let updated = library
            .update_user(
                alice.id,
                UserDetails::new("Alice Smith").with_email("a@example.org"),
            )
            .unwrap();
        assert_eq!(updated.name, "Alice Smith");
        assert_eq!(updated.email.as_deref(), Some("a@example.org"));
    }
}
