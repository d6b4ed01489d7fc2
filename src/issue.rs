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

//! Issue (loan) records.
//!
//! An issue follows a single transition:
//!
//! ```text
//! Open ──return──► Closed (return date + fine fixed)
//! ```
//!
//! Issues are only created open, by checkout. Once closed, nothing about the
//! record changes again, so a fine stays what it was on the day of return.

use crate::LibraryError;
use crate::base::{BookId, IssueId, UserId};
use crate::fine::FinePolicy;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Open,
    Closed,
}

/// A single loan of one copy of a book to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    id: IssueId,
    book_id: BookId,
    user_id: UserId,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    fine: Option<Decimal>,
}

impl Issue {
    /// Creates an open issue due `loan_days` after `issue_date`.
    ///
    /// # Errors
    ///
    /// [`LibraryError::InvalidLoanPeriod`] if `loan_days` is zero or the due
    /// date falls outside the calendar range.
    pub fn open(
        id: IssueId,
        book_id: BookId,
        user_id: UserId,
        issue_date: NaiveDate,
        loan_days: u32,
    ) -> Result<Self, LibraryError> {
        let due_date = Self::due_date_for(issue_date, loan_days)?;
        Ok(Self::with_due_date(id, book_id, user_id, issue_date, due_date))
    }

    /// The due date of a loan of `loan_days` starting on `issue_date`.
    pub(crate) fn due_date_for(
        issue_date: NaiveDate,
        loan_days: u32,
    ) -> Result<NaiveDate, LibraryError> {
        if loan_days == 0 {
            return Err(LibraryError::InvalidLoanPeriod);
        }
        issue_date
            .checked_add_days(Days::new(u64::from(loan_days)))
            .ok_or(LibraryError::InvalidLoanPeriod)
    }

    pub(crate) fn with_due_date(
        id: IssueId,
        book_id: BookId,
        user_id: UserId,
        issue_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            book_id,
            user_id,
            issue_date,
            due_date,
            return_date: None,
            fine: None,
        }
    }

    pub fn id(&self) -> IssueId {
        self.id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    /// `None` while the issue is open.
    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    /// The fine fixed at return time; `None` while the issue is open.
    pub fn fine(&self) -> Option<Decimal> {
        self.fine
    }

    pub fn status(&self) -> IssueStatus {
        if self.return_date.is_some() {
            IssueStatus::Closed
        } else {
            IssueStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == IssueStatus::Open
    }

    /// Open and past its due date as of `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date < today
    }

    /// The fine this issue carries, or would carry if returned `today`.
    pub fn estimated_fine(
        &self,
        policy: &FinePolicy,
        today: NaiveDate,
    ) -> Result<Decimal, LibraryError> {
        match self.fine {
            Some(fine) => Ok(fine),
            None => policy.fine(self.due_date, today),
        }
    }

    /// Closes the issue with the given return date and fine.
    pub(crate) fn close(&mut self, return_date: NaiveDate, fine: Decimal) -> Result<(), LibraryError> {
        if !self.is_open() {
            return Err(LibraryError::AlreadyReturned { issue_id: self.id });
        }
        if return_date < self.issue_date {
            return Err(LibraryError::InvalidReturnDate {
                issued: self.issue_date,
                returned: return_date,
            });
        }
        self.return_date = Some(return_date);
        self.fine = Some(fine);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_issue() -> Issue {
        Issue::open(IssueId(1), BookId(1), UserId(1), date(2024, 1, 1), 14).unwrap()
    }

    #[test]
    fn open_sets_due_date_from_loan_period() {
        let issue = open_issue();
        assert_eq!(issue.due_date(), date(2024, 1, 15));
        assert_eq!(issue.status(), IssueStatus::Open);
        assert_eq!(issue.return_date(), None);
        assert_eq!(issue.fine(), None);
    }

    #[test]
    fn zero_day_loan_is_rejected() {
        let result = Issue::open(IssueId(1), BookId(1), UserId(1), date(2024, 1, 1), 0);
        assert_eq!(result, Err(LibraryError::InvalidLoanPeriod));
    }

    #[test]
    fn close_records_return_and_fine() {
        let mut issue = open_issue();
        issue.close(date(2024, 1, 20), dec!(5)).unwrap();
        assert_eq!(issue.status(), IssueStatus::Closed);
        assert_eq!(issue.return_date(), Some(date(2024, 1, 20)));
        assert_eq!(issue.fine(), Some(dec!(5)));
    }

    #[test]
    fn closed_issue_cannot_close_again() {
        let mut issue = open_issue();
        issue.close(date(2024, 1, 10), Decimal::ZERO).unwrap();
        let result = issue.close(date(2024, 2, 1), dec!(17));
        assert_eq!(
            result,
            Err(LibraryError::AlreadyReturned {
                issue_id: IssueId(1)
            })
        );
        assert_eq!(issue.return_date(), Some(date(2024, 1, 10)));
        assert_eq!(issue.fine(), Some(Decimal::ZERO));
    }

    #[test]
    fn return_before_issue_date_is_rejected() {
        let mut issue = open_issue();
        let result = issue.close(date(2023, 12, 31), Decimal::ZERO);
        assert!(matches!(result, Err(LibraryError::InvalidReturnDate { .. })));
        assert!(issue.is_open());
    }

    #[test]
    fn overdue_only_while_open_and_past_due() {
        let mut issue = open_issue();
        assert!(!issue.is_overdue(date(2024, 1, 15)));
        assert!(issue.is_overdue(date(2024, 1, 16)));

        issue.close(date(2024, 1, 30), dec!(15)).unwrap();
        assert!(!issue.is_overdue(date(2024, 2, 1)));
    }

    #[test]
    fn estimated_fine_is_fixed_after_close() {
        let policy = FinePolicy::new(dec!(1));
        let mut issue = open_issue();
        assert_eq!(issue.estimated_fine(&policy, date(2024, 1, 18)), Ok(dec!(3)));

        issue.close(date(2024, 1, 18), dec!(3)).unwrap();
        let doubled = FinePolicy::new(dec!(2));
        assert_eq!(issue.estimated_fine(&doubled, date(2024, 3, 1)), Ok(dec!(3)));
    }
}
