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

//! Overdue fine calculation.
//!
//! Fines are a pure function of the due date, the return date, and the daily
//! rate. Only whole calendar days count: returning on the due date, or any
//! day before it, costs nothing.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::LibraryError;
use crate::config::LoanPolicy;

/// Number of calendar days `return_date` falls after `due_date`, floored at zero.
pub fn overdue_days(due_date: NaiveDate, return_date: NaiveDate) -> u32 {
    let days = (return_date - due_date).num_days().max(0);
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Converts overdue duration into a fine at a fixed daily rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinePolicy {
    rate_per_day: Decimal,
}

impl FinePolicy {
    pub fn new(rate_per_day: Decimal) -> Self {
        Self { rate_per_day }
    }

    pub fn rate_per_day(&self) -> Decimal {
        self.rate_per_day
    }

    /// Fine owed for a copy due on `due_date` and returned on `return_date`.
    ///
    /// # Errors
    ///
    /// [`LibraryError::FineOverflow`] if the product exceeds the decimal range.
    pub fn fine(&self, due_date: NaiveDate, return_date: NaiveDate) -> Result<Decimal, LibraryError> {
        let days = overdue_days(due_date, return_date);
        Decimal::from(days)
            .checked_mul(self.rate_per_day)
            .ok_or(LibraryError::FineOverflow { overdue_days: days })
    }
}

impl From<&LoanPolicy> for FinePolicy {
    fn from(policy: &LoanPolicy) -> Self {
        Self::new(policy.fine_rate_per_day)
    }
}

impl Default for FinePolicy {
    fn default() -> Self {
        Self::new(LoanPolicy::DEFAULT_FINE_RATE_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn on_time_return_has_no_overdue_days() {
        assert_eq!(overdue_days(date(2024, 5, 15), date(2024, 5, 15)), 0);
        assert_eq!(overdue_days(date(2024, 5, 15), date(2024, 5, 1)), 0);
    }

    #[test]
    fn late_return_counts_calendar_days() {
        assert_eq!(overdue_days(date(2024, 5, 15), date(2024, 5, 16)), 1);
        assert_eq!(overdue_days(date(2024, 5, 15), date(2024, 6, 15)), 31);
    }

    #[test]
    fn overdue_days_cross_leap_day() {
        assert_eq!(overdue_days(date(2024, 2, 27), date(2024, 3, 1)), 3);
        assert_eq!(overdue_days(date(2023, 2, 27), date(2023, 3, 1)), 2);
    }

    #[test]
    fn fine_is_zero_when_not_overdue() {
        let policy = FinePolicy::new(dec!(1.50));
        assert_eq!(policy.fine(date(2024, 1, 10), date(2024, 1, 10)).unwrap(), Decimal::ZERO);
        assert_eq!(policy.fine(date(2024, 1, 10), date(2024, 1, 2)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn fine_scales_with_days_late() {
        let policy = FinePolicy::new(dec!(0.75));
        assert_eq!(policy.fine(date(2024, 1, 10), date(2024, 1, 11)).unwrap(), dec!(0.75));
        assert_eq!(policy.fine(date(2024, 1, 10), date(2024, 1, 16)).unwrap(), dec!(4.50));
    }

    #[test]
    fn default_rate_matches_loan_policy() {
        let from_policy = FinePolicy::from(&LoanPolicy::default());
        assert_eq!(from_policy, FinePolicy::default());
        assert_eq!(from_policy.rate_per_day(), dec!(1.00));
    }

    #[test]
    fn fine_overflow_is_an_error() {
        let policy = FinePolicy::new(Decimal::MAX);
        assert_eq!(policy.fine(date(2024, 1, 10), date(2024, 1, 10)), Ok(Decimal::ZERO));
        assert_eq!(
            policy.fine(date(2024, 1, 10), date(2024, 1, 12)),
            Err(LibraryError::FineOverflow { overdue_days: 2 })
        );
    }
}
