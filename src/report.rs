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

//! Dashboard summary counts.

use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Aggregate view of the library at a given date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub total_books: usize,
    pub total_users: usize,
    /// Issues not yet returned.
    pub active_issues: usize,
    /// Open issues whose due date has passed.
    pub overdue_count: usize,
    /// Sum of fines fixed on closed issues.
    pub fines_collected: Decimal,
}

impl ReportSummary {
    const DECIMAL_PRECISION: u32 = 2;
}

impl Serialize for ReportSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ReportSummary", 5)?;
        state.serialize_field("total_books", &self.total_books)?;
        state.serialize_field("total_users", &self.total_users)?;
        state.serialize_field("active_issues", &self.active_issues)?;
        state.serialize_field("overdue_count", &self.overdue_count)?;
        state.serialize_field(
            "fines_collected",
            &self
                .fines_collected
                .round_dp(ReportSummary::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
