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

//! Loan policy configuration.
//!
//! The policy is loaded from TOML. Every field has a default, so an empty
//! file yields the stock policy:
//!
//! ```toml
//! loan_period_days = 14
//! fine_rate_per_day = "1.00"
//! require_active_membership = true
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    /// The config file is not valid TOML for [`LoanPolicy`]
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is outside its valid range
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Lending rules applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoanPolicy {
    /// Days between issue date and due date.
    pub loan_period_days: u32,
    /// Fine charged per full day a return is late.
    pub fine_rate_per_day: Decimal,
    /// Reject checkouts by users whose membership is not active.
    pub require_active_membership: bool,
}

impl LoanPolicy {
    pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;
    pub const DEFAULT_FINE_RATE_PER_DAY: Decimal = dec!(1.00);
    /// Upper bound on the daily rate.
    pub const MAX_FINE_RATE_PER_DAY: Decimal = dec!(1000000);

    /// Parses and validates a policy from TOML text.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Parse`] on malformed TOML or unknown keys.
    /// - [`ConfigError::Validation`] if a value is out of range.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let policy: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reads a policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks every field is within its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loan_period_days == 0 {
            return Err(ConfigError::Validation(
                "loan_period_days must be at least 1".to_string(),
            ));
        }
        if self.fine_rate_per_day < Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "fine_rate_per_day must not be negative (got {})",
                self.fine_rate_per_day
            )));
        }
        if self.fine_rate_per_day > Self::MAX_FINE_RATE_PER_DAY {
            return Err(ConfigError::Validation(format!(
                "fine_rate_per_day must be at most {} (got {})",
                Self::MAX_FINE_RATE_PER_DAY,
                self.fine_rate_per_day
            )));
        }
        Ok(())
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: Self::DEFAULT_LOAN_PERIOD_DAYS,
            fine_rate_per_day: Self::DEFAULT_FINE_RATE_PER_DAY,
            require_active_membership: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.loan_period_days, 14);
        assert_eq!(policy.fine_rate_per_day, dec!(1.00));
        assert!(policy.require_active_membership);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let policy = LoanPolicy::from_toml_str("").unwrap();
        assert_eq!(policy, LoanPolicy::default());
    }

    #[test]
    fn parses_all_fields() {
        let policy = LoanPolicy::from_toml_str(
            r#"
            loan_period_days = 21
            fine_rate_per_day = "0.25"
            require_active_membership = false
            "#,
        )
        .unwrap();
        assert_eq!(policy.loan_period_days, 21);
        assert_eq!(policy.fine_rate_per_day, dec!(0.25));
        assert!(!policy.require_active_membership);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let policy = LoanPolicy::from_toml_str("loan_period_days = 7").unwrap();
        assert_eq!(policy.loan_period_days, 7);
        assert_eq!(policy.fine_rate_per_day, dec!(1.00));
    }

    #[test]
    fn zero_loan_period_is_rejected() {
        let result = LoanPolicy::from_toml_str("loan_period_days = 0");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_fine_rate_is_rejected() {
        let policy = LoanPolicy {
            fine_rate_per_day: dec!(-0.50),
            ..LoanPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn huge_fine_rate_is_rejected() {
        let result =
            LoanPolicy::from_toml_str("fine_rate_per_day = \"79228162514264337593543950335\"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let at_cap = LoanPolicy {
            fine_rate_per_day: LoanPolicy::MAX_FINE_RATE_PER_DAY,
            ..LoanPolicy::default()
        };
        assert!(at_cap.validate().is_ok());
    }

    #[test]
    fn zero_fine_rate_is_allowed() {
        let policy = LoanPolicy {
            fine_rate_per_day: Decimal::ZERO,
            ..LoanPolicy::default()
        };
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let result = LoanPolicy::from_toml_str("grace_days = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = LoanPolicy::load("/nonexistent/library-policy.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
