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

//! Registered library users.

use crate::LibraryError;
use crate::base::UserId;
use serde::{Deserialize, Serialize};

/// Membership state of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl MembershipStatus {
    /// Whether a user in this state may check out books.
    pub fn can_borrow(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Editable user fields, used both to register and to update a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: MembershipStatus,
}

impl UserDetails {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }

    /// Trims fields and rejects a blank name. A blank email becomes `None`.
    pub(crate) fn normalized(self) -> Result<Self, LibraryError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        Ok(Self {
            name,
            email,
            status: self.status,
        })
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub status: MembershipStatus,
}

impl User {
    pub(crate) fn new(id: UserId, details: UserDetails) -> Self {
        Self {
            id,
            name: details.name,
            email: details.email,
            status: details.status,
        }
    }

    pub(crate) fn apply(&mut self, details: UserDetails) {
        self.name = details.name;
        self.email = details.email;
        self.status = details.status;
    }
}
