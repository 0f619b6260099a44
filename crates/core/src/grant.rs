//! The unit of REST authorization: one (user, resource, method) tuple.

use serde::{Deserialize, Serialize};

use crate::{MethodId, ResourceId, UserId};

/// "User may invoke `method_id` on `resource_id`."
///
/// Created and deleted as a whole; there are no partial updates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: UserId,
    pub resource_id: ResourceId,
    pub method_id: MethodId,
}

impl Grant {
    pub fn new(user_id: UserId, resource_id: ResourceId, method_id: MethodId) -> Self {
        Self {
            user_id,
            resource_id,
            method_id,
        }
    }
}

/// Outcome of checking that every entity a [`Grant`] references exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantCheck {
    AllExist,
    UserMissing,
    ResourceMissing,
    MethodMissing,
}

impl GrantCheck {
    /// Decode the status code returned by the `check_user_rest_permission` routine.
    ///
    /// Returns `None` for codes the routine is not documented to produce.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(GrantCheck::AllExist),
            -1 => Some(GrantCheck::UserMissing),
            -2 => Some(GrantCheck::ResourceMissing),
            -3 => Some(GrantCheck::MethodMissing),
            _ => None,
        }
    }

    pub fn all_exist(&self) -> bool {
        matches!(self, GrantCheck::AllExist)
    }
}

impl core::fmt::Display for GrantCheck {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GrantCheck::AllExist => write!(f, "all referenced entities exist"),
            GrantCheck::UserMissing => write!(f, "user does not exist"),
            GrantCheck::ResourceMissing => write!(f, "resource does not exist"),
            GrantCheck::MethodMissing => write!(f, "method does not exist"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_routine_codes() {
        assert_eq!(GrantCheck::from_code(1), Some(GrantCheck::AllExist));
        assert_eq!(GrantCheck::from_code(-1), Some(GrantCheck::UserMissing));
        assert_eq!(GrantCheck::from_code(-2), Some(GrantCheck::ResourceMissing));
        assert_eq!(GrantCheck::from_code(-3), Some(GrantCheck::MethodMissing));
        assert_eq!(GrantCheck::from_code(0), None);
        assert_eq!(GrantCheck::from_code(-4), None);
    }
}
