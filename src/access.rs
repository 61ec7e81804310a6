//! Who may see or change an invoice
use crate::config::GroupAccess;
use crate::error::InvoiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// The authenticated user on whose behalf an operation runs. Resolved by the
/// caller from its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub group_id: Option<String>,
}

/// Ownership fields of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership<'a> {
    pub created_by_id: &'a str,
    pub group_id: Option<&'a str>,
}

impl Actor {
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            group_id: None,
        }
    }
    pub fn user(id: impl Into<String>, group_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            group_id,
        }
    }
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
    fn shares_group(&self, owner: &Ownership<'_>) -> bool {
        match (self.group_id.as_deref(), owner.group_id) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

pub fn can_access(
    actor: &Actor,
    owner: &Ownership<'_>,
    mode: AccessMode,
    group_access: GroupAccess,
) -> bool {
    if actor.is_admin() || actor.id == owner.created_by_id {
        return true;
    }
    if !actor.shares_group(owner) {
        return false;
    }
    match (mode, group_access) {
        (AccessMode::Read, _) | (AccessMode::Write, GroupAccess::ReadWrite) => true,
        (AccessMode::Write, GroupAccess::ReadOnly) => false,
    }
}

pub fn authorize(
    actor: &Actor,
    owner: &Ownership<'_>,
    mode: AccessMode,
    group_access: GroupAccess,
) -> Result<(), InvoiceError> {
    if can_access(actor, owner, mode, group_access) {
        return Ok(());
    }

    tracing::warn!(actor = %actor.id, ?mode, owner = owner.created_by_id, "invoice access denied");
    Err(InvoiceError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Ownership<'static> = Ownership {
        created_by_id: "user_a",
        group_id: Some("grp_1"),
    };

    #[test]
    fn admin_sees_everything() {
        let admin = Actor::admin("root");
        assert!(can_access(&admin, &OWNER, AccessMode::Write, GroupAccess::ReadOnly));
    }

    #[test]
    fn creator_without_group_keeps_access() {
        let owner = Ownership {
            created_by_id: "user_a",
            group_id: None,
        };
        let creator = Actor::user("user_a", None);
        assert!(can_access(&creator, &owner, AccessMode::Write, GroupAccess::ReadWrite));
    }

    #[test]
    fn group_members_follow_group_policy() {
        let member = Actor::user("user_b", Some("grp_1".into()));

        assert!(can_access(&member, &OWNER, AccessMode::Write, GroupAccess::ReadWrite));
        assert!(can_access(&member, &OWNER, AccessMode::Read, GroupAccess::ReadOnly));
        assert!(!can_access(&member, &OWNER, AccessMode::Write, GroupAccess::ReadOnly));
    }

    #[test]
    fn missing_groups_never_match() {
        let owner = Ownership {
            created_by_id: "user_a",
            group_id: None,
        };
        let stranger = Actor::user("user_c", None);

        assert!(matches!(
            authorize(&stranger, &owner, AccessMode::Read, GroupAccess::ReadWrite),
            Err(InvoiceError::Forbidden)
        ));
    }
}
