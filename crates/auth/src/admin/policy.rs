//! Invariants every identity mutation must respect.
//!
//! These are pure checks over a snapshot of the tenant's identities; the
//! service runs them before any write is issued.

use parish_core::IdentityId;

use crate::{AuthError, Profile, Role};

/// Reject a mutation that would leave the tenant with no administrator-equivalent
/// identity.
///
/// `replacement` is the target's profile after the edit, or `None` for a delete.
/// A tenant that already has no administrator is not made worse by unrelated
/// edits, so only mutations that remove the last one are rejected.
pub fn ensure_administrator_retained(
    members: &[Profile],
    target_id: IdentityId,
    replacement: Option<&Profile>,
) -> Result<(), AuthError> {
    let before = members
        .iter()
        .filter(|p| p.is_administrator_equivalent())
        .count();

    let after = members
        .iter()
        .filter(|p| p.id != target_id)
        .filter(|p| p.is_administrator_equivalent())
        .count()
        + usize::from(replacement.is_some_and(Profile::is_administrator_equivalent));

    if before > 0 && after == 0 {
        Err(AuthError::LastAdministratorViolation)
    } else {
        Ok(())
    }
}

/// Deleting one's own identity is always refused.
pub fn ensure_not_self(actor_ids: &[IdentityId], target_id: IdentityId) -> Result<(), AuthError> {
    if actor_ids.contains(&target_id) {
        Err(AuthError::SelfDeletion)
    } else {
        Ok(())
    }
}

/// An actor may only hand out roles it holds itself.
pub fn ensure_can_grant(actor: &Profile, role: Role) -> Result<(), AuthError> {
    if actor.role.satisfies(role) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!(
            "role '{}' cannot grant role '{role}'",
            actor.role
        )))
    }
}

/// An actor may not modify an identity that outranks it.
pub fn ensure_not_outranked(actor: &Profile, target: &Profile) -> Result<(), AuthError> {
    ensure_can_grant(actor, target.role).map_err(|_| {
        AuthError::forbidden(format!(
            "role '{}' cannot modify a '{}'",
            actor.role, target.role
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Permission, PermissionSet};
    use parish_core::TenantId;
    use proptest::prelude::*;

    fn identity(tenant_id: TenantId, role: Role, permissions: PermissionSet) -> Profile {
        Profile {
            id: IdentityId::new(),
            tenant_id,
            email: format!("{role}@example.org"),
            display_name: role.to_string(),
            role,
            permissions,
        }
    }

    fn demoted(p: &Profile) -> Profile {
        Profile {
            role: Role::Member,
            permissions: PermissionSet::defaults_for(Role::Member),
            ..p.clone()
        }
    }

    #[test]
    fn revoking_the_only_manage_identities_flag_is_rejected() {
        let tenant = TenantId::new();
        let sole = identity(tenant, Role::Member, PermissionSet::ALL);
        let other = identity(tenant, Role::Member, PermissionSet::NONE);
        let members = vec![sole.clone(), other];

        let edited = Profile {
            permissions: sole.permissions.without(Permission::ManageIdentities),
            ..sole.clone()
        };
        assert_eq!(
            ensure_administrator_retained(&members, sole.id, Some(&edited)),
            Err(AuthError::LastAdministratorViolation)
        );
    }

    #[test]
    fn demotion_succeeds_when_another_administrator_exists() {
        let tenant = TenantId::new();
        let first = identity(tenant, Role::Admin, PermissionSet::ALL);
        let second = identity(
            tenant,
            Role::Member,
            PermissionSet::NONE.with(Permission::ManageIdentities),
        );
        let members = vec![first.clone(), second];

        assert!(ensure_administrator_retained(&members, first.id, Some(&demoted(&first))).is_ok());
        assert!(ensure_administrator_retained(&members, first.id, None).is_ok());
    }

    #[test]
    fn deleting_the_last_administrator_is_rejected() {
        let tenant = TenantId::new();
        let owner = identity(tenant, Role::Owner, PermissionSet::ALL);
        let members = vec![owner.clone(), identity(tenant, Role::Member, PermissionSet::NONE)];

        assert_eq!(
            ensure_administrator_retained(&members, owner.id, None),
            Err(AuthError::LastAdministratorViolation)
        );
    }

    #[test]
    fn self_deletion_is_always_rejected() {
        let me = IdentityId::new();
        assert_eq!(ensure_not_self(&[me], me), Err(AuthError::SelfDeletion));
        assert!(ensure_not_self(&[me], IdentityId::new()).is_ok());
    }

    #[test]
    fn admins_cannot_grant_or_touch_owners() {
        let tenant = TenantId::new();
        let admin = identity(tenant, Role::Admin, PermissionSet::ALL);
        let owner = identity(tenant, Role::Owner, PermissionSet::ALL);

        assert!(ensure_can_grant(&admin, Role::Owner).is_err());
        assert!(ensure_can_grant(&admin, Role::Admin).is_ok());
        assert!(ensure_not_outranked(&admin, &owner).is_err());
        assert!(ensure_not_outranked(&owner, &admin).is_ok());
    }

    fn any_profile(tenant: TenantId) -> impl Strategy<Value = Profile> {
        (
            prop::sample::select(Role::ALL.to_vec()),
            any::<[bool; 6]>(),
        )
            .prop_map(move |(role, flags)| {
                let mut permissions = PermissionSet::NONE;
                for (p, granted) in Permission::ALL.into_iter().zip(flags) {
                    permissions.set(p, granted);
                }
                identity(tenant, role, permissions)
            })
    }

    proptest! {
        /// Whatever the edit, an accepted mutation never empties a tenant that had an administrator.
        #[test]
        fn accepted_mutations_keep_an_administrator(
            (members, pick, replacement, delete) in prop::collection::vec(any_profile(TenantId::new()), 1..8)
                .prop_flat_map(|members| {
                    let len = members.len();
                    let tenant = members[0].tenant_id;
                    (Just(members), 0..len, any_profile(tenant), any::<bool>())
                })
        ) {
            let target = &members[pick];
            let replacement = Profile { id: target.id, ..replacement };
            let proposed = if delete { None } else { Some(&replacement) };

            let had_admin = members.iter().any(Profile::is_administrator_equivalent);
            if ensure_administrator_retained(&members, target.id, proposed).is_ok() && had_admin {
                let remaining = members
                    .iter()
                    .filter(|p| p.id != target.id)
                    .chain(proposed)
                    .any(Profile::is_administrator_equivalent);
                prop_assert!(remaining);
            }
        }
    }
}
