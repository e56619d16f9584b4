//! Capability-based authorization.
//!
//! One evaluation function takes (actor, action, resource) and answers
//! allow/deny from explicit per-role capability sets. Anonymous denials
//! surface as 401, authenticated ones as 403.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Catalog,
    Cart,
    /// `owner` is the order's owning actor when known; `None` means the
    /// whole collection.
    Order { owner: Option<Uuid> },
    Profile { owner: Uuid },
    StaleCarts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BrowseCatalog,
    ManageCatalog,
    UseCart,
    PlaceOrders,
    ViewOwnOrders,
    ViewAllOrders,
    ManageOwnProfile,
    ManageUsers,
    PurgeStaleCarts,
}

use Capability::*;

const ANONYMOUS: &[Capability] = &[BrowseCatalog, UseCart];

const CUSTOMER: &[Capability] = &[
    BrowseCatalog,
    UseCart,
    PlaceOrders,
    ViewOwnOrders,
    ManageOwnProfile,
];

const STAFF: &[Capability] = &[
    BrowseCatalog,
    ManageCatalog,
    UseCart,
    PlaceOrders,
    ViewOwnOrders,
    ViewAllOrders,
    ManageOwnProfile,
    ManageUsers,
    PurgeStaleCarts,
];

pub fn capabilities(actor: Option<&User>) -> &'static [Capability] {
    match actor {
        None => ANONYMOUS,
        Some(user) if user.role.is_staff() => STAFF,
        Some(_) => CUSTOMER,
    }
}

pub fn has(actor: Option<&User>, capability: Capability) -> bool {
    capabilities(actor).contains(&capability)
}

fn owned_by(actor: Option<&User>, owner: Option<Uuid>) -> bool {
    matches!((actor, owner), (Some(user), Some(id)) if user.id == id)
}

pub fn authorize(actor: Option<&User>, action: Action, resource: Resource) -> Result<()> {
    let needed = match (action, resource) {
        (Action::Read, Resource::Catalog) => BrowseCatalog,
        (_, Resource::Catalog) => ManageCatalog,
        (_, Resource::Cart) => UseCart,
        (Action::Create, Resource::Order { .. }) => PlaceOrders,
        (Action::Read, Resource::Order { owner }) if owned_by(actor, owner) => ViewOwnOrders,
        (_, Resource::Order { .. }) => ViewAllOrders,
        (_, Resource::Profile { owner }) if owned_by(actor, Some(owner)) => ManageOwnProfile,
        (_, Resource::Profile { .. }) => ManageUsers,
        (_, Resource::StaleCarts) => PurgeStaleCarts,
    };

    if has(actor, needed) {
        Ok(())
    } else if actor.is_none() {
        Err(Error::NotAuthenticated)
    } else {
        Err(Error::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            id: Uuid::now_v7(),
            username: "u".into(),
            email: "u@example.com".into(),
            password_digest: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_browses_but_cannot_manage_catalog() {
        assert!(authorize(None, Action::Read, Resource::Catalog).is_ok());
        let err = authorize(None, Action::Create, Resource::Catalog).unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[test]
    fn test_customer_cannot_manage_catalog() {
        let customer = user(Role::Customer);
        let err = authorize(Some(&customer), Action::Update, Resource::Catalog).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));
    }

    #[test]
    fn test_staff_manages_catalog() {
        let staff = user(Role::Staff);
        assert!(authorize(Some(&staff), Action::Delete, Resource::Catalog).is_ok());
        let admin = user(Role::Admin);
        assert!(authorize(Some(&admin), Action::Create, Resource::Catalog).is_ok());
    }

    #[test]
    fn test_anyone_uses_their_cart() {
        let customer = user(Role::Customer);
        assert!(authorize(None, Action::Create, Resource::Cart).is_ok());
        assert!(authorize(Some(&customer), Action::Create, Resource::Cart).is_ok());
    }

    #[test]
    fn test_checkout_requires_authentication() {
        let err = authorize(None, Action::Create, Resource::Order { owner: None }).unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
        let customer = user(Role::Customer);
        assert!(
            authorize(Some(&customer), Action::Create, Resource::Order { owner: None }).is_ok()
        );
    }

    #[test]
    fn test_order_visibility_scoped_to_owner() {
        let customer = user(Role::Customer);
        let own = Resource::Order { owner: Some(customer.id) };
        let foreign = Resource::Order { owner: Some(Uuid::now_v7()) };
        assert!(authorize(Some(&customer), Action::Read, own).is_ok());
        assert!(matches!(
            authorize(Some(&customer), Action::Read, foreign),
            Err(Error::PermissionDenied)
        ));

        let staff = user(Role::Staff);
        assert!(authorize(Some(&staff), Action::Read, foreign).is_ok());
    }

    #[test]
    fn test_stale_cart_purge_is_staff_only() {
        let customer = user(Role::Customer);
        assert!(matches!(
            authorize(Some(&customer), Action::Delete, Resource::StaleCarts),
            Err(Error::PermissionDenied)
        ));
        let staff = user(Role::Staff);
        assert!(authorize(Some(&staff), Action::Delete, Resource::StaleCarts).is_ok());
    }
}
