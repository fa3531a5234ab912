//! Administrative handlers for the persisted entities.
//!
//! One handler per entity, each a thin borrow of the shared engine context,
//! created through the corresponding [`RoleManager`](crate::RoleManager)
//! factory method. The handlers own all lifecycle rules: validation of
//! natural keys and values, conflict mapping for duplicates, dependency
//! protection on deletion, and the permissions version bump for every write
//! that can change a resolution outcome.

mod contexts;
mod groups;
mod rightgroups;
mod rights;
mod righttypes;
mod roles;
mod users;

pub use self::{
    contexts::Contexts,
    groups::{Groups, GroupUpdate, NewGroup},
    rightgroups::RightGroups,
    rights::{NewRight, RightUpdate, Rights},
    righttypes::{NewRange, RangeUpdate, RightTypes},
    roles::{RoleGrant, Roles},
    users::{NewUser, UserUpdate, Users},
};
