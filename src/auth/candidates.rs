//! Candidate enumeration: every rule that might grant a right to a user in
//! a given context.

use postgres_types::ToSql;
use rust_decimal::Decimal;
use tokio_postgres::{GenericClient, Row};

use crate::{model::{Key, RightType}, prelude::*};

use super::closure::GroupClosure;


/// Display name of the Global Context in traces and reasons.
pub const GLOBAL_CONTEXT: &str = "Global";

/// Where a candidate rule comes from: a direct assignment on the user, or an
/// assignment on a group the user (transitively) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    User,
    Group,
}

/// One enumerated rule that could, absent stronger rules, grant a right.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source_kind: SourceKind,
    pub source_id: Key,
    /// Login of the user or name of the group the assignment sits on.
    pub source_name: String,
    pub role: String,
    /// Name of the specific context, or `None` for the Global Context.
    pub context: Option<String>,
    pub right: String,
    pub right_type: RightType,
    /// Raw stored value for range rights, propagated verbatim.
    pub range_value: Option<Decimal>,
    /// Subgroup hops to the source group; always 0 for user sources.
    pub distance: u32,
}

impl Candidate {
    pub fn context_name(&self) -> &str {
        self.context.as_deref().unwrap_or(GLOBAL_CONTEXT)
    }

    pub(crate) fn is_specific(&self) -> bool {
        self.context.is_some()
    }
}

/// One row of either enumeration query: an assignment joined through its
/// role down to a single right.
#[derive(Debug, Clone)]
pub(crate) struct AssignmentRow {
    pub(crate) source_id: Key,
    pub(crate) source_name: String,
    pub(crate) role: String,
    pub(crate) context: Option<String>,
    pub(crate) right: String,
    pub(crate) right_type: RightType,
    pub(crate) range_value: Option<Decimal>,
}

impl AssignmentRow {
    fn from_row(row: Row) -> Self {
        Self {
            source_id: row.get("source_id"),
            source_name: row.get("source_name"),
            role: row.get("role_name"),
            context: row.get("context_name"),
            right: row.get("right_name"),
            right_type: row.get("right_type"),
            range_value: row.get("range_value"),
        }
    }

    fn into_candidate(self, source_kind: SourceKind, distance: u32) -> Candidate {
        Candidate {
            source_kind,
            source_id: self.source_id,
            source_name: self.source_name,
            role: self.role,
            context: self.context,
            right: self.right,
            right_type: self.right_type,
            range_value: self.range_value,
            distance,
        }
    }
}

/// Whether the user holds at least one direct assignment for exactly this
/// context. Such an assignment is a per-context override: when one exists,
/// Global rules do not participate in resolution for this context at all.
pub(crate) async fn has_direct_context_assignment(
    db: &impl GenericClient,
    user: Key,
    context: Key,
) -> Result<bool> {
    let row = db.query_one(
        "select exists(\
            select 1 from role_manager_user_context_roles \
                where user_id = $1 and context_id = $2\
        )",
        &[&user, &context],
    ).await?;
    Ok(row.get(0))
}

/// Enumerates the user-sourced assignment rows: every role assigned to the
/// user itself in the given context or globally, expanded to one row per
/// right of the role. `None` as context means "Global only".
pub(crate) async fn user_rows(
    db: &impl GenericClient,
    user: Key,
    context: Option<Key>,
    right: Option<&str>,
) -> Result<Vec<AssignmentRow>> {
    let mut query = "\
        select u.id as source_id, u.login as source_name, r.name as role_name, \
            c.name as context_name, ri.name as right_name, ri.right_type, rr.range_value \
        from role_manager_user_context_roles a \
        join role_manager_users u on u.id = a.user_id \
        join role_manager_roles r on r.id = a.role_id \
        join role_manager_role_rights rr on rr.role_id = a.role_id \
        join role_manager_rights ri on ri.id = rr.right_id \
        left join role_manager_contexts c on c.id = a.context_id \
        where a.user_id = $1 and (a.context_id = $2 or a.context_id is null)".to_owned();

    let mut params: Vec<&(dyn ToSql + Sync)> = vec![&user, &context];
    if let Some(right) = &right {
        query.push_str(" and ri.name = $3");
        params.push(right);
    }

    let rows = db.query(&query, &params).await?;
    Ok(rows.into_iter().map(AssignmentRow::from_row).collect())
}

/// Enumerates the group-sourced assignment rows for the given groups (the
/// user's membership closure), under the same context constraint as
/// [`user_rows`].
pub(crate) async fn group_rows(
    db: &impl GenericClient,
    groups: &[Key],
    context: Option<Key>,
    right: Option<&str>,
) -> Result<Vec<AssignmentRow>> {
    if groups.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = "\
        select g.id as source_id, g.name as source_name, r.name as role_name, \
            c.name as context_name, ri.name as right_name, ri.right_type, rr.range_value \
        from role_manager_group_context_roles a \
        join role_manager_groups g on g.id = a.group_id \
        join role_manager_roles r on r.id = a.role_id \
        join role_manager_role_rights rr on rr.role_id = a.role_id \
        join role_manager_rights ri on ri.id = rr.right_id \
        left join role_manager_contexts c on c.id = a.context_id \
        where a.group_id = any($1) and (a.context_id = $2 or a.context_id is null)".to_owned();

    let groups = groups.to_vec();
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![&groups, &context];
    if let Some(right) = &right {
        query.push_str(" and ri.name = $3");
        params.push(right);
    }

    let rows = db.query(&query, &params).await?;
    Ok(rows.into_iter().map(AssignmentRow::from_row).collect())
}

/// Tags the enumerated rows with source kind and group distance. Group rows
/// whose group is not in the closure are dropped (they can only appear if
/// the memberships changed between the queries; the next request sees the
/// consistent state).
pub(crate) fn from_rows(
    user_rows: Vec<AssignmentRow>,
    group_rows: Vec<AssignmentRow>,
    closure: &GroupClosure,
) -> Vec<Candidate> {
    user_rows.into_iter()
        .map(|row| row.into_candidate(SourceKind::User, 0))
        .chain(group_rows.into_iter().filter_map(|row| {
            let distance = closure.distance(row.source_id)?;
            Some(row.into_candidate(SourceKind::Group, distance))
        }))
        .collect()
}
