//! The persisted entities and the small value types shared across the crate.

use bytes::BytesMut;
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::Row;


/// Our primary ID type, which we call "key". In the database, it's a `bigint`
/// (`i64`), but we have a separate Rust type for it so ids of different
/// entities don't silently mix with counts and other integers. Implements
/// `ToSql` and `FromSql` by delegating to `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub i64);

impl ToSql for Key {
    fn to_sql(
        &self,
        ty: &postgres_types::Type,
        out: &mut BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        self.0.to_sql(ty, out)
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    postgres_types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Key {
    fn from_sql(
        ty: &postgres_types::Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        i64::from_sql(ty, raw).map(Key)
    }

    fn accepts(ty: &postgres_types::Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}


/// Kind of a right: a plain yes/no permission or a numeric scale.
///
/// Represents the `right_type` Postgres enum from `rolemanager-create.sql`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSql, ToSql, Serialize, Deserialize)]
#[postgres(name = "right_type")]
#[serde(rename_all = "lowercase")]
pub enum RightType {
    #[postgres(name = "boolean")]
    Boolean,
    #[postgres(name = "range")]
    Range,
}

/// The value a resolved right carries. Boolean rights always resolve to
/// `Bool(true)`; a denied right is simply absent from the resolved map, so
/// there is never a `Bool(false)` entry. Range rights carry the raw stored
/// value of the winning rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RightValue {
    Bool(bool),
    Range(Decimal),
}

impl RightValue {
    /// The numeric value, if this is a range right.
    pub fn as_range(&self) -> Option<Decimal> {
        match self {
            Self::Range(v) => Some(*v),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for RightValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Range(v) => v.fmt(f),
        }
    }
}


/// A user account. The password hash is deliberately not part of this type;
/// it never leaves the authentication path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Key,
    pub login: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub(crate) const COLS: &'static str = "id, login, email, first_name, last_name";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            login: row.get("login"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
        }
    }
}

/// A group of users. Groups can nest via subgroup edges; the edge set always
/// forms a directed acyclic graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: Key,
    pub name: String,
    pub description: Option<String>,
}

impl Group {
    pub(crate) const COLS: &'static str = "id, name, description";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
        }
    }
}

/// A named collection of rights, purely organisational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RightGroup {
    pub id: Key,
    pub name: String,
}

impl RightGroup {
    pub(crate) const COLS: &'static str = "id, name";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self { id: row.get("id"), name: row.get("name") }
    }
}

/// The bounds a range right's values must stay within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RightTypeRange {
    pub id: Key,
    pub name: String,
    pub min_value: Decimal,
    pub max_value: Decimal,
}

impl RightTypeRange {
    pub(crate) const COLS: &'static str = "id, name, min_value, max_value";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            min_value: row.get("min_value"),
            max_value: row.get("max_value"),
        }
    }
}

/// An atomic permission. `range` is set iff `right_type` is `Range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Right {
    pub id: Key,
    pub name: String,
    pub rightgroup: Key,
    pub right_type: RightType,
    pub range: Option<Key>,
}

impl Right {
    pub(crate) const COLS: &'static str =
        "id, name, rightgroup_id, right_type, righttype_range_id";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            rightgroup: row.get("rightgroup_id"),
            right_type: row.get("right_type"),
            range: row.get("righttype_range_id"),
        }
    }
}

/// A reusable bundle of rights that can be assigned to users and groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: Key,
    pub name: String,
}

impl Role {
    pub(crate) const COLS: &'static str = "id, name";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self { id: row.get("id"), name: row.get("name") }
    }
}

/// A named scope for role assignments. The *Global Context* is not a row in
/// the context table but the absence of one (`context_id is null`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    pub id: Key,
    pub name: String,
}

impl Context {
    pub(crate) const COLS: &'static str = "id, name";

    pub(crate) fn from_row(row: &Row) -> Self {
        Self { id: row.get("id"), name: row.get("name") }
    }
}
