use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::User;

/// Role
///
/// The closed set of roles a user can hold. Ordering follows the hierarchy
/// `User < Moderator < Admin`, so `RoleSet::highest` is a plain max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "MOD")]
    Moderator,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moderator => "MOD",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "MOD" => Ok(Role::Moderator),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// RoleSet
///
/// Multi-valued role assignment of a user. A user may hold `MOD` without
/// `USER`, or `ADMIN` without `MOD`; the capability queries below treat the
/// set as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    /// The role set every freshly registered account receives.
    pub fn user() -> Self {
        Self::new([Role::User])
    }

    /// Parses the raw string list stored alongside the user. Unknown names are rejected.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, String> {
        raw.iter()
            .map(|name| name.as_ref().parse::<Role>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// MOD or ADMIN.
    pub fn is_moderator(&self) -> bool {
        self.has_role(Role::Moderator) || self.has_role(Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Holds moderation power without being an admin.
    pub fn is_moderator_only(&self) -> bool {
        self.is_moderator() && !self.is_admin()
    }

    pub fn highest(&self) -> Option<Role> {
        self.0.iter().max().copied()
    }

    pub fn insert(&mut self, role: Role) {
        self.0.insert(role);
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Role> {
        self.iter().collect()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// The "not banned" sentinel stored in `banned_until`.
pub fn not_banned() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Identity
///
/// Immutable snapshot of a user taken at decision time. Both the actor and the
/// target of an authorization decision are represented this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub roles: RoleSet,
    pub banned_until: DateTime<Utc>,
}

impl Identity {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.has_role(role)
    }

    pub fn is_moderator(&self) -> bool {
        self.roles.is_moderator()
    }

    pub fn is_admin(&self) -> bool {
        self.roles.is_admin()
    }

    /// True iff `banned_until` lies strictly after `now`.
    pub fn is_banned<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.banned_until > now.with_timezone(&Utc)
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            id: user.id,
            username: user.username.clone(),
            roles: user.roles.clone(),
            banned_until: user.banned_until,
        }
    }
}
