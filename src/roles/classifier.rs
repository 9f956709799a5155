//! Deterministic role classifier.
//!
//! Classification is a pure function of the raw role set: each token is
//! normalized, looked up in a fixed table, and the mapped role with the
//! highest precedence wins. Unknown tokens are skipped, and a user with no
//! recognised role is a student.

use crate::models::{CanonicalRole, RawRole};
use tracing::debug;

/// Normalized LMS role tokens and the canonical role each one maps to.
const ROLE_TABLE: &[(&str, CanonicalRole)] = &[
    // Site-level
    ("admin", CanonicalRole::Admin),
    ("administrator", CanonicalRole::Admin),
    ("siteadmin", CanonicalRole::Admin),
    ("manager", CanonicalRole::Admin),
    // Company / school tenancy
    ("companymanager", CanonicalRole::SchoolAdmin),
    ("companydepartmentmanager", CanonicalRole::SchoolAdmin),
    ("clientadministrator", CanonicalRole::SchoolAdmin),
    ("schooladmin", CanonicalRole::SchoolAdmin),
    ("school_admin", CanonicalRole::SchoolAdmin),
    // Course-level teaching
    ("editingteacher", CanonicalRole::Teacher),
    ("teacher", CanonicalRole::Teacher),
    ("noneditingteacher", CanonicalRole::Teacher),
    ("companycourseeditor", CanonicalRole::Teacher),
    ("companycoursenoneditor", CanonicalRole::Teacher),
    // Learners
    ("student", CanonicalRole::Student),
    ("guest", CanonicalRole::Student),
    ("user", CanonicalRole::Student),
    ("companyuser", CanonicalRole::Student),
];

/// Trim and case-fold a role token.
pub fn normalize(token: &str) -> String {
    token.trim().to_lowercase()
}

/// Look up a single token in the role table.
pub fn lookup(token: &str) -> Option<CanonicalRole> {
    let normalized = normalize(token);
    ROLE_TABLE
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, role)| *role)
}

/// Map one raw role to a canonical role.
///
/// The short name is authoritative; the display name is only consulted
/// when the short name is blank.
pub fn map_role(raw: &RawRole) -> Option<CanonicalRole> {
    let token = if raw.shortname.trim().is_empty() {
        &raw.name
    } else {
        &raw.shortname
    };

    let mapped = lookup(token);
    if mapped.is_none() {
        debug!("Skipping unmapped role token '{}' (id {})", token, raw.id);
    }
    mapped
}

/// Classify a user's raw roles into one canonical role.
///
/// Precedence, not order, decides: `admin > school_admin > teacher > student`.
/// Never fails; returns [`CanonicalRole::Student`] when nothing maps.
pub fn classify(raw_roles: &[RawRole]) -> CanonicalRole {
    raw_roles
        .iter()
        .filter_map(map_role)
        .max()
        .unwrap_or(CanonicalRole::Student)
}
