//! Role to capability lookup.
//!
//! Presentation code asks "may this role see X" here instead of matching
//! on roles itself.

use crate::models::CanonicalRole;
use serde::Serialize;
use std::fmt;

/// A dashboard feature gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Site-wide totals across every organisation.
    ViewSiteOverview,
    /// Headcounts and role distribution of users.
    ViewUserDirectory,
    /// Category / school structure.
    ViewOrganisation,
    /// Completion progress per course.
    ViewCourseProgress,
    /// Grades and pass rates.
    ViewGradebook,
    /// The caller's own enrolments and progress.
    ViewOwnProgress,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ViewSiteOverview => "Site overview",
            Capability::ViewUserDirectory => "User directory",
            Capability::ViewOrganisation => "Organisation",
            Capability::ViewCourseProgress => "Course progress",
            Capability::ViewGradebook => "Gradebook",
            Capability::ViewOwnProgress => "Own progress",
        };
        f.write_str(name)
    }
}

const ADMIN: &[Capability] = &[
    Capability::ViewSiteOverview,
    Capability::ViewUserDirectory,
    Capability::ViewOrganisation,
    Capability::ViewCourseProgress,
    Capability::ViewGradebook,
];

const SCHOOL_ADMIN: &[Capability] = &[
    Capability::ViewUserDirectory,
    Capability::ViewOrganisation,
    Capability::ViewCourseProgress,
];

const TEACHER: &[Capability] = &[Capability::ViewCourseProgress, Capability::ViewGradebook];

const STUDENT: &[Capability] = &[Capability::ViewOwnProgress];

/// The capability set granted to a role.
pub fn capabilities(role: CanonicalRole) -> &'static [Capability] {
    match role {
        CanonicalRole::Admin => ADMIN,
        CanonicalRole::SchoolAdmin => SCHOOL_ADMIN,
        CanonicalRole::Teacher => TEACHER,
        CanonicalRole::Student => STUDENT,
    }
}

impl CanonicalRole {
    /// Whether this role grants `capability`.
    pub fn can(self, capability: Capability) -> bool {
        capabilities(self).contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_sees_everything_but_own_progress() {
        assert!(CanonicalRole::Admin.can(Capability::ViewSiteOverview));
        assert!(CanonicalRole::Admin.can(Capability::ViewGradebook));
        assert!(!CanonicalRole::Admin.can(Capability::ViewOwnProgress));
    }

    #[test]
    fn test_school_admin_has_no_site_overview() {
        assert!(!CanonicalRole::SchoolAdmin.can(Capability::ViewSiteOverview));
        assert!(CanonicalRole::SchoolAdmin.can(Capability::ViewOrganisation));
    }

    #[test]
    fn test_student_only_sees_own_progress() {
        assert_eq!(
            capabilities(CanonicalRole::Student),
            &[Capability::ViewOwnProgress]
        );
    }

    #[test]
    fn test_every_role_has_a_capability() {
        for role in CanonicalRole::ALL {
            assert!(!capabilities(role).is_empty(), "{} has none", role);
        }
    }
}
