//! Data models for the dashboard engine.
//!
//! This module contains the records decoded from the LMS, the canonical
//! role type, per-source fetch outcomes and the aggregated view model.

use crate::error::UnknownRole;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A role assignment exactly as the LMS reports it.
///
/// A user may carry several at once (e.g. a course role and a company role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRoleRecord")]
pub struct RawRole {
    pub shortname: String,
    pub name: String,
    /// Role id; decoded from `roleid` when present, otherwise from `id`.
    pub id: String,
}

// Some functions send `roleid`, others `id`, and a few send both with the
// assignment id in `id`.
#[derive(Deserialize)]
struct RawRoleRecord {
    #[serde(default)]
    shortname: String,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    roleid: String,
}

impl From<RawRoleRecord> for RawRole {
    fn from(record: RawRoleRecord) -> Self {
        let id = if record.roleid.is_empty() {
            record.id
        } else {
            record.roleid
        };
        Self {
            shortname: record.shortname,
            name: record.name,
            id,
        }
    }
}

impl RawRole {
    /// Build a role from its short name alone.
    pub fn new(shortname: &str) -> Self {
        Self {
            shortname: shortname.to_string(),
            name: String::new(),
            id: String::new(),
        }
    }
}

/// The single application-level role derived from a user's raw roles.
///
/// Variants are declared in ascending precedence so `Ord` follows
/// `admin > school_admin > teacher > student`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalRole {
    Student,
    Teacher,
    SchoolAdmin,
    Admin,
}

impl CanonicalRole {
    pub const ALL: [CanonicalRole; 4] = [
        CanonicalRole::Admin,
        CanonicalRole::SchoolAdmin,
        CanonicalRole::Teacher,
        CanonicalRole::Student,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalRole::Student => "student",
            CanonicalRole::Teacher => "teacher",
            CanonicalRole::SchoolAdmin => "school_admin",
            CanonicalRole::Admin => "admin",
        }
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalRole::Student => "Student",
            CanonicalRole::Teacher => "Teacher",
            CanonicalRole::SchoolAdmin => "School Admin",
            CanonicalRole::Admin => "Administrator",
        }
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(CanonicalRole::Student),
            "teacher" => Ok(CanonicalRole::Teacher),
            "school_admin" | "schooladmin" => Ok(CanonicalRole::SchoolAdmin),
            "admin" => Ok(CanonicalRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmsUser {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    /// Unix seconds of the last access; 0 means never.
    #[serde(default)]
    pub lastaccess: i64,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub suspended: bool,
}

/// A course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub categoryid: i64,
    #[serde(default = "default_true", deserialize_with = "bool_or_int")]
    pub visible: bool,
    #[serde(default)]
    pub startdate: i64,
    /// Mean learner feedback rating, when the LMS collects one.
    #[serde(default)]
    pub rating: Option<f64>,
}

impl Course {
    /// Display name, falling back to the short name.
    pub fn display_name(&self) -> &str {
        if self.fullname.is_empty() {
            &self.shortname
        } else {
            &self.fullname
        }
    }
}

/// A course category (a school or department in multi-tenant setups).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: i64,
    #[serde(default)]
    pub coursecount: u32,
}

/// A user's enrolment in a course, with the roles held there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub userid: i64,
    pub courseid: i64,
    #[serde(default)]
    pub roles: Vec<RawRole>,
    #[serde(default)]
    pub lastaccess: i64,
}

/// Course completion state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub userid: i64,
    pub courseid: i64,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub completed: bool,
    #[serde(default)]
    pub timecompleted: Option<i64>,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub gradepass: Option<f64>,
}

impl Completion {
    /// Whether the grade meets the pass mark; `None` when either is unknown.
    pub fn passed(&self) -> Option<bool> {
        match (self.grade, self.gradepass) {
            (Some(grade), Some(pass)) => Some(grade >= pass),
            _ => None,
        }
    }
}

/// One logged learner action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub userid: i64,
    #[serde(default)]
    pub courseid: i64,
    pub timecreated: i64,
    #[serde(default)]
    pub action: String,
}

/// The independent collections fetched from the LMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Users,
    Courses,
    Categories,
    Enrollments,
    Completions,
    Activity,
    Roles,
}

impl SourceKind {
    /// Stable key used for cache entries and logs.
    pub fn key(&self) -> &'static str {
        match self {
            SourceKind::Users => "users",
            SourceKind::Courses => "courses",
            SourceKind::Categories => "categories",
            SourceKind::Enrollments => "enrollments",
            SourceKind::Completions => "completions",
            SourceKind::Activity => "activity",
            SourceKind::Roles => "roles",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A typed collection as produced by one fetch task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum SourceData {
    Users(Vec<LmsUser>),
    Courses(Vec<Course>),
    Categories(Vec<Category>),
    Enrollments(Vec<Enrollment>),
    Completions(Vec<Completion>),
    Activity(Vec<ActivityRecord>),
    Roles(Vec<RawRole>),
}

impl SourceData {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceData::Users(_) => SourceKind::Users,
            SourceData::Courses(_) => SourceKind::Courses,
            SourceData::Categories(_) => SourceKind::Categories,
            SourceData::Enrollments(_) => SourceKind::Enrollments,
            SourceData::Completions(_) => SourceKind::Completions,
            SourceData::Activity(_) => SourceKind::Activity,
            SourceData::Roles(_) => SourceKind::Roles,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SourceData::Users(v) => v.len(),
            SourceData::Courses(v) => v.len(),
            SourceData::Categories(v) => v.len(),
            SourceData::Enrollments(v) => v.len(),
            SourceData::Completions(v) => v.len(),
            SourceData::Activity(v) => v.len(),
            SourceData::Roles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether the remote call behind a source succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Failed,
}

/// The settled outcome of one fetch task.
///
/// `is_fallback` means `value` is synthetic data substituted after a
/// failure, never a partial real result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceResult<T> {
    pub key: String,
    pub status: SourceStatus,
    pub value: T,
    pub is_fallback: bool,
    /// Served from the TTL cache without a network call.
    pub from_cache: bool,
}

impl<T> SourceResult<T> {
    pub fn success(key: &str, value: T, from_cache: bool) -> Self {
        Self {
            key: key.to_string(),
            status: SourceStatus::Success,
            value,
            is_fallback: false,
            from_cache,
        }
    }

    pub fn fallback(key: &str, value: T) -> Self {
        Self {
            key: key.to_string(),
            status: SourceStatus::Failed,
            value,
            is_fallback: true,
            from_cache: false,
        }
    }
}

/// Statistics for site administrators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminStats {
    pub total_users: usize,
    pub active_users: usize,
    pub total_courses: usize,
    pub total_categories: usize,
    pub total_enrollments: usize,
    pub completion_rate: u32,
    pub engagement_rate: u32,
    pub average_grade: f64,
    pub pass_rate: u32,
    pub average_rating: f64,
}

/// Organisation-wide headcounts for school administrators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchoolAdminStats {
    pub total_users: usize,
    pub active_users: usize,
    pub students: usize,
    pub teachers: usize,
    pub total_courses: usize,
    pub total_categories: usize,
    pub completion_rate: u32,
}

/// Per-course progress for the courses a teacher teaches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeacherStats {
    pub courses_taught: usize,
    pub total_students: usize,
    pub active_students: usize,
    pub completion_rate: u32,
    pub engagement_rate: u32,
    pub average_grade: f64,
    pub pass_rate: u32,
}

/// A learner's own progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentStats {
    pub enrolled_courses: usize,
    pub completed_courses: usize,
    pub completion_rate: u32,
    pub average_grade: f64,
    pub recent_activity: usize,
}

/// Role-specific statistics block of a view model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoleStats {
    Admin(AdminStats),
    SchoolAdmin(SchoolAdminStats),
    Teacher(TeacherStats),
    Student(StudentStats),
}

/// One row of a breakdown table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownItem {
    pub label: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
}

impl BreakdownItem {
    pub fn count(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
            total: None,
            rate: None,
            average: None,
        }
    }

    /// A count out of `total`, with the matching percentage.
    pub fn share(label: impl Into<String>, count: usize, total: usize) -> Self {
        Self {
            total: Some(total),
            rate: Some(crate::analysis::rate(count, total)),
            ..Self::count(label, count)
        }
    }
}

/// A labelled group of counts (e.g. users by role).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub key: String,
    pub title: String,
    pub items: Vec<BreakdownItem>,
}

/// Activity volume for one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub count: usize,
}

/// The aggregated, role-scoped statistics consumed by presentation code.
///
/// Always rebuilt wholesale from one settled set of source results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub role: CanonicalRole,
    pub stats: RoleStats,
    pub breakdowns: Vec<Breakdown>,
    pub trends: Vec<TrendPoint>,
    pub generated_at: DateTime<Utc>,
    pub is_degraded: bool,
    pub degraded_sources: Vec<String>,
}

impl ViewModel {
    pub fn breakdown(&self, key: &str) -> Option<&Breakdown> {
        self.breakdowns.iter().find(|b| b.key == key)
    }
}

fn default_true() -> bool {
    true
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// The LMS encodes flags as 0/1 integers in some functions and booleans in others.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_i64().map(|v| v != 0).unwrap_or(false)),
        Value::String(s) => Ok(matches!(s.as_str(), "1" | "true")),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected boolean flag, got {}",
            other
        ))),
    }
}
