//! Role-scoped aggregation.
//!
//! [`aggregate`] is a pure function of the settled source results, the
//! caller's scope and "now". Fallback data is folded in exactly like real
//! data; the view model only records which sources were synthetic.

use super::metrics::{active_count, average, is_active, rate, weekly_trend};
use crate::models::{
    ActivityRecord, AdminStats, Breakdown, BreakdownItem, CanonicalRole, Category, Completion,
    Course, Enrollment, LmsUser, RawRole, RoleStats, SchoolAdminStats, SourceData, SourceResult,
    StudentStats, TeacherStats, ViewModel,
};
use crate::roles::{classify, Capability};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const DEFAULT_ACTIVITY_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_TREND_WEEKS: usize = 8;

/// Who the view model is for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationScope {
    pub role: CanonicalRole,
    pub user_id: i64,
    pub activity_window: Duration,
    pub trend_weeks: usize,
}

impl AggregationScope {
    pub fn new(role: CanonicalRole, user_id: i64) -> Self {
        Self {
            role,
            user_id,
            activity_window: Duration::days(DEFAULT_ACTIVITY_WINDOW_DAYS),
            trend_weeks: DEFAULT_TREND_WEEKS,
        }
    }

    pub fn with_activity_window(mut self, window: Duration) -> Self {
        self.activity_window = window;
        self
    }

    pub fn with_trend_weeks(mut self, weeks: usize) -> Self {
        self.trend_weeks = weeks;
        self
    }
}

/// Borrowed view of every collection; missing sources are empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sources<'a> {
    pub users: &'a [LmsUser],
    pub courses: &'a [Course],
    pub categories: &'a [Category],
    pub enrollments: &'a [Enrollment],
    pub completions: &'a [Completion],
    pub activity: &'a [ActivityRecord],
}

impl<'a> Sources<'a> {
    pub fn from_results(results: &'a [SourceResult<SourceData>]) -> Self {
        let mut sources = Self::default();
        for result in results {
            match &result.value {
                SourceData::Users(v) => sources.users = v,
                SourceData::Courses(v) => sources.courses = v,
                SourceData::Categories(v) => sources.categories = v,
                SourceData::Enrollments(v) => sources.enrollments = v,
                SourceData::Completions(v) => sources.completions = v,
                SourceData::Activity(v) => sources.activity = v,
                SourceData::Roles(_) => {}
            }
        }
        sources
    }
}

/// Data already narrowed to what the scope may see.
struct Scoped<'a> {
    courses: Vec<&'a Course>,
    completions: Vec<&'a Completion>,
    activity: Vec<i64>,
}

/// Build the view model for `scope` from one settled set of results.
pub fn aggregate(
    scope: &AggregationScope,
    results: &[SourceResult<SourceData>],
    now: DateTime<Utc>,
) -> ViewModel {
    let sources = Sources::from_results(results);
    let roles = roles_by_user(sources.enrollments);

    let (stats, scoped) = match scope.role {
        CanonicalRole::Admin => admin_view(scope, &sources, now),
        CanonicalRole::SchoolAdmin => school_admin_view(scope, &sources, &roles, now),
        CanonicalRole::Teacher => teacher_view(scope, &sources, now),
        CanonicalRole::Student => student_view(scope, &sources, now),
    };

    let breakdowns = breakdowns(scope, &sources, &roles, &scoped, now);
    let trends = weekly_trend(scoped.activity.iter().copied(), now, scope.trend_weeks);

    let degraded_sources: Vec<String> = results
        .iter()
        .filter(|r| r.is_fallback)
        .map(|r| r.key.clone())
        .collect();

    ViewModel {
        role: scope.role,
        stats,
        breakdowns,
        trends,
        generated_at: now,
        is_degraded: !degraded_sources.is_empty(),
        degraded_sources,
    }
}

/// Canonical role of every enrolled user across all of their enrolments.
pub fn roles_by_user(enrollments: &[Enrollment]) -> HashMap<i64, CanonicalRole> {
    let mut raw: HashMap<i64, Vec<RawRole>> = HashMap::new();
    for enrollment in enrollments {
        raw.entry(enrollment.userid)
            .or_default()
            .extend(enrollment.roles.iter().cloned());
    }

    raw.into_iter()
        .map(|(user, roles)| (user, classify(&roles)))
        .collect()
}

fn is_student_enrolment(enrollment: &Enrollment) -> bool {
    classify(&enrollment.roles) == CanonicalRole::Student
}

fn grades<'a>(completions: impl IntoIterator<Item = &'a Completion>) -> Vec<f64> {
    completions.into_iter().filter_map(|c| c.grade).collect()
}

fn pass_rate<'a>(completions: impl IntoIterator<Item = &'a Completion>) -> u32 {
    let (passed, total) = completions
        .into_iter()
        .filter_map(|c| c.passed())
        .fold((0usize, 0usize), |(p, t), ok| (p + usize::from(ok), t + 1));
    rate(passed, total)
}

fn completed_count<'a>(completions: impl IntoIterator<Item = &'a Completion>) -> usize {
    completions.into_iter().filter(|c| c.completed).count()
}

fn admin_view<'a>(
    scope: &AggregationScope,
    sources: &Sources<'a>,
    now: DateTime<Utc>,
) -> (RoleStats, Scoped<'a>) {
    let active_users = active_count(
        sources
            .users
            .iter()
            .filter(|u| !u.suspended)
            .map(|u| u.lastaccess),
        now,
        scope.activity_window,
    );

    let stats = AdminStats {
        total_users: sources.users.len(),
        active_users,
        total_courses: sources.courses.len(),
        total_categories: sources.categories.len(),
        total_enrollments: sources.enrollments.len(),
        completion_rate: rate(
            completed_count(sources.completions),
            sources.completions.len(),
        ),
        engagement_rate: rate(active_users, sources.users.len()),
        average_grade: average(&grades(sources.completions)),
        pass_rate: pass_rate(sources.completions),
        average_rating: average(
            &sources
                .courses
                .iter()
                .filter_map(|c| c.rating)
                .collect::<Vec<_>>(),
        ),
    };

    let scoped = Scoped {
        courses: sources.courses.iter().collect(),
        completions: sources.completions.iter().collect(),
        activity: sources.activity.iter().map(|a| a.timecreated).collect(),
    };
    (RoleStats::Admin(stats), scoped)
}

fn school_admin_view<'a>(
    scope: &AggregationScope,
    sources: &Sources<'a>,
    roles: &HashMap<i64, CanonicalRole>,
    now: DateTime<Utc>,
) -> (RoleStats, Scoped<'a>) {
    let role_of = |user: &LmsUser| {
        roles
            .get(&user.id)
            .copied()
            .unwrap_or(CanonicalRole::Student)
    };

    let stats = SchoolAdminStats {
        total_users: sources.users.len(),
        active_users: active_count(
            sources
                .users
                .iter()
                .filter(|u| !u.suspended)
                .map(|u| u.lastaccess),
            now,
            scope.activity_window,
        ),
        students: sources
            .users
            .iter()
            .filter(|u| role_of(u) == CanonicalRole::Student)
            .count(),
        teachers: sources
            .users
            .iter()
            .filter(|u| role_of(u) == CanonicalRole::Teacher)
            .count(),
        total_courses: sources.courses.len(),
        total_categories: sources.categories.len(),
        completion_rate: rate(
            completed_count(sources.completions),
            sources.completions.len(),
        ),
    };

    let scoped = Scoped {
        courses: sources.courses.iter().collect(),
        completions: sources.completions.iter().collect(),
        activity: sources.activity.iter().map(|a| a.timecreated).collect(),
    };
    (RoleStats::SchoolAdmin(stats), scoped)
}

fn teacher_view<'a>(
    scope: &AggregationScope,
    sources: &Sources<'a>,
    now: DateTime<Utc>,
) -> (RoleStats, Scoped<'a>) {
    let taught: BTreeSet<i64> = sources
        .enrollments
        .iter()
        .filter(|e| e.userid == scope.user_id && classify(&e.roles) >= CanonicalRole::Teacher)
        .map(|e| e.courseid)
        .collect();

    let student_enrolments: Vec<&Enrollment> = sources
        .enrollments
        .iter()
        .filter(|e| {
            taught.contains(&e.courseid) && e.userid != scope.user_id && is_student_enrolment(e)
        })
        .collect();

    let students: BTreeSet<i64> = student_enrolments.iter().map(|e| e.userid).collect();
    let active_students: BTreeSet<i64> = student_enrolments
        .iter()
        .filter(|e| is_active(e.lastaccess, now, scope.activity_window))
        .map(|e| e.userid)
        .collect();

    let completions: Vec<&Completion> = sources
        .completions
        .iter()
        .filter(|c| taught.contains(&c.courseid) && students.contains(&c.userid))
        .collect();

    let stats = TeacherStats {
        courses_taught: taught.len(),
        total_students: students.len(),
        active_students: active_students.len(),
        completion_rate: rate(
            completed_count(completions.iter().copied()),
            completions.len(),
        ),
        engagement_rate: rate(active_students.len(), students.len()),
        average_grade: average(&grades(completions.iter().copied())),
        pass_rate: pass_rate(completions.iter().copied()),
    };

    let scoped = Scoped {
        courses: sources
            .courses
            .iter()
            .filter(|c| taught.contains(&c.id))
            .collect(),
        completions,
        activity: sources
            .activity
            .iter()
            .filter(|a| taught.contains(&a.courseid))
            .map(|a| a.timecreated)
            .collect(),
    };
    (RoleStats::Teacher(stats), scoped)
}

fn student_view<'a>(
    scope: &AggregationScope,
    sources: &Sources<'a>,
    now: DateTime<Utc>,
) -> (RoleStats, Scoped<'a>) {
    let enrolled: BTreeSet<i64> = sources
        .enrollments
        .iter()
        .filter(|e| e.userid == scope.user_id)
        .map(|e| e.courseid)
        .collect();

    let completions: Vec<&Completion> = sources
        .completions
        .iter()
        .filter(|c| c.userid == scope.user_id)
        .collect();

    let completed: BTreeSet<i64> = completions
        .iter()
        .filter(|c| c.completed)
        .map(|c| c.courseid)
        .collect();

    let activity: Vec<i64> = sources
        .activity
        .iter()
        .filter(|a| a.userid == scope.user_id)
        .map(|a| a.timecreated)
        .collect();

    let stats = StudentStats {
        enrolled_courses: enrolled.len(),
        completed_courses: completed.len(),
        completion_rate: rate(completed.len(), enrolled.len()),
        average_grade: average(&grades(completions.iter().copied())),
        recent_activity: active_count(activity.iter().copied(), now, scope.activity_window),
    };

    let scoped = Scoped {
        courses: sources
            .courses
            .iter()
            .filter(|c| enrolled.contains(&c.id))
            .collect(),
        completions,
        activity,
    };
    (RoleStats::Student(stats), scoped)
}

/// Emit the breakdown tables the role's capabilities allow.
fn breakdowns(
    scope: &AggregationScope,
    sources: &Sources<'_>,
    roles: &HashMap<i64, CanonicalRole>,
    scoped: &Scoped<'_>,
    now: DateTime<Utc>,
) -> Vec<Breakdown> {
    let mut out = Vec::new();

    if scope.role.can(Capability::ViewUserDirectory) {
        out.push(users_by_role(sources.users, roles));
    }
    if scope.role.can(Capability::ViewOrganisation) {
        out.push(courses_by_category(sources.courses, sources.categories));
    }
    if scope.role.can(Capability::ViewCourseProgress) {
        out.push(course_completion(
            &scoped.courses,
            sources.enrollments,
            sources.completions,
        ));
    }
    if scope.role.can(Capability::ViewGradebook) {
        out.push(grade_distribution(&scoped.completions));
    }
    if scope.role.can(Capability::ViewOwnProgress) {
        out.push(own_progress(scope, sources, &scoped.completions, now));
    }

    out
}

/// Users counted under their canonical role; users with no enrolment are students.
fn users_by_role(users: &[LmsUser], roles: &HashMap<i64, CanonicalRole>) -> Breakdown {
    let mut counts: BTreeMap<CanonicalRole, usize> = BTreeMap::new();
    for user in users {
        let role = roles
            .get(&user.id)
            .copied()
            .unwrap_or(CanonicalRole::Student);
        *counts.entry(role).or_default() += 1;
    }

    Breakdown {
        key: "users_by_role".to_string(),
        title: "Users by role".to_string(),
        items: CanonicalRole::ALL
            .iter()
            .map(|role| {
                BreakdownItem::share(
                    role.label(),
                    counts.get(role).copied().unwrap_or(0),
                    users.len(),
                )
            })
            .collect(),
    }
}

fn courses_by_category(courses: &[Course], categories: &[Category]) -> Breakdown {
    let names: HashMap<i64, &str> = categories.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut counts: BTreeMap<i64, usize> = categories.iter().map(|c| (c.id, 0)).collect();
    let mut uncategorised = 0;
    for course in courses {
        match counts.get_mut(&course.categoryid) {
            Some(count) => *count += 1,
            None => uncategorised += 1,
        }
    }

    let mut items: Vec<BreakdownItem> = counts
        .into_iter()
        .map(|(id, count)| {
            let label = names.get(&id).copied().unwrap_or("Unnamed");
            BreakdownItem::share(label, count, courses.len())
        })
        .collect();
    if uncategorised > 0 {
        items.push(BreakdownItem::share(
            "Uncategorised",
            uncategorised,
            courses.len(),
        ));
    }

    Breakdown {
        key: "courses_by_category".to_string(),
        title: "Courses by category".to_string(),
        items,
    }
}

/// Completed students out of enrolled students, per course.
fn course_completion(
    courses: &[&Course],
    enrollments: &[Enrollment],
    completions: &[Completion],
) -> Breakdown {
    let mut students: HashMap<i64, BTreeSet<i64>> = HashMap::new();
    for enrollment in enrollments.iter().filter(|e| is_student_enrolment(e)) {
        students
            .entry(enrollment.courseid)
            .or_default()
            .insert(enrollment.userid);
    }

    let items = courses
        .iter()
        .map(|course| {
            let enrolled = students.get(&course.id);
            let course_completions: Vec<&Completion> = completions
                .iter()
                .filter(|c| {
                    c.courseid == course.id && enrolled.is_some_and(|s| s.contains(&c.userid))
                })
                .collect();
            let total = enrolled.map(BTreeSet::len).unwrap_or(0);
            let graded = grades(course_completions.iter().copied());

            BreakdownItem {
                average: (!graded.is_empty()).then(|| average(&graded)),
                ..BreakdownItem::share(
                    course.display_name(),
                    completed_count(course_completions.iter().copied()),
                    total,
                )
            }
        })
        .collect();

    Breakdown {
        key: "course_completion".to_string(),
        title: "Completion by course".to_string(),
        items,
    }
}

fn grade_distribution(completions: &[&Completion]) -> Breakdown {
    const BANDS: &[(&str, f64, f64)] = &[
        ("0-49", f64::NEG_INFINITY, 50.0),
        ("50-69", 50.0, 70.0),
        ("70-84", 70.0, 85.0),
        ("85-100", 85.0, f64::INFINITY),
    ];

    let graded = grades(completions.iter().copied());
    let items = BANDS
        .iter()
        .map(|(label, lo, hi)| {
            let count = graded.iter().filter(|g| **g >= *lo && **g < *hi).count();
            BreakdownItem::share(*label, count, graded.len())
        })
        .collect();

    Breakdown {
        key: "grade_distribution".to_string(),
        title: "Grade distribution".to_string(),
        items,
    }
}

/// The learner's courses with recent activity and grade.
fn own_progress(
    scope: &AggregationScope,
    sources: &Sources<'_>,
    completions: &[&Completion],
    now: DateTime<Utc>,
) -> Breakdown {
    let enrolled: BTreeSet<i64> = sources
        .enrollments
        .iter()
        .filter(|e| e.userid == scope.user_id)
        .map(|e| e.courseid)
        .collect();
    let names: HashMap<i64, &str> = sources
        .courses
        .iter()
        .map(|c| (c.id, c.display_name()))
        .collect();

    let items = enrolled
        .iter()
        .map(|course_id| {
            let label = names
                .get(course_id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Course {}", course_id));
            let recent = active_count(
                sources
                    .activity
                    .iter()
                    .filter(|a| a.userid == scope.user_id && a.courseid == *course_id)
                    .map(|a| a.timecreated),
                now,
                scope.activity_window,
            );
            let completion = completions.iter().find(|c| c.courseid == *course_id);

            BreakdownItem {
                rate: Some(if completion.is_some_and(|c| c.completed) {
                    100
                } else {
                    0
                }),
                average: completion.and_then(|c| c.grade),
                ..BreakdownItem::count(label, recent)
            }
        })
        .collect();

    Breakdown {
        key: "own_progress".to_string(),
        title: "My courses".to_string(),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LmsError;
    use crate::fetch::{FallbackConfig, FallbackGenerator, FetchTask, Orchestrator};
    use crate::models::{SourceKind, SourceStatus};

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn days_ago(days: i64) -> i64 {
        now().timestamp() - days * 86_400
    }

    fn real(data: SourceData) -> SourceResult<SourceData> {
        let key = data.kind().key();
        SourceResult::success(key, data, false)
    }

    fn user(id: i64, lastaccess: i64) -> LmsUser {
        LmsUser {
            id,
            username: format!("u{}", id),
            firstname: String::new(),
            lastname: String::new(),
            email: String::new(),
            lastaccess,
            suspended: false,
        }
    }

    fn course(id: i64, categoryid: i64) -> Course {
        Course {
            id,
            shortname: format!("C{}", id),
            fullname: format!("Course {}", id),
            categoryid,
            visible: true,
            startdate: 0,
            rating: None,
        }
    }

    fn enrol(userid: i64, courseid: i64, role: &str, lastaccess: i64) -> Enrollment {
        Enrollment {
            userid,
            courseid,
            roles: vec![RawRole::new(role)],
            lastaccess,
        }
    }

    fn completion(userid: i64, courseid: i64, completed: bool, grade: Option<f64>) -> Completion {
        Completion {
            userid,
            courseid,
            completed,
            timecompleted: None,
            grade,
            gradepass: Some(50.0),
        }
    }

    fn completions_batch(total: usize, completed: usize) -> Vec<Completion> {
        (0..total)
            .map(|i| completion(i as i64 + 1, 1, i < completed, None))
            .collect()
    }

    fn admin_stats(view: &ViewModel) -> &AdminStats {
        match &view.stats {
            RoleStats::Admin(stats) => stats,
            other => panic!("expected admin stats, got {:?}", other),
        }
    }

    #[test]
    fn test_completion_rate_zero_and_typical() {
        let scope = AggregationScope::new(CanonicalRole::Admin, 1);

        let empty = aggregate(&scope, &[real(SourceData::Completions(vec![]))], now());
        assert_eq!(admin_stats(&empty).completion_rate, 0);

        let results = vec![real(SourceData::Completions(completions_batch(200, 84)))];
        let view = aggregate(&scope, &results, now());
        assert_eq!(admin_stats(&view).completion_rate, 42);
    }

    #[test]
    fn test_admin_stats() {
        let mut suspended = user(4, days_ago(1));
        suspended.suspended = true;

        let mut rated = course(1, 10);
        rated.rating = Some(4.5);
        let mut rated_low = course(2, 10);
        rated_low.rating = Some(3.0);

        let results = vec![
            real(SourceData::Users(vec![
                user(1, days_ago(2)),
                user(2, days_ago(40)),
                user(3, 0),
                suspended,
            ])),
            real(SourceData::Courses(vec![rated, rated_low, course(3, 99)])),
            real(SourceData::Categories(vec![Category {
                id: 10,
                name: "Science".to_string(),
                parent: 0,
                coursecount: 2,
            }])),
            real(SourceData::Enrollments(vec![
                enrol(1, 1, "student", days_ago(1)),
                enrol(2, 1, "editingteacher", days_ago(1)),
            ])),
            real(SourceData::Completions(vec![
                completion(1, 1, true, Some(80.0)),
                completion(3, 2, false, Some(45.0)),
            ])),
        ];

        let view = aggregate(&AggregationScope::new(CanonicalRole::Admin, 99), &results, now());
        let stats = admin_stats(&view);

        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.engagement_rate, 25);
        assert_eq!(stats.total_courses, 3);
        assert_eq!(stats.total_categories, 1);
        assert_eq!(stats.total_enrollments, 2);
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.average_grade, 62.5);
        assert_eq!(stats.pass_rate, 50);
        assert_eq!(stats.average_rating, 3.8);
        assert!(!view.is_degraded);

        let by_role = view.breakdown("users_by_role").unwrap();
        let teacher_row = by_role.items.iter().find(|i| i.label == "Teacher").unwrap();
        assert_eq!(teacher_row.count, 1);
        let student_row = by_role.items.iter().find(|i| i.label == "Student").unwrap();
        assert_eq!(student_row.count, 3);

        let by_category = view.breakdown("courses_by_category").unwrap();
        assert_eq!(by_category.items[0].label, "Science");
        assert_eq!(by_category.items[0].count, 2);
        assert_eq!(by_category.items[1].label, "Uncategorised");
        assert_eq!(by_category.items[1].count, 1);

        assert!(view.breakdown("grade_distribution").is_some());
        assert!(view.breakdown("own_progress").is_none());
    }

    #[test]
    fn test_school_admin_headcounts() {
        let results = vec![
            real(SourceData::Users(vec![
                user(1, days_ago(1)),
                user(2, days_ago(1)),
                user(3, days_ago(100)),
                user(4, 0),
            ])),
            real(SourceData::Enrollments(vec![
                enrol(1, 1, "companycourseeditor", days_ago(1)),
                enrol(2, 1, "student", days_ago(1)),
                enrol(2, 2, "student", days_ago(1)),
                enrol(3, 2, "companyuser", days_ago(1)),
            ])),
        ];

        let view = aggregate(
            &AggregationScope::new(CanonicalRole::SchoolAdmin, 50),
            &results,
            now(),
        );
        let RoleStats::SchoolAdmin(stats) = &view.stats else {
            panic!("expected school admin stats");
        };

        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.active_users, 2);
        assert_eq!(stats.teachers, 1);
        assert_eq!(stats.students, 3);
        assert!(view.breakdown("users_by_role").is_some());
        assert!(view.breakdown("grade_distribution").is_none());
    }

    #[test]
    fn test_teacher_sees_only_taught_courses() {
        let teacher = 10;
        let results = vec![
            real(SourceData::Courses(vec![course(1, 1), course(2, 1)])),
            real(SourceData::Enrollments(vec![
                enrol(teacher, 1, "editingteacher", days_ago(1)),
                enrol(1, 1, "student", days_ago(3)),
                enrol(2, 1, "student", days_ago(45)),
                enrol(3, 2, "student", days_ago(1)),
                enrol(11, 2, "editingteacher", days_ago(1)),
            ])),
            real(SourceData::Completions(vec![
                completion(1, 1, true, Some(90.0)),
                completion(2, 1, false, Some(40.0)),
                completion(3, 2, true, Some(100.0)),
            ])),
            real(SourceData::Activity(vec![
                ActivityRecord {
                    userid: 1,
                    courseid: 1,
                    timecreated: days_ago(2),
                    action: "viewed".to_string(),
                },
                ActivityRecord {
                    userid: 3,
                    courseid: 2,
                    timecreated: days_ago(2),
                    action: "viewed".to_string(),
                },
            ])),
        ];

        let view = aggregate(
            &AggregationScope::new(CanonicalRole::Teacher, teacher),
            &results,
            now(),
        );
        let RoleStats::Teacher(stats) = &view.stats else {
            panic!("expected teacher stats");
        };

        assert_eq!(stats.courses_taught, 1);
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.active_students, 1);
        assert_eq!(stats.engagement_rate, 50);
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.average_grade, 65.0);
        assert_eq!(stats.pass_rate, 50);

        let progress = view.breakdown("course_completion").unwrap();
        assert_eq!(progress.items.len(), 1);
        assert_eq!(progress.items[0].label, "Course 1");
        assert_eq!(progress.items[0].total, Some(2));
        assert_eq!(progress.items[0].rate, Some(50));
        assert_eq!(progress.items[0].average, Some(65.0));
        assert!(view.breakdown("users_by_role").is_none());

        let trend_total: usize = view.trends.iter().map(|t| t.count).sum();
        assert_eq!(trend_total, 1);
    }

    #[test]
    fn test_student_view() {
        let me = 5;
        let results = vec![
            real(SourceData::Courses(vec![course(1, 1), course(2, 1), course(3, 1)])),
            real(SourceData::Enrollments(vec![
                enrol(me, 1, "student", days_ago(1)),
                enrol(me, 2, "student", days_ago(1)),
                enrol(6, 3, "student", days_ago(1)),
            ])),
            real(SourceData::Completions(vec![
                completion(me, 1, true, Some(77.0)),
                completion(me, 2, false, None),
                completion(6, 3, true, Some(10.0)),
            ])),
            real(SourceData::Activity(vec![
                ActivityRecord {
                    userid: me,
                    courseid: 1,
                    timecreated: days_ago(3),
                    action: "submitted".to_string(),
                },
                ActivityRecord {
                    userid: me,
                    courseid: 2,
                    timecreated: days_ago(60),
                    action: "viewed".to_string(),
                },
            ])),
        ];

        let view = aggregate(&AggregationScope::new(CanonicalRole::Student, me), &results, now());
        let RoleStats::Student(stats) = &view.stats else {
            panic!("expected student stats");
        };

        assert_eq!(stats.enrolled_courses, 2);
        assert_eq!(stats.completed_courses, 1);
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.average_grade, 77.0);
        assert_eq!(stats.recent_activity, 1);

        let mine = view.breakdown("own_progress").unwrap();
        assert_eq!(mine.items.len(), 2);
        assert_eq!(mine.items[0].count, 1);
        assert_eq!(mine.items[0].rate, Some(100));
        assert_eq!(mine.items[0].average, Some(77.0));
        assert_eq!(mine.items[1].rate, Some(0));
        assert_eq!(view.breakdowns.len(), 1);
    }

    #[test]
    fn test_missing_sources_yield_zeroes() {
        for role in CanonicalRole::ALL {
            let view = aggregate(&AggregationScope::new(role, 1), &[], now());
            assert_eq!(view.role, role);
            assert!(!view.is_degraded);
            assert_eq!(view.trends.len(), DEFAULT_TREND_WEEKS);
        }
    }

    #[test]
    fn test_view_is_rebuilt_identically() {
        let results = vec![real(SourceData::Users(vec![user(1, days_ago(1))]))];
        let scope = AggregationScope::new(CanonicalRole::Admin, 1);
        assert_eq!(
            aggregate(&scope, &results, now()),
            aggregate(&scope, &results, now())
        );
    }

    #[tokio::test]
    async fn test_failed_courses_source_degrades_only_courses() {
        let generator = FallbackGenerator::new(FallbackConfig {
            courses: 9,
            ..FallbackConfig::default()
        });
        let real_users = vec![user(1, days_ago(1)), user(2, days_ago(2)), user(3, 0)];
        let real_categories = vec![
            Category {
                id: 1,
                name: "Primary".to_string(),
                parent: 0,
                coursecount: 0,
            },
            Category {
                id: 2,
                name: "Secondary".to_string(),
                parent: 0,
                coursecount: 0,
            },
        ];

        let users = real_users.clone();
        let categories = real_categories.clone();
        let tasks = vec![
            FetchTask::new("users", async move { Ok(SourceData::Users(users)) })
                .with_fallback(|| generator.generate(SourceKind::Users, now())),
            FetchTask::new("courses", async {
                Err(LmsError::Transport("connection refused".to_string()))
            })
            .with_fallback(|| generator.generate(SourceKind::Courses, now())),
            FetchTask::new("categories", async move {
                Ok(SourceData::Categories(categories))
            })
            .with_fallback(|| generator.generate(SourceKind::Categories, now())),
        ];

        let report = Orchestrator::new().fetch_all(tasks).await;
        assert_eq!(report.get("courses").unwrap().status, SourceStatus::Failed);

        let view = aggregate(
            &AggregationScope::new(CanonicalRole::Admin, 1),
            &report.results,
            now(),
        );
        let stats = admin_stats(&view);

        assert!(view.is_degraded);
        assert_eq!(view.degraded_sources, vec!["courses".to_string()]);
        assert_eq!(stats.total_courses, 9);
        assert_eq!(stats.total_users, real_users.len());
        assert_eq!(stats.active_users, 2);
        assert_eq!(stats.total_categories, real_categories.len());
    }
}
