//! Deterministic synthetic data for unavailable sources.
//!
//! Every collection is drawn from a SplitMix64 stream seeded with the
//! configured seed and the source key, so the same seed and `now` always
//! yield the same data. Generated ids line up across collections (users
//! `1..=users`, courses `1..=courses`, categories `1..=categories`).

use crate::error::FallbackError;
use crate::models::{
    ActivityRecord, Category, Completion, Course, Enrollment, LmsUser, RawRole, SourceData,
    SourceKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DAY_SECS: i64 = 86_400;

const SUBJECTS: &[&str] = &[
    "Mathematics",
    "Biology",
    "Chemistry",
    "Physics",
    "History",
    "Geography",
    "Literature",
    "Computer Science",
    "Economics",
    "Art",
    "Music",
    "Languages",
];

const FIRST_NAMES: &[&str] = &[
    "Alex", "Sam", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Jamie", "Avery", "Quinn",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Garcia", "Okafor", "Nguyen", "Kowalski", "Haddad", "Silva", "Tanaka", "Murphy",
];

const ACTIONS: &[&str] = &["viewed", "submitted", "attempted", "posted", "completed"];

/// Sizes and seed of the synthetic data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_users")]
    pub users: usize,
    #[serde(default = "default_courses")]
    pub courses: usize,
    #[serde(default = "default_categories")]
    pub categories: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            users: default_users(),
            courses: default_courses(),
            categories: default_categories(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_users() -> usize {
    120
}

fn default_courses() -> usize {
    12
}

fn default_categories() -> usize {
    4
}

/// SplitMix64; small, fast and stable across releases.
struct SplitMix64(u64);

impl SplitMix64 {
    fn new(seed: u64, stream: &str) -> Self {
        // FNV-1a of the stream name keeps each source independent.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in stream.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self(seed ^ hash)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in `[lo, hi)`; `lo` when the range is empty.
    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        lo + (self.next_u64() % (hi - lo) as u64) as i64
    }

    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

/// Produces plausible substitute collections.
#[derive(Debug, Clone, Default)]
pub struct FallbackGenerator {
    config: FallbackConfig,
}

impl FallbackGenerator {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Synthesize the collection for `kind` as of `now`.
    pub fn generate(&self, kind: SourceKind, now: DateTime<Utc>) -> Result<SourceData, FallbackError> {
        if kind == SourceKind::Courses && self.config.courses > 0 && self.config.categories == 0
        {
            return Err(FallbackError::Synthesis {
                key: kind.key().to_string(),
                reason: "courses need at least one category".to_string(),
            });
        }

        let now = now.timestamp();
        Ok(match kind {
            SourceKind::Users => SourceData::Users(self.users(now)),
            SourceKind::Courses => SourceData::Courses(self.courses(now)),
            SourceKind::Categories => SourceData::Categories(self.categories()),
            SourceKind::Enrollments => SourceData::Enrollments(self.enrollments(now)),
            SourceKind::Completions => SourceData::Completions(self.completions(now)),
            SourceKind::Activity => SourceData::Activity(self.activity(now)),
            // No role data means the classifier's default applies.
            SourceKind::Roles => SourceData::Roles(Vec::new()),
        })
    }

    fn rng(&self, kind: SourceKind) -> SplitMix64 {
        SplitMix64::new(self.config.seed, kind.key())
    }

    fn users(&self, now: i64) -> Vec<LmsUser> {
        let mut rng = self.rng(SourceKind::Users);
        (1..=self.config.users as i64)
            .map(|id| {
                let firstname = rng.pick(FIRST_NAMES).to_string();
                let lastname = rng.pick(LAST_NAMES).to_string();
                let lastaccess = if rng.chance(10) {
                    0
                } else {
                    now - rng.range(0, 60 * DAY_SECS)
                };
                LmsUser {
                    id,
                    username: format!("user{}", id),
                    email: format!("user{}@example.invalid", id),
                    firstname,
                    lastname,
                    lastaccess,
                    suspended: rng.chance(3),
                }
            })
            .collect()
    }

    fn course_category(&self, course_id: i64) -> i64 {
        if self.config.categories == 0 {
            0
        } else {
            (course_id - 1) % self.config.categories as i64 + 1
        }
    }

    fn courses(&self, now: i64) -> Vec<Course> {
        let mut rng = self.rng(SourceKind::Courses);
        (1..=self.config.courses as i64)
            .map(|id| {
                let subject = SUBJECTS[(id as usize - 1) % SUBJECTS.len()];
                Course {
                    id,
                    shortname: format!("C{:03}", id),
                    fullname: format!("{} {}", subject, (id as usize - 1) / SUBJECTS.len() + 1),
                    categoryid: self.course_category(id),
                    visible: !rng.chance(5),
                    startdate: now - rng.range(30, 365) * DAY_SECS,
                    rating: Some(rng.range(30, 51) as f64 / 10.0),
                }
            })
            .collect()
    }

    fn categories(&self) -> Vec<Category> {
        (1..=self.config.categories as i64)
            .map(|id| Category {
                id,
                name: format!("School {}", id),
                parent: 0,
                coursecount: (1..=self.config.courses as i64)
                    .filter(|c| self.course_category(*c) == id)
                    .count() as u32,
            })
            .collect()
    }

    fn enrollments(&self, now: i64) -> Vec<Enrollment> {
        let users = self.config.users as i64;
        let courses = self.config.courses as i64;
        if users == 0 || courses == 0 {
            return Vec::new();
        }

        let mut rng = self.rng(SourceKind::Enrollments);
        let mut enrollments = Vec::new();

        // One teacher per course, spread across the user base.
        for course in 1..=courses {
            enrollments.push(Enrollment {
                userid: (course * 7 - 1) % users + 1,
                courseid: course,
                roles: vec![RawRole::new("editingteacher")],
                lastaccess: now - rng.range(0, 14 * DAY_SECS),
            });
        }

        for user in 1..=users {
            let count = rng.range(1, 4);
            let first = rng.range(1, courses + 1);
            for offset in 0..count.min(courses) {
                enrollments.push(Enrollment {
                    userid: user,
                    courseid: (first - 1 + offset) % courses + 1,
                    roles: vec![RawRole::new("student")],
                    lastaccess: now - rng.range(0, 45 * DAY_SECS),
                });
            }
        }

        enrollments
    }

    fn completions(&self, now: i64) -> Vec<Completion> {
        let mut rng = self.rng(SourceKind::Completions);
        self.enrollments(now)
            .into_iter()
            .filter(|e| e.roles.iter().any(|r| r.shortname == "student"))
            .map(|e| {
                let completed = rng.chance(45);
                let grade = if completed || rng.chance(50) {
                    Some(rng.range(35, 101) as f64)
                } else {
                    None
                };
                Completion {
                    userid: e.userid,
                    courseid: e.courseid,
                    completed,
                    timecompleted: completed.then(|| now - rng.range(0, 90 * DAY_SECS)),
                    grade,
                    gradepass: Some(50.0),
                }
            })
            .collect()
    }

    fn activity(&self, now: i64) -> Vec<ActivityRecord> {
        let users = self.config.users as i64;
        let courses = self.config.courses.max(1) as i64;
        let mut rng = self.rng(SourceKind::Activity);
        let mut records = Vec::new();

        for user in 1..=users {
            for _ in 0..rng.range(0, 6) {
                records.push(ActivityRecord {
                    userid: user,
                    courseid: rng.range(1, courses + 1),
                    timecreated: now - rng.range(0, 56 * DAY_SECS),
                    action: rng.pick(ACTIONS).to_string(),
                });
            }
        }

        records
    }
}
