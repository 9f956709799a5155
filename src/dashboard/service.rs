//! Role-scoped dashboard assembly and the published load state.

use crate::analysis::{aggregate, AggregationScope};
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::error::DashboardError;
use crate::fetch::{FallbackConfig, FallbackGenerator, FetchTask, Orchestrator};
use crate::lms::{fetch_source, fetch_user_roles, FunctionNames, LmsApi};
use crate::models::{CanonicalRole, RawRole, SourceData, SourceKind, ViewModel};
use crate::roles::classify;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Tunables for one service instance.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub functions: FunctionNames,
    pub fallback: FallbackConfig,
    pub activity_window: chrono::Duration,
    pub trend_weeks: usize,
    /// Per-source limit on a remote call; `None` waits for the transport.
    pub fetch_timeout: Option<Duration>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            functions: FunctionNames::default(),
            fallback: FallbackConfig::default(),
            activity_window: chrono::Duration::days(30),
            trend_weeks: 8,
            fetch_timeout: Some(Duration::from_secs(20)),
        }
    }
}

/// What a consumer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub role: CanonicalRole,
    pub view_model: ViewModel,
    /// Some numbers come from synthetic data.
    pub is_degraded: bool,
    /// Every remote call failed; everything shown is synthetic.
    pub all_sources_failed: bool,
}

/// Load state of the most recent request.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Idle,
    Loading,
    Ready,
    ReadyDegraded,
    FatalError(String),
}

impl DashboardState {
    pub fn is_ready(&self) -> bool {
        matches!(self, DashboardState::Ready | DashboardState::ReadyDegraded)
    }
}

/// Collections each role's dashboard draws on.
pub fn sources_for(role: CanonicalRole) -> &'static [SourceKind] {
    const ORGANISATION: &[SourceKind] = &[
        SourceKind::Users,
        SourceKind::Courses,
        SourceKind::Categories,
        SourceKind::Enrollments,
        SourceKind::Completions,
        SourceKind::Activity,
    ];
    const COURSEWORK: &[SourceKind] = &[
        SourceKind::Courses,
        SourceKind::Enrollments,
        SourceKind::Completions,
        SourceKind::Activity,
    ];

    match role {
        CanonicalRole::Admin | CanonicalRole::SchoolAdmin => ORGANISATION,
        CanonicalRole::Teacher | CanonicalRole::Student => COURSEWORK,
    }
}

/// Builds role-scoped dashboards against one LMS and one cache.
///
/// Safe to share behind an [`Arc`] and call concurrently; overlapping
/// requests each publish their own outcome and the last one to finish wins.
pub struct DashboardService {
    lms: Arc<dyn LmsApi>,
    orchestrator: Orchestrator,
    caching: bool,
    settings: DashboardSettings,
    clock: Arc<dyn Clock>,
    fallback: FallbackGenerator,
    state: watch::Sender<DashboardState>,
    snapshot: watch::Sender<Option<DashboardData>>,
}

impl DashboardService {
    pub fn new(
        lms: Arc<dyn LmsApi>,
        cache: Option<Arc<TtlCache>>,
        settings: DashboardSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut orchestrator = Orchestrator::new();
        if let Some(limit) = settings.fetch_timeout {
            orchestrator = orchestrator.with_task_timeout(limit);
        }
        let caching = cache.is_some();
        if let Some(cache) = cache {
            orchestrator = orchestrator.with_cache(cache);
        }

        let (state, _) = watch::channel(DashboardState::Idle);
        let (snapshot, _) = watch::channel(None);

        Self {
            lms,
            orchestrator,
            caching,
            fallback: FallbackGenerator::new(settings.fallback.clone()),
            settings,
            clock,
            state,
            snapshot,
        }
    }

    /// Current load state.
    pub fn state(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Follow load-state transitions.
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// The last successfully assembled dashboard, for instant rendering.
    pub fn latest(&self) -> Option<DashboardData> {
        self.snapshot.borrow().clone()
    }

    /// Assemble the dashboard `user_id` is entitled to see.
    ///
    /// Fails only when some source produced neither real nor synthetic
    /// data; the previous snapshot is kept in that case.
    pub async fn get_role_scoped_dashboard_data(
        &self,
        user_id: i64,
    ) -> Result<DashboardData, DashboardError> {
        self.state.send_replace(DashboardState::Loading);
        let now = self.clock.now();

        let role = self.resolve_role(user_id).await;
        info!("Building {} dashboard for user {}", role, user_id);

        let tasks: Vec<FetchTask<'_, SourceData>> = sources_for(role)
            .iter()
            .map(|&kind| {
                let task = FetchTask::new(
                    kind.key(),
                    fetch_source(self.lms.as_ref(), &self.settings.functions, kind),
                )
                .with_fallback(move || self.fallback.generate(kind, now));
                if self.caching {
                    task.cached()
                } else {
                    task
                }
            })
            .collect();

        let report = self.orchestrator.fetch_all(tasks).await;

        if !report.is_complete() {
            let err = DashboardError::TotalSourceFailure {
                sources: report.failures.iter().map(|f| f.key.clone()).collect(),
            };
            error!("Dashboard for user {} unavailable: {}", user_id, err);
            self.state
                .send_replace(DashboardState::FatalError(err.to_string()));
            return Err(err);
        }

        let scope = AggregationScope::new(role, user_id)
            .with_activity_window(self.settings.activity_window)
            .with_trend_weeks(self.settings.trend_weeks);
        let view_model = aggregate(&scope, &report.results, now);

        let data = DashboardData {
            role,
            is_degraded: view_model.is_degraded,
            all_sources_failed: report.all_failed(),
            view_model,
        };

        self.snapshot.send_replace(Some(data.clone()));
        self.state.send_replace(if data.is_degraded {
            DashboardState::ReadyDegraded
        } else {
            DashboardState::Ready
        });
        Ok(data)
    }

    /// Classify the user; an unavailable role lookup means no roles.
    async fn resolve_role(&self, user_id: i64) -> CanonicalRole {
        let mut task = FetchTask::new(
            format!("roles:{}", user_id),
            fetch_user_roles(self.lms.as_ref(), &self.settings.functions, user_id),
        )
        .with_fallback(|| Ok(Vec::new()));
        if self.caching {
            task = task.cached();
        }

        let report = self.orchestrator.fetch_all(vec![task]).await;
        let raw: Vec<RawRole> = report
            .results
            .into_iter()
            .next()
            .map(|r| r.value)
            .unwrap_or_default();

        let role = classify(&raw);
        debug!("User {} has {} raw roles, classified as {}", user_id, raw.len(), role);
        role
    }
}
