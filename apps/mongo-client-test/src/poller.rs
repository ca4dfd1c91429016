//! The polling loop.
//!
//! Every cycle spawns one query task and one sleep task and waits for both,
//! so a cycle lasts `max(query time, interval)`.

use core_config::{ConfigError, FromEnv, env_flag, env_parse};
use observability::TaskMetrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::events::ConnectionState;
use crate::samples::SampleRepository;

/// Title label of the query task
pub const TASK_TITLE: &str = "Get documents";

/// Successful tasks slower than this are logged as warnings
pub const SLOW_TASK_THRESHOLD: Duration = Duration::from_millis(100);

/// In verbose mode every n-th execution logs its result
pub const VERBOSE_LOG_EVERY: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    /// Duration of the sleep task
    pub interval: Duration,
    pub query_limit: i64,
    pub verbose: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            query_limit: 5,
            verbose: false,
        }
    }
}

/// Environment variables:
/// - `POLL_INTERVAL_MS` (default: 500)
/// - `QUERY_LIMIT` (default: 5, must be positive)
/// - `VERBOSE` (default: false)
impl FromEnv for PollerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let interval_ms = env_parse("POLL_INTERVAL_MS", defaults.interval.as_millis() as u64)?;

        // 0 means "no limit" to the driver and negatives change the cursor mode
        let query_limit = env_parse("QUERY_LIMIT", defaults.query_limit)?;
        if query_limit <= 0 {
            return Err(ConfigError::ParseError {
                key: "QUERY_LIMIT".to_string(),
                details: format!("must be a positive integer, got {query_limit}"),
            });
        }

        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            query_limit,
            verbose: env_flag("VERBOSE", defaults.verbose),
        })
    }
}

/// Outcome of one query task, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success { documents: usize },
    Failure,
}

pub struct Poller<R: ?Sized> {
    repo: Arc<R>,
    state: Arc<ConnectionState>,
    config: PollerConfig,
    executions: AtomicU64,
}

impl<R> Poller<R>
where
    R: SampleRepository + ?Sized + 'static,
{
    pub fn new(repo: Arc<R>, state: Arc<ConnectionState>, config: PollerConfig) -> Self {
        Self {
            repo,
            state,
            config,
            executions: AtomicU64::new(0),
        }
    }

    /// Number of query tasks started so far
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Run one query, record its metrics and log per the outcome
    pub async fn execute_query(&self) -> TaskOutcome {
        let execution = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        let was_disconnected = !self.state.is_connected();
        if was_disconnected {
            self.state.count_disconnected_execution();
            info!(task = TASK_TITLE, execution, "Starting task while MongoDB is not connected");
        } else {
            let issued = self.state.take_disconnected_executions();
            if issued > 0 {
                info!(
                    task = TASK_TITLE,
                    execution,
                    issued,
                    "Issued {issued} tasks while MongoDB was not connected"
                );
            }
        }

        TaskMetrics::started(TASK_TITLE);
        let start = Instant::now();
        let result = self.repo.find(self.config.query_limit).await;
        let elapsed = start.elapsed();

        match result {
            Ok(documents) => {
                TaskMetrics::succeeded(TASK_TITLE, elapsed);

                let slow = elapsed > SLOW_TASK_THRESHOLD;
                if slow || was_disconnected {
                    warn!(
                        task = TASK_TITLE,
                        execution,
                        elapsed_ms = elapsed.as_millis() as u64,
                        slow_task = slow,
                        was_disconnected,
                        "Task succeeded after {}ms",
                        elapsed.as_millis()
                    );
                } else if self.config.verbose && execution % VERBOSE_LOG_EVERY == 0 {
                    info!(
                        task = TASK_TITLE,
                        execution,
                        documents = documents.len(),
                        "Task returned {} documents",
                        documents.len()
                    );
                }

                if let Some(wait) = self.state.take_first_query_wait() {
                    TaskMetrics::first_query_after(wait);
                    info!(
                        task = TASK_TITLE,
                        execution,
                        elapsed_ms = wait.as_millis() as u64,
                        "First time to execute after disconnection: {}ms",
                        wait.as_millis()
                    );
                }

                TaskOutcome::Success {
                    documents: documents.len(),
                }
            }
            Err(e) => {
                TaskMetrics::failed(TASK_TITLE, elapsed);
                error!(
                    task = TASK_TITLE,
                    execution,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Task failed"
                );
                TaskOutcome::Failure
            }
        }
    }

    /// Spawn the query and the sleep, wait for both
    pub async fn run_cycle(self: &Arc<Self>) {
        let mut tasks = JoinSet::new();

        let this = Arc::clone(self);
        tasks.spawn(async move {
            this.execute_query().await;
        });
        let interval = self.config.interval;
        tasks.spawn(async move {
            tokio::time::sleep(interval).await;
        });

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Poll task panicked or was cancelled");
            }
        }
    }

    /// Loop until `shutdown` flips to true. The running cycle completes first.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            query_limit = self.config.query_limit,
            verbose = self.config.verbose,
            "Starting poller"
        );

        loop {
            if *shutdown.borrow() {
                info!(executions = self.executions(), "Received shutdown signal, stopping poller");
                break;
            }
            self.run_cycle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{MockSampleRepository, SampleError};
    use mongodb::bson::doc;
    use observability::tasks::{STARTED_TASKS_TOTAL, TASKS_TOTAL};
    use observability::testing::{local_recorder, sample_value};

    const FIRST_QUERY_COUNT: &str = "mongodb_client_test_time_to_first_query_duration_count";

    fn poller(repo: MockSampleRepository, interval: Duration) -> Arc<Poller<MockSampleRepository>> {
        let config = PollerConfig {
            interval,
            ..PollerConfig::default()
        };
        Arc::new(Poller::new(
            Arc::new(repo),
            Arc::new(ConnectionState::new()),
            config,
        ))
    }

    fn connected_state() -> Arc<ConnectionState> {
        let state = Arc::new(ConnectionState::new());
        state.connect();
        state
    }

    /// Drive `fut` on a current-thread runtime with a local recorder.
    /// Returns its output and the rendered metrics.
    fn with_metrics<Fut: std::future::Future>(fut: Fut) -> (Fut::Output, String) {
        let recorder = local_recorder();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let output = metrics::with_local_recorder(&recorder, || runtime.block_on(fut));
        (output, recorder.handle().render())
    }

    fn tasks_total(rendered: &str, result: &str) -> Option<f64> {
        let result = format!("result=\"{result}\"");
        sample_value(
            rendered,
            TASKS_TOTAL,
            &[result.as_str(), "title=\"Get documents\""],
        )
    }

    #[test]
    fn test_poller_config_defaults() {
        temp_env::with_vars(
            [
                ("POLL_INTERVAL_MS", None::<&str>),
                ("QUERY_LIMIT", None::<&str>),
                ("VERBOSE", None::<&str>),
            ],
            || {
                let config = PollerConfig::from_env().unwrap();
                assert_eq!(config, PollerConfig::default());
                assert_eq!(config.interval, Duration::from_millis(500));
                assert_eq!(config.query_limit, 5);
            },
        );
    }

    #[test]
    fn test_poller_config_rejects_bad_interval() {
        temp_env::with_var("POLL_INTERVAL_MS", Some("soon"), || {
            let err = PollerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("POLL_INTERVAL_MS"));
        });
    }

    #[test]
    fn test_poller_config_rejects_non_positive_limit() {
        for value in ["0", "-3"] {
            temp_env::with_var("QUERY_LIMIT", Some(value), || {
                let err = PollerConfig::from_env().unwrap_err();
                assert!(
                    matches!(&err, ConfigError::ParseError { key, .. } if key == "QUERY_LIMIT"),
                    "QUERY_LIMIT={value} gave {err:?}"
                );
            });
        }
        temp_env::with_var("QUERY_LIMIT", Some("1"), || {
            assert_eq!(PollerConfig::from_env().unwrap().query_limit, 1);
        });
    }

    #[test]
    fn test_successful_query_counts_success_only() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo
            .expect_find()
            .with(mockall::predicate::eq(5))
            .times(1)
            .returning(|_| Ok(vec![doc! { "name": "Sample-0" }, doc! { "name": "Sample-1" }]));
        let poller = poller(mock_repo, Duration::ZERO);

        let (outcome, rendered) = with_metrics(poller.execute_query());
        assert_eq!(outcome, TaskOutcome::Success { documents: 2 });

        assert_eq!(tasks_total(&rendered, "success"), Some(1.0));
        assert_eq!(tasks_total(&rendered, "failure"), None);
        assert_eq!(
            sample_value(&rendered, STARTED_TASKS_TOTAL, &["title=\"Get documents\""]),
            Some(1.0)
        );
        assert_eq!(
            sample_value(&rendered, "mongodb_client_test_task_duration_count", &[]),
            Some(1.0)
        );
    }

    #[test]
    fn test_failed_query_counts_failure() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo
            .expect_find()
            .returning(|_| Err(SampleError::Database("server selection timeout".to_string())));
        let poller = poller(mock_repo, Duration::ZERO);

        let (outcomes, rendered) = with_metrics(async {
            (poller.execute_query().await, poller.execute_query().await)
        });
        assert_eq!(outcomes, (TaskOutcome::Failure, TaskOutcome::Failure));

        assert_eq!(tasks_total(&rendered, "failure"), Some(2.0));
        assert_eq!(tasks_total(&rendered, "success"), None);
        assert_eq!(
            sample_value(&rendered, "mongodb_client_test_task_duration_count", &[]),
            Some(2.0)
        );
        assert_eq!(poller.executions(), 2);
    }

    #[test]
    fn test_success_while_disconnected_still_counts_success() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo
            .expect_find()
            .times(2)
            .returning(|_| Ok(vec![doc! { "name": "Sample-0" }]));
        let state = connected_state();
        state.disconnect();
        let poller = Arc::new(Poller::new(
            Arc::new(mock_repo),
            Arc::clone(&state),
            PollerConfig::default(),
        ));

        let (outcomes, rendered) = with_metrics(async {
            (poller.execute_query().await, poller.execute_query().await)
        });
        assert_eq!(outcomes.0, TaskOutcome::Success { documents: 1 });
        assert_eq!(outcomes.1, TaskOutcome::Success { documents: 1 });

        assert_eq!(tasks_total(&rendered, "success"), Some(2.0));
        assert_eq!(tasks_total(&rendered, "failure"), None);
        // only the first success after the disconnect is observed
        assert_eq!(sample_value(&rendered, FIRST_QUERY_COUNT, &[]), Some(1.0));
        assert_eq!(state.take_disconnected_executions(), 2);
    }

    #[test]
    fn test_failure_does_not_end_first_query_wait() {
        let mut mock_repo = MockSampleRepository::new();
        let mut calls = 0;
        mock_repo.expect_find().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(SampleError::Database("not primary".to_string()))
            } else {
                Ok(vec![])
            }
        });
        let state = connected_state();
        state.disconnect();
        let poller = Arc::new(Poller::new(
            Arc::new(mock_repo),
            state,
            PollerConfig::default(),
        ));

        let (_, rendered) = with_metrics(async {
            poller.execute_query().await;
            poller.execute_query().await;
        });
        assert_eq!(tasks_total(&rendered, "failure"), Some(1.0));
        assert_eq!(sample_value(&rendered, FIRST_QUERY_COUNT, &[]), Some(1.0));
    }

    #[test]
    fn test_disconnected_executions_reset_once_connected() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo.expect_find().times(3).returning(|_| Ok(vec![]));
        let state = Arc::new(ConnectionState::new());
        let poller = Arc::new(Poller::new(
            Arc::new(mock_repo),
            Arc::clone(&state),
            PollerConfig::default(),
        ));

        with_metrics(async {
            poller.execute_query().await;
            poller.execute_query().await;
            state.connect();
            poller.execute_query().await;
        });

        assert_eq!(state.take_disconnected_executions(), 0);
        assert_eq!(poller.executions(), 3);
    }

    #[test]
    fn test_verbose_runs_through_tenth_execution() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo
            .expect_find()
            .times(10)
            .returning(|_| Ok(vec![doc! { "name": "Sample-0" }, doc! { "name": "Sample-1" }]));
        let config = PollerConfig {
            verbose: true,
            ..PollerConfig::default()
        };
        let poller = Arc::new(Poller::new(Arc::new(mock_repo), connected_state(), config));

        let (outcomes, rendered) = with_metrics(async {
            let mut outcomes = Vec::new();
            for _ in 0..VERBOSE_LOG_EVERY {
                outcomes.push(poller.execute_query().await);
            }
            outcomes
        });

        assert!(outcomes.iter().all(|o| *o == TaskOutcome::Success { documents: 2 }));
        assert_eq!(poller.executions(), 10);
        assert_eq!(tasks_total(&rendered, "success"), Some(10.0));
        assert_eq!(sample_value(&rendered, FIRST_QUERY_COUNT, &[]), None);
    }

    #[test]
    fn test_slow_task_still_counts_success() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo.expect_find().times(1).returning(|_| {
            std::thread::sleep(SLOW_TASK_THRESHOLD + Duration::from_millis(20));
            Ok(vec![])
        });
        let poller = Arc::new(Poller::new(
            Arc::new(mock_repo),
            connected_state(),
            PollerConfig::default(),
        ));

        let (outcome, rendered) = with_metrics(poller.execute_query());
        assert_eq!(outcome, TaskOutcome::Success { documents: 0 });
        assert_eq!(tasks_total(&rendered, "success"), Some(1.0));
        assert_eq!(
            sample_value(
                &rendered,
                "mongodb_client_test_task_duration_bucket",
                &["le=\"0.1\""]
            ),
            Some(0.0)
        );
    }

    #[test]
    fn test_cycle_waits_for_interval() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo.expect_find().times(1).returning(|_| Ok(vec![]));
        let poller = poller(mock_repo, Duration::from_millis(50));

        let (elapsed, rendered) = with_metrics(async {
            let start = Instant::now();
            poller.run_cycle().await;
            start.elapsed()
        });

        assert!(elapsed >= Duration::from_millis(50));
        assert_eq!(tasks_total(&rendered, "success"), Some(1.0));
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo.expect_find().returning(|_| Ok(vec![]));
        let poller = poller(mock_repo, Duration::from_millis(10));

        let (tx, rx) = watch::channel(false);
        let runner = Arc::clone(&poller);
        with_metrics(async move {
            let handle = tokio::spawn(runner.run(rx));
            tokio::time::sleep(Duration::from_millis(35)).await;
            tx.send(true).unwrap();
            handle.await.unwrap();
        });

        assert!(poller.executions() >= 1);
    }

    #[test]
    fn test_run_exits_immediately_when_already_shut_down() {
        let mut mock_repo = MockSampleRepository::new();
        mock_repo.expect_find().never();
        let poller = poller(mock_repo, Duration::from_millis(10));

        let (_tx, rx) = watch::channel(true);
        let runner = Arc::clone(&poller);
        with_metrics(runner.run(rx));

        assert_eq!(poller.executions(), 0);
    }
}
