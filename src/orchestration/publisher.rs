//! Registration Orchestrator - drives the publish pipeline
//!
//! Steps, once per run over a validated [`PublishSpec`]:
//! 1. create the container (failure aborts the run)
//! 2. upload the logo and application artifacts (failures become warnings)
//! 3. register each component (failures are recorded, the run continues)
//!
//! Steps 2 and 3 may run on a bounded worker pool; results are always
//! reassembled in declaration order.

use crate::core::error::{PublishError, Result};
use crate::core::traits::PlatformApi;
use crate::orchestration::report::{EntityRef, OutcomeEntry, OutcomeReport, OutcomeStatus};
use crate::validation::document::{ApplicationSpec, PublishSpec};
use crate::validation::spec_validator::read_publish_file;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared cancellation signal
///
/// Once set, no new request is issued; requests already in flight complete.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Publish options
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Maximum concurrent uploads/registrations (1 = sequential)
    pub max_concurrency: usize,

    pub cancel: CancelFlag,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            cancel: CancelFlag::new(),
        }
    }
}

impl PublishOptions {
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// First authentication failure seen during a run
#[derive(Debug, Clone, Default)]
struct Halt(Arc<OnceLock<String>>);

impl Halt {
    fn reason(&self) -> Option<String> {
        self.0.get().cloned()
    }

    fn observe<T>(&self, result: &Result<T>) {
        if let Err(error) = result
            && error.is_auth_failure()
        {
            let _ = self.0.set(error.to_string());
        }
    }
}

enum JobOutcome<T> {
    Done(Result<T>),
    /// Not sent because an earlier request failed authentication
    Halted(String),
    /// Not sent because the run was cancelled
    Skipped,
}

enum Pending<T> {
    Ready(JobOutcome<T>),
    Running(JoinHandle<Result<T>>),
}

#[derive(Debug, Clone)]
enum Artifact {
    Logo {
        declared: PathBuf,
        path: PathBuf,
    },
    Application {
        spec: ApplicationSpec,
        path: PathBuf,
    },
}

impl Artifact {
    fn label(&self) -> String {
        match self {
            Self::Logo { declared, .. } => format!("logo {}", declared.display()),
            Self::Application { spec, .. } => {
                format!("application '{}' ({})", spec.name, spec.path.display())
            }
        }
    }
}

/// RegistrationOrchestrator - registers one publish file against the platform
pub struct RegistrationOrchestrator<A: ?Sized> {
    api: Arc<A>,
    options: PublishOptions,
}

impl<A> RegistrationOrchestrator<A>
where
    A: PlatformApi + ?Sized + 'static,
{
    pub fn new(api: Arc<A>, options: PublishOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Register the container, its artifacts and its components
    ///
    /// Never fails: every outcome, including an aborted run, is captured in
    /// the returned report.
    pub async fn run(&self, spec: &PublishSpec) -> OutcomeReport {
        let container = EntityRef::Container {
            name: spec.container.name.clone(),
        };

        if self.options.cancel.is_cancelled() {
            info!("publish cancelled before any request was sent");
            return Self::all_skipped(spec);
        }

        info!(
            container = %spec.container.name,
            version = %spec.container.version,
            components = spec.components.len(),
            "registering container"
        );
        let container_id = match self.create_container(spec).await {
            Ok(id) => id,
            Err(error) => {
                warn!(container = %spec.container.name, %error, "container registration failed");
                return OutcomeReport::aborted(OutcomeEntry::new(
                    container,
                    OutcomeStatus::Failed,
                    error.to_string(),
                ));
            }
        };
        info!(container = %spec.container.name, id = %container_id, "container created");

        let halt = Halt::default();
        let warnings = self.upload_artifacts(spec, &container_id, &halt).await;

        let mut report = OutcomeReport::new();
        report.push(
            OutcomeEntry::new(container, OutcomeStatus::Created, format!("id={}", container_id))
                .with_warnings(warnings),
        );
        self.register_components(spec, &container_id, &halt, &mut report)
            .await;

        report
    }

    async fn create_container(&self, spec: &PublishSpec) -> Result<String> {
        let record = self.api.create_container(&spec.container).await?;

        record
            .id
            .filter(|id| !id.is_empty())
            .or_else(|| spec.container.id.clone())
            .ok_or_else(|| PublishError::protocol("container reply carried no id"))
    }

    /// Upload logo and applications; returns one warning per failed artifact
    async fn upload_artifacts(
        &self,
        spec: &PublishSpec,
        container_id: &str,
        halt: &Halt,
    ) -> Vec<String> {
        let mut artifacts = Vec::new();
        if let (Some(declared), Some(path)) = (&spec.container.logo, spec.logo_path()) {
            artifacts.push(Artifact::Logo {
                declared: declared.clone(),
                path,
            });
        }
        artifacts.extend(spec.container.applications.iter().map(|application| {
            Artifact::Application {
                path: spec.resolve(&application.path),
                spec: application.clone(),
            }
        }));

        if artifacts.is_empty() {
            return Vec::new();
        }

        let labels: Vec<String> = artifacts.iter().map(Artifact::label).collect();
        let api = Arc::clone(&self.api);
        let container_id = container_id.to_string();

        let outcomes = self
            .dispatch(artifacts, halt, move |artifact| {
                let api = Arc::clone(&api);
                let container_id = container_id.clone();
                async move {
                    match artifact {
                        Artifact::Logo { path, .. } => api.upload_logo(&container_id, &path).await,
                        Artifact::Application { spec, path } => {
                            api.upload_application(&container_id, &spec, &path).await
                        }
                    }
                }
            })
            .await;

        labels
            .into_iter()
            .zip(outcomes)
            .filter_map(|(label, outcome)| match outcome {
                JobOutcome::Done(Ok(())) => {
                    info!(artifact = %label, "uploaded");
                    None
                }
                JobOutcome::Done(Err(error)) => {
                    warn!(artifact = %label, %error, "upload failed");
                    Some(format!("{}: {}", label, error))
                }
                JobOutcome::Halted(reason) => Some(format!("{}: not uploaded, {}", label, reason)),
                JobOutcome::Skipped => Some(format!("{}: skipped, run cancelled", label)),
            })
            .collect()
    }

    async fn register_components(
        &self,
        spec: &PublishSpec,
        container_id: &str,
        halt: &Halt,
        report: &mut OutcomeReport,
    ) {
        let api = Arc::clone(&self.api);
        let owned_id = container_id.to_string();

        let outcomes = self
            .dispatch(spec.components.clone(), halt, move |component| {
                let api = Arc::clone(&api);
                let container_id = owned_id.clone();
                async move { api.create_component(&container_id, &component).await }
            })
            .await;

        for (component, outcome) in spec.components.iter().zip(outcomes) {
            let entity = EntityRef::Component {
                id: component.id.clone(),
            };
            let entry = match outcome {
                JobOutcome::Done(Ok(record)) => {
                    let id = record.id.unwrap_or_else(|| component.id.clone());
                    info!(component = %component.id, %id, "component created");
                    OutcomeEntry::new(entity, OutcomeStatus::Created, format!("id={}", id))
                }
                JobOutcome::Done(Err(error)) => {
                    warn!(component = %component.id, %error, "component registration failed");
                    OutcomeEntry::new(entity, OutcomeStatus::Failed, error.to_string())
                }
                JobOutcome::Halted(reason) => OutcomeEntry::new(
                    entity,
                    OutcomeStatus::Failed,
                    format!("not attempted: {}", reason),
                ),
                JobOutcome::Skipped => OutcomeEntry::new(
                    entity,
                    OutcomeStatus::Skipped,
                    "run cancelled before registration",
                ),
            };
            report.push(entry);
        }
    }

    /// Run `work` over `jobs`, returning outcomes in job order
    ///
    /// Before each job starts, cancellation and the auth halt are checked; a
    /// job that is not started is reported as skipped or halted.
    async fn dispatch<J, T, F, Fut>(&self, jobs: Vec<J>, halt: &Halt, work: F) -> Vec<JobOutcome<T>>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(J) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cancel = &self.options.cancel;
        let workers = self.options.max_concurrency.max(1);
        let mut outcomes = Vec::with_capacity(jobs.len());

        if workers == 1 {
            for job in jobs {
                let outcome = if cancel.is_cancelled() {
                    JobOutcome::Skipped
                } else if let Some(reason) = halt.reason() {
                    JobOutcome::Halted(reason)
                } else {
                    let result = work(job).await;
                    halt.observe(&result);
                    JobOutcome::Done(result)
                };
                outcomes.push(outcome);
            }
            return outcomes;
        }

        debug!(workers, jobs = jobs.len(), "dispatching on worker pool");
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pending = Vec::with_capacity(jobs.len());

        // Permits are taken in job order, so requests also start in job order
        for job in jobs {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                pending.push(Pending::Ready(JobOutcome::Skipped));
                continue;
            };
            if cancel.is_cancelled() {
                pending.push(Pending::Ready(JobOutcome::Skipped));
                continue;
            }
            if let Some(reason) = halt.reason() {
                pending.push(Pending::Ready(JobOutcome::Halted(reason)));
                continue;
            }

            let future = work(job);
            let halt = halt.clone();
            pending.push(Pending::Running(tokio::spawn(async move {
                let _permit = permit;
                let result = future.await;
                halt.observe(&result);
                result
            })));
        }

        for job in pending {
            outcomes.push(match job {
                Pending::Ready(outcome) => outcome,
                Pending::Running(handle) => JobOutcome::Done(handle.await.unwrap_or_else(|e| {
                    Err(PublishError::Internal {
                        message: format!("worker task failed: {}", e),
                    })
                })),
            });
        }
        outcomes
    }

    fn all_skipped(spec: &PublishSpec) -> OutcomeReport {
        let mut report = OutcomeReport::new();
        report.push(OutcomeEntry::new(
            EntityRef::Container {
                name: spec.container.name.clone(),
            },
            OutcomeStatus::Skipped,
            "run cancelled before registration",
        ));
        for component in &spec.components {
            report.push(OutcomeEntry::new(
                EntityRef::Component {
                    id: component.id.clone(),
                },
                OutcomeStatus::Skipped,
                "run cancelled before registration",
            ));
        }
        report
    }
}

/// Read, validate and publish one publish file
///
/// Validation failures are returned before any request is sent.
pub async fn publish_file<A>(
    path: &Path,
    api: Arc<A>,
    options: PublishOptions,
) -> Result<OutcomeReport>
where
    A: PlatformApi + ?Sized + 'static,
{
    let spec = read_publish_file(path).await?;
    debug!(path = %path.display(), "publish file is valid");
    Ok(RegistrationOrchestrator::new(api, options).run(&spec).await)
}
