// Job orchestration: local job table, input export and upload, submission,
// result polling, and import of generated assets. All state transitions
// funnel through `set_state` so timers and notifications stay consistent.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::{AssetImporter, InputExporter};
use crate::config::Config;
use crate::http::ApiClient;
use crate::install::unique_path;
use crate::params::{write_parameters, ParameterSet, ParameterValue};
use crate::session::SessionManager;
use crate::types::{ClientError, ClientEvent, ClientResult, JobHandle, JobInfo, JobState};

/// Expected seconds spent in each non-terminal state, used for progress
/// estimation until real durations have been observed.
const DEFAULT_STATE_DURATIONS: [(JobState, f64); 4] = [
    (JobState::Requesting, 0.1),
    (JobState::Queued, 0.1),
    (JobState::Processing, 5.0),
    (JobState::Importing, 0.25),
];

/// Everything needed to run one generation job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_def_id: String,
    pub parameters: ParameterSet,
    /// Host-side path the generated asset is imported under.
    pub import_path: String,
    /// World-space origin subtracted from exported geometry.
    pub origin: [f64; 3],
    /// Scene object this job regenerates, if any. At most one job per
    /// owner runs at a time; a second request is queued and replayed when
    /// the running one settles.
    pub owner: Option<String>,
}

struct Job {
    handle: JobHandle,
    job_def_id: String,
    state: JobState,
    state_entered: Instant,
    remote_job_id: Option<String>,
    import_path: String,
    import_directory: Option<String>,
    owner: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobHandle, Job>,
    next_handle: JobHandle,
    timeouts: HashMap<JobHandle, JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    /// owner -> request queued behind that owner's running job.
    pending: HashMap<String, JobRequest>,
    /// Observed seconds per state rank, overriding the defaults.
    observed_durations: HashMap<u8, f64>,
}

#[derive(Clone)]
pub struct JobOrchestrator {
    api: ApiClient,
    config: Arc<Config>,
    session: SessionManager,
    exporter: Arc<dyn InputExporter>,
    importer: Arc<dyn AssetImporter>,
    events: broadcast::Sender<ClientEvent>,
    inner: Arc<RwLock<JobTable>>,
}

impl JobOrchestrator {
    pub fn new(
        api: ApiClient,
        config: Arc<Config>,
        session: SessionManager,
        exporter: Arc<dyn InputExporter>,
        importer: Arc<dyn AssetImporter>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            api,
            config,
            session,
            exporter,
            importer,
            events,
            inner: Arc::new(RwLock::new(JobTable::default())),
        }
    }

    // ---- accessors ----

    pub async fn job(&self, handle: JobHandle) -> Option<JobInfo> {
        self.inner.read().await.jobs.get(&handle).map(to_info)
    }

    pub async fn jobs(&self) -> Vec<JobInfo> {
        let table = self.inner.read().await;
        let mut jobs: Vec<JobInfo> = table.jobs.values().map(to_info).collect();
        jobs.sort_by_key(|j| j.handle);
        jobs
    }

    /// Estimated completion fraction in [0, 1]. Elapsed time in the
    /// current state is weighed against expected per-state durations,
    /// which adapt as real jobs are observed.
    pub async fn progress(&self, handle: JobHandle) -> Option<f64> {
        let table = self.inner.read().await;
        let job = table.jobs.get(&handle)?;
        if job.state.is_terminal() {
            return Some(1.0);
        }

        let duration_of = |state: JobState| -> f64 {
            let default = DEFAULT_STATE_DURATIONS
                .iter()
                .find(|(s, _)| *s == state)
                .map(|(_, d)| *d)
                .unwrap_or(0.0);
            state
                .rank()
                .and_then(|r| table.observed_durations.get(&r).copied())
                .unwrap_or(default)
        };

        let total: f64 = DEFAULT_STATE_DURATIONS
            .iter()
            .map(|(s, _)| duration_of(*s))
            .sum();
        if total <= 0.0 {
            return Some(0.0);
        }

        let current_rank = job.state.rank()?;
        let done: f64 = DEFAULT_STATE_DURATIONS
            .iter()
            .filter(|(s, _)| s.rank().is_some_and(|r| r < current_rank))
            .map(|(s, _)| duration_of(*s))
            .sum();
        let in_state = job
            .state_entered
            .elapsed()
            .as_secs_f64()
            .min(duration_of(job.state));

        Some(((done + in_state) / total).clamp(0.0, 1.0))
    }

    // ---- execution ----

    /// Runs a job for a scene owner. If that owner already has a job in
    /// flight, the request is held back and replayed once the running job
    /// settles; `None` is returned in that case.
    pub async fn execute_for_owner(&self, request: JobRequest) -> ClientResult<Option<JobHandle>> {
        if let Some(owner) = request.owner.clone() {
            let mut table = self.inner.write().await;
            let busy = table
                .jobs
                .values()
                .any(|j| j.owner.as_deref() == Some(owner.as_str()) && !j.state.is_terminal());
            if busy {
                info!(owner, "Owner already has a running job, queuing request");
                table.pending.insert(owner, request);
                return Ok(None);
            }
        }
        self.execute_job(request).await.map(Some)
    }

    /// Exports the request's scene inputs, registers a local job, and
    /// spawns the upload-and-submit chain. Export failures abort before
    /// any job is created.
    pub async fn execute_job(&self, request: JobRequest) -> ClientResult<JobHandle> {
        self.execute_job_boxed(request).await
    }

    // Boxed so the replay path in `set_state` can recurse into this
    // future; direct async recursion would make `Send` inference cyclic.
    fn execute_job_boxed(
        &self,
        request: JobRequest,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClientResult<JobHandle>> + Send + '_>>
    {
        Box::pin(async move {
        if !self.session.is_created().await {
            return Err(ClientError::InvalidRequest("No active session".to_string()));
        }

        let (exported, export_root, slot_count) = self.prepare_input_files(&request).await?;

        let handle = {
            let mut table = self.inner.write().await;
            table.next_handle += 1;
            let handle = table.next_handle;
            table.jobs.insert(
                handle,
                Job {
                    handle,
                    job_def_id: request.job_def_id.clone(),
                    state: JobState::Invalid,
                    state_entered: Instant::now(),
                    remote_job_id: None,
                    import_path: request.import_path.clone(),
                    import_directory: None,
                    owner: request.owner.clone(),
                    start_time: Utc::now(),
                    end_time: None,
                },
            );
            self.ensure_poll_task(&mut table);
            handle
        };
        self.set_state(handle, JobState::Requesting, "").await;

        let this = self.clone();
        tokio::spawn(async move {
            this.upload_and_submit(handle, request, exported, export_root, slot_count)
                .await;
        });
        Ok(handle)
        })
    }

    /// Exports every populated file-kind parameter into its own slot
    /// directory. Returns the exported files with their slot indices, the
    /// export root, and the total number of file slots.
    async fn prepare_input_files(
        &self,
        request: &JobRequest,
    ) -> ClientResult<(Vec<(usize, PathBuf)>, PathBuf, usize)> {
        let export_root = self
            .config
            .storage
            .cache_dir
            .join("exports")
            .join(uuid::Uuid::new_v4().to_string());

        let mut exported = Vec::new();
        let mut slot_count = 0;
        for parameter in &request.parameters.parameters {
            let ParameterValue::File(file) = &parameter.value else {
                continue;
            };
            let slot = slot_count;
            slot_count += 1;

            let Some(source) = &file.source else {
                continue;
            };
            let dest = export_root.join(format!("input_{}", slot));
            tokio::fs::create_dir_all(&dest).await?;
            match self
                .exporter
                .export_input(source, request.origin, file.transform, &dest)
                .await
            {
                Ok(path) => exported.push((slot, path)),
                Err(e) => {
                    error!(parameter = parameter.name, "Input export failed: {}", e);
                    let _ = tokio::fs::remove_dir_all(&export_root).await;
                    return Err(e);
                }
            }
        }
        Ok((exported, export_root, slot_count))
    }

    async fn upload_and_submit(
        &self,
        handle: JobHandle,
        request: JobRequest,
        exported: Vec<(usize, PathBuf)>,
        export_root: PathBuf,
        slot_count: usize,
    ) {
        let mut input_file_ids = vec![String::new(); slot_count];

        if !exported.is_empty() {
            let paths: Vec<PathBuf> = exported.iter().map(|(_, p)| p.clone()).collect();
            let ids = match self.api.upload_files(&paths).await {
                Ok(ids) => ids,
                Err(e) => {
                    self.fail_job(handle, &format!("Failed to upload input files: {}", e))
                        .await;
                    return;
                }
            };
            if ids.len() != paths.len() {
                self.fail_job(
                    handle,
                    &format!("Upload returned {} ids for {} files", ids.len(), paths.len()),
                )
                .await;
                return;
            }
            for ((slot, _), id) in exported.iter().zip(ids) {
                input_file_ids[*slot] = id;
            }
            if self.config.storage.clean_temp_files {
                let _ = tokio::fs::remove_dir_all(&export_root).await;
            }
        }

        let body = json!({
            "job_def_id": request.job_def_id,
            "params": Value::Object(write_parameters(&input_file_ids, &request.parameters)),
        });
        let response = match self.api.post_json_auth("/v1/jobs/", &body).await {
            Ok(response) => response,
            Err(e) => {
                self.fail_job(handle, &format!("Job submission failed: {}", e))
                    .await;
                return;
            }
        };
        let Some(job_id) = response.get("job_id").and_then(Value::as_str) else {
            self.fail_job(handle, "Job submission response missing job id")
                .await;
            return;
        };

        {
            let mut table = self.inner.write().await;
            if let Some(job) = table.jobs.get_mut(&handle) {
                job.remote_job_id = Some(job_id.to_string());
            }
        }
        info!(handle, job_id, "Job submitted");
        self.set_state(handle, JobState::Queued, "").await;
    }

    // ---- state machine ----

    async fn fail_job(&self, handle: JobHandle, message: &str) {
        error!(handle, "{}", message);
        self.set_state(handle, JobState::Failed, message).await;
    }

    /// Applies a state transition. No-op for unknown handles, repeated
    /// states, and settled jobs; backwards transitions are ignored with a
    /// warning. Arms the timeout timer on `Queued`, disarms it once the
    /// job stops waiting, stamps the end time on terminal states, and
    /// replays any request queued behind the job's owner.
    async fn set_state(&self, handle: JobHandle, new_state: JobState, message: &str) {
        self.set_state_boxed(handle, new_state, message).await
    }

    // Boxed for the same reason as `execute_job_boxed`: the timeout timer
    // spawned here re-enters `set_state` via `fail_job`.
    fn set_state_boxed<'a>(
        &'a self,
        handle: JobHandle,
        new_state: JobState,
        message: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        let replay = {
            let mut table = self.inner.write().await;
            let Some(job) = table.jobs.get_mut(&handle) else {
                return;
            };
            if job.state == new_state || job.state.is_terminal() {
                return;
            }
            if let (Some(from), Some(to)) = (job.state.rank(), new_state.rank()) {
                if to < from {
                    warn!(handle, from = %job.state, to = %new_state, "Ignoring backwards job transition");
                    return;
                }
            }

            let previous = job.state;
            let elapsed = job.state_entered.elapsed().as_secs_f64();
            job.state = new_state;
            job.state_entered = Instant::now();
            if new_state.is_terminal() {
                job.end_time = Some(Utc::now());
            }
            let owner = job.owner.clone();

            if previous != JobState::Invalid {
                if let Some(rank) = previous.rank() {
                    table.observed_durations.insert(rank, elapsed);
                }
            }

            if new_state == JobState::Queued {
                let this = self.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(this.config.jobs.timeout()).await;
                    this.handle_timeout(handle).await;
                });
                if let Some(old) = table.timeouts.insert(handle, timer) {
                    old.abort();
                }
                self.ensure_poll_task(&mut table);
            } else if !new_state.is_waiting() {
                if let Some(timer) = table.timeouts.remove(&handle) {
                    timer.abort();
                }
            }

            // nothing left to poll once every job has settled
            if new_state.is_terminal() && table.jobs.values().all(|j| j.state.is_terminal()) {
                if let Some(poll) = table.poll_task.take() {
                    poll.abort();
                }
            }

            match (new_state.is_terminal(), owner) {
                (true, Some(owner)) => table.pending.remove(&owner),
                _ => None,
            }
        };

        let _ = self.events.send(ClientEvent::JobStateChanged {
            handle,
            state: new_state,
            message: message.to_string(),
        });

        if let Some(request) = replay {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.execute_job(request).await {
                    warn!("Failed to replay queued job request: {}", e);
                }
            });
        }
        })
    }

    async fn handle_timeout(&self, handle: JobHandle) {
        let waiting = {
            let table = self.inner.read().await;
            table
                .jobs
                .get(&handle)
                .map(|j| j.state.is_waiting())
                .unwrap_or(false)
        };
        if waiting {
            self.fail_job(handle, "Timed out").await;
        }
    }

    /// Drops all jobs, their timers, and the poll loop.
    pub async fn clear_jobs(&self) {
        let mut table = self.inner.write().await;
        for (_, timer) in table.timeouts.drain() {
            timer.abort();
        }
        if let Some(poll) = table.poll_task.take() {
            poll.abort();
        }
        table.jobs.clear();
        table.pending.clear();
    }

    // ---- polling ----

    fn ensure_poll_task(&self, table: &mut JobTable) {
        if table.poll_task.is_some() {
            return;
        }
        let this = self.clone();
        table.poll_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.jobs.poll_interval());
            interval.tick().await;
            loop {
                interval.tick().await;
                this.poll_once().await;
            }
        }));
    }

    async fn poll_once(&self) {
        let waiting: Vec<(JobHandle, String)> = {
            let table = self.inner.read().await;
            table
                .jobs
                .values()
                .filter(|j| j.state.is_waiting())
                .filter_map(|j| j.remote_job_id.clone().map(|id| (j.handle, id)))
                .collect()
        };

        for (handle, remote_job_id) in waiting {
            let value = match self
                .api
                .get_json_auth(&format!("/v1/jobs/results/{}", remote_job_id))
                .await
            {
                Ok(value) => value,
                Err(e) => {
                    warn!(handle, "Result poll failed: {}", e);
                    continue;
                }
            };

            let completed = value
                .get("completed")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !completed {
                if self.state_of(handle).await == Some(JobState::Queued) {
                    self.set_state(handle, JobState::Processing, "").await;
                }
                continue;
            }

            let results = value
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for result in &results {
                if let Some(data) = result.get("result_data") {
                    self.handle_stream_item(data).await;
                }
                if !matches!(self.state_of(handle).await, Some(s) if s.is_waiting()) {
                    break;
                }
            }

            // a completed job whose results carried nothing usable
            if matches!(self.state_of(handle).await, Some(s) if s.is_waiting()) {
                self.fail_job(handle, "Failed to produce result mesh").await;
            }
        }
    }

    async fn state_of(&self, handle: JobHandle) -> Option<JobState> {
        self.inner.read().await.jobs.get(&handle).map(|j| j.state)
    }

    async fn handle_by_remote_id(&self, remote_job_id: &str) -> Option<JobHandle> {
        let table = self.inner.read().await;
        table
            .jobs
            .values()
            .find(|j| j.remote_job_id.as_deref() == Some(remote_job_id))
            .map(|j| j.handle)
    }

    /// Processes one streamed result item, routed by the embedded remote
    /// job id. Items referencing unknown jobs or jobs that already settled
    /// are ignored. Crate-visible so a push transport can feed items
    /// directly.
    pub(crate) async fn handle_stream_item(&self, item: &Value) {
        let Some(remote_job_id) = item.get("job_id").and_then(Value::as_str) else {
            return;
        };
        let Some(handle) = self.handle_by_remote_id(remote_job_id).await else {
            return;
        };
        if !matches!(self.state_of(handle).await, Some(s) if s.is_waiting()) {
            return;
        }

        match item.get("item_type").and_then(Value::as_str).unwrap_or("") {
            "progress" => {
                if self.state_of(handle).await == Some(JobState::Queued) {
                    self.set_state(handle, JobState::Processing, "").await;
                }
            }
            "file" => {
                let Some(mesh) = item
                    .get("files")
                    .and_then(|f| f.get("mesh"))
                    .and_then(Value::as_array)
                    .and_then(|m| m.first())
                    .and_then(Value::as_str)
                else {
                    warn!(handle, "Result item carries no mesh file");
                    return;
                };

                if mesh.starts_with("file_") {
                    // hosted result, download before importing
                    self.set_state(handle, JobState::Importing, "").await;
                    match self.api.download(mesh).await {
                        Ok((bytes, content_type)) => {
                            let extension = extension_for(&content_type);
                            self.import_generated(handle, &bytes, extension).await;
                        }
                        Err(e) => {
                            self.fail_job(handle, &format!("Result download failed: {}", e))
                                .await;
                        }
                    }
                } else {
                    // inline payload
                    match base64::engine::general_purpose::STANDARD.decode(mesh) {
                        Ok(bytes) => {
                            self.set_state(handle, JobState::Importing, "").await;
                            self.import_generated(handle, &bytes, "usd").await;
                        }
                        Err(e) => {
                            self.fail_job(handle, &format!("Failed to decode result payload: {}", e))
                                .await;
                        }
                    }
                }
            }
            "completed" => {
                self.fail_job(handle, "Job completed without producing a result")
                    .await;
            }
            other => {
                warn!(handle, item_type = other, "Unknown result item type");
            }
        }
    }

    /// Writes the result payload into a fresh cache directory and hands it
    /// to the host importer under the job's import path.
    async fn import_generated(&self, handle: JobHandle, bytes: &[u8], extension: &str) {
        let Some(import_path) = self
            .inner
            .read()
            .await
            .jobs
            .get(&handle)
            .map(|j| j.import_path.clone())
        else {
            return;
        };
        let (parent, name) = split_import_path(&import_path);

        let result = async {
            let cache_dir = unique_path(&self.config.storage.cache_dir.join("results").join(name));
            tokio::fs::create_dir_all(&cache_dir).await?;
            let file = cache_dir.join(format!("{}.{}", name, extension));
            tokio::fs::write(&file, bytes).await?;

            let imported = self.importer.import_result(&file, Path::new(parent)).await;
            if self.config.storage.clean_temp_files {
                let _ = tokio::fs::remove_dir_all(&cache_dir).await;
            }
            imported
        }
        .await;

        match result {
            Ok(directory) => {
                {
                    let mut table = self.inner.write().await;
                    if let Some(job) = table.jobs.get_mut(&handle) {
                        job.import_directory = Some(directory);
                    }
                }
                self.set_state(handle, JobState::Completed, "").await;
            }
            Err(e) => {
                self.fail_job(handle, &format!("Result import failed: {}", e))
                    .await;
            }
        }
    }
}

fn to_info(job: &Job) -> JobInfo {
    JobInfo {
        handle: job.handle,
        job_def_id: job.job_def_id.clone(),
        state: job.state,
        remote_job_id: job.remote_job_id.clone(),
        import_path: job.import_path.clone(),
        import_directory: job.import_directory.clone(),
        start_time: job.start_time,
        end_time: job.end_time,
    }
}

/// Splits a host import path into its parent directory and leaf name.
fn split_import_path(import_path: &str) -> (&str, &str) {
    match import_path.rsplit_once('/') {
        Some((parent, name)) if !name.is_empty() => {
            (if parent.is_empty() { "/" } else { parent }, name)
        }
        _ => ("/", import_path),
    }
}

fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("usdz") {
        "usdz"
    } else {
        "usd"
    }
}
