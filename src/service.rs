//! Service facade
//!
//! Owns the job registry. Each job sits behind its own async mutex so at most
//! one repair loop runs per job while different jobs proceed in parallel.

use std::sync::Arc;

use artifact_store::ArtifactStore;
use dashmap::DashMap;
use plan_ir::ExplorationResult;
use scry_core_types::JobId;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::{ScryError, ScryResult};
use crate::job::{self, Job, JobArtifacts, TerminalResult};
use crate::orchestrator::RepairOrchestrator;

pub struct ScryService {
    orchestrator: RepairOrchestrator,
    jobs: DashMap<JobId, Arc<Mutex<Job>>>,
}

impl ScryService {
    pub fn new(orchestrator: RepairOrchestrator) -> Self {
        Self {
            orchestrator,
            jobs: DashMap::new(),
        }
    }

    pub fn orchestrator(&self) -> &RepairOrchestrator {
        &self.orchestrator
    }

    /// Validates the exploration and registers a pending job
    pub fn submit_plan(&self, exploration: &ExplorationResult) -> ScryResult<JobId> {
        let job = job::submit_plan(exploration)?;
        let id = job.id().clone();
        info!(job_id = %id, steps = job.plan().len(), "job submitted");
        self.jobs.insert(id.clone(), Arc::new(Mutex::new(job)));
        Ok(id)
    }

    /// Runs the job's repair loop; waits if another loop holds the job
    pub async fn run_repair_loop(&self, id: &JobId) -> ScryResult<TerminalResult> {
        let handle = self.handle(id)?;
        let mut job = handle.lock().await;
        Ok(self.orchestrator.run_repair_loop(&mut job).await)
    }

    /// Copy of the job as it stands now
    pub async fn job(&self, id: &JobId) -> ScryResult<Job> {
        let handle = self.handle(id)?;
        let job = handle.lock().await;
        Ok(job.clone())
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub async fn get_job_artifacts(&self, id: &JobId) -> ScryResult<JobArtifacts> {
        collect_job_artifacts(self.orchestrator.store().as_ref(), id).await
    }

    fn handle(&self, id: &JobId) -> ScryResult<Arc<Mutex<Job>>> {
        self.jobs
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ScryError::JobNotFound(id.clone()))
    }
}

/// Lists a job's stored artifacts; an unknown job yields an empty listing
pub async fn collect_job_artifacts(
    store: &dyn ArtifactStore,
    id: &JobId,
) -> ScryResult<JobArtifacts> {
    let listing = store.list(id).await?;
    Ok(JobArtifacts::from_listing(id.clone(), listing))
}
