use tokio_cron_scheduler::{Job, JobScheduler};

use std::time::Duration;
use tracing::{error, info};

use crate::engine::{EngineHandle, Turn};
use crate::error::BoardResult;

pub struct Scheduler {
    scheduler: JobScheduler,
    engine: EngineHandle, // communication to the board engine
}

#[derive(Debug, Clone, Copy)]
pub enum JobProcess {
    SweepStaleData(Duration),
    PurgeExpiredCache(Duration),
    ReportCacheStats(Duration),
}

impl JobProcess {
    fn turn(&self) -> Turn {
        match self {
            JobProcess::SweepStaleData(_) => Turn::Sweep,
            JobProcess::PurgeExpiredCache(_) => Turn::PurgeCache,
            JobProcess::ReportCacheStats(_) => Turn::ReportStats,
        }
    }

    fn every(&self) -> Duration {
        match self {
            JobProcess::SweepStaleData(every)
            | JobProcess::PurgeExpiredCache(every)
            | JobProcess::ReportCacheStats(every) => *every,
        }
    }
}

impl Scheduler {
    pub async fn new(engine: EngineHandle) -> BoardResult<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Scheduler { scheduler, engine })
    }

    pub async fn add_job(&self, job_process: JobProcess) -> BoardResult<uuid::Uuid> {
        let job = periodic_turn_job(job_process, self.engine.clone()).await?;
        Ok(self.scheduler.add(job).await?)
    }

    pub async fn start(&self) -> BoardResult<()> {
        Ok(self.scheduler.start().await?)
    }

    pub async fn shutdown(&mut self) -> BoardResult<()> {
        Ok(self.scheduler.shutdown().await?)
    }
}

//////////////////
// Jobs definition
//////////////////

async fn periodic_turn_job(job_process: JobProcess, engine: EngineHandle) -> BoardResult<Job> {
    info!(
        "Scheduling {:?} every {} seconds",
        job_process,
        job_process.every().as_secs()
    );
    let job = Job::new_repeated_async(job_process.every(), move |_uuid, _l| {
        let engine = engine.clone();
        Box::pin(async move {
            if let Err(e) = engine.send(job_process.turn()).await {
                error!("Could not run {:?}. {e}", job_process);
            }
        })
    })?;
    Ok(job)
}
