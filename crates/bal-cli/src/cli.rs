use std::path::PathBuf;

use bal_core::TaskKind;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "bal-cron")]
#[command(about = "Run one BAL publication task and exit")]
#[command(version)]
pub struct Cli {
    /// Task to run
    #[arg(value_enum)]
    pub task: CronTask,

    /// Override BAL_DATABASE_PATH
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum CronTask {
    DetectOutdated,
    SyncOutdated,
    RemoveDemoBal,
    RemoveSoftDeleteBal,
    DetectConflict,
}

impl From<CronTask> for TaskKind {
    fn from(task: CronTask) -> Self {
        match task {
            CronTask::DetectOutdated => Self::DetectOutdated,
            CronTask::SyncOutdated => Self::SyncOutdated,
            CronTask::RemoveDemoBal => Self::RemoveDemoBal,
            CronTask::RemoveSoftDeleteBal => Self::RemoveSoftDeleteBal,
            CronTask::DetectConflict => Self::DetectConflict,
        }
    }
}
