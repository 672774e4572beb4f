use crate::infra::open_store;
use chrono::{DateTime, Utc};
use clap::Args;
use roomshare::config::AppConfig;
use roomshare::error::AppError;
use roomshare::telemetry;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct BackupArgs {
    /// Directory that receives the snapshot file
    #[arg(long, default_value = "backups")]
    pub(crate) output_dir: PathBuf,
}

pub(crate) async fn run_backup(args: BackupArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = open_store(&config.database).await?;
    tokio::fs::create_dir_all(&args.output_dir).await?;

    let target = snapshot_path(&args.output_dir, Utc::now());
    store.backup_into(&target).await?;
    store.close().await;

    info!(path = %target.display(), "database snapshot written");
    println!("{}", target.display());
    Ok(())
}

fn snapshot_path(dir: &Path, taken_at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("backup-{}.sqlite", taken_at.format("%Y%m%d-%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_files_are_named_by_timestamp() {
        let taken_at = Utc
            .with_ymd_and_hms(2025, 3, 9, 14, 5, 7)
            .single()
            .expect("valid instant");
        assert_eq!(
            snapshot_path(Path::new("backups"), taken_at),
            PathBuf::from("backups/backup-20250309-140507.sqlite")
        );
    }
}
