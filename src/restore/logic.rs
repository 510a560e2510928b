// world-restore/src/restore/logic.rs
use std::fmt;
use std::io;
use tracing::{error, info, warn};

use crate::backup::{self, PreBackupOutcome};
use crate::errors::{RestoreError, Result};
use crate::restore::RestoreContext;
use crate::restore::restart::{RestartOutcome, maybe_restart};
use crate::restore::swap::{locate_staged_world, replace};
use crate::utils::logging::success;
use crate::utils::process::ProcessMonitor;
use crate::utils::replicate::CopyReport;
use crate::utils::workspace::{RESTORE_WORKSPACE, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitProcess,
    PreBackup,
    Extract,
    Swap,
    RestartDecision,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::WaitProcess => "WAIT_PROCESS",
            Phase::PreBackup => "PRE_BACKUP",
            Phase::Extract => "EXTRACT",
            Phase::Swap => "SWAP",
            Phase::RestartDecision => "RESTART_DECISION",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct RestoreOutcome {
    pub pre_backup: PreBackupOutcome,
    pub copy_report: CopyReport,
    pub restart: RestartOutcome,
}

fn enter(phase: Phase) {
    info!("{}", "=".repeat(60));
    info!(%phase, "Entering phase {}", phase);
}

pub(super) fn perform_restore_orchestration(ctx: &RestoreContext) -> Result<RestoreOutcome> {
    let mut phase = Phase::WaitProcess;
    let result = run_phases(ctx, &mut phase);
    if let Err(e) = &result {
        error!(phase = %Phase::Failed, "Restore failed during {}: {}", phase, e);
    }
    result
}

fn run_phases(ctx: &RestoreContext, phase: &mut Phase) -> Result<RestoreOutcome> {
    let request = &ctx.request;

    enter(*phase);
    ProcessMonitor::new(ctx.platform.as_ref()).wait_until_stopped(ctx.wait)?;

    *phase = Phase::PreBackup;
    enter(*phase);
    let pre_backup = backup::run_pre_restore_backup(ctx);

    *phase = Phase::Extract;
    enter(*phase);
    info!("Restoring {}", request.backup_file.display());
    if !request.backup_file.is_file() {
        return Err(RestoreError::Io {
            context: format!("Backup archive {}", request.backup_file.display()),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        });
    }
    // Dropped on every exit path below, which removes the staging area.
    let staging = Workspace::create(&request.server_dir, RESTORE_WORKSPACE)?;
    ctx.backend.extract(&request.backup_file, staging.path())?;
    let staged_world = locate_staged_world(staging.path(), &request.world_name)?;
    info!("Staged world: {}", staged_world.display());

    *phase = Phase::Swap;
    enter(*phase);
    let copy_report = replace(&request.world_dir(), &staged_world, ctx.config.max_workers)?;
    if !copy_report.is_complete() {
        warn!(
            "{} file(s) could not be copied into the restored world",
            copy_report.failed.len()
        );
    }
    drop(staging);
    success!("Backup restore completed");

    *phase = Phase::RestartDecision;
    enter(*phase);
    let restart = maybe_restart(
        &ctx.config.restart,
        &request.server_dir,
        ctx.platform.as_ref(),
    );

    *phase = Phase::Done;
    enter(*phase);
    Ok(RestoreOutcome {
        pre_backup,
        copy_report,
        restart,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::ArchiveBackend;
    use crate::backup::archive::test_support::write_archive;
    use crate::config::Config;
    use crate::restore::RestoreRequest;
    use crate::utils::platform::fake::FakePlatform;
    use crate::utils::process::WaitPolicy;
    use crate::utils::tree::test_support::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_wait() -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_millis(5),
            deadline: Some(Duration::from_secs(5)),
        }
    }

    fn context(server: &Path, archive: &Path, config: Config, platform: FakePlatform) -> RestoreContext {
        RestoreContext::new(
            RestoreRequest::new(archive, server, "Bedrock"),
            config,
            Arc::new(platform),
            fast_wait(),
        )
    }

    fn builtin_tar(server: &Path, archive: &Path, config: Config) -> RestoreContext {
        let mut ctx = context(server, archive, config, FakePlatform::default());
        ctx.backend = ArchiveBackend::Tar { program: None };
        ctx
    }

    #[test]
    fn test_restore_replaces_world_from_tar_archive() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("world.zip");
        write_archive(&archive, &[("worlds/Bedrock/level.dat", "restored level")])?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "current level");
        write_file(server.path(), "worlds/Bedrock/db/old.ldb", "old chunk");

        let ctx = builtin_tar(server.path(), &archive, Config::default());
        let outcome = run_phases(&ctx, &mut Phase::WaitProcess)?;

        let world = server.path().join("worlds/Bedrock");
        assert_eq!(fs::read_to_string(world.join("level.dat"))?, "restored level");
        assert!(!world.join("db/old.ldb").exists());
        assert!(!server.path().join(RESTORE_WORKSPACE).exists());
        assert_eq!(outcome.pre_backup, PreBackupOutcome::Disabled);
        assert_eq!(outcome.restart, RestartOutcome::Disabled);
        assert_eq!(outcome.copy_report.copied, 1);
        Ok(())
    }

    #[test]
    fn test_missing_seven_zip_aborts_without_touching_world() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("world.7z");
        fs::write(&archive, b"7z payload")?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "current level");
        let before = snapshot(&server.path().join("worlds"));

        let config = Config {
            use_7z: true,
            exe_7z_path: server.path().join("plugins/EasyBackuper/7za.exe"),
            ..Config::default()
        };
        let ctx = context(server.path(), &archive, config, FakePlatform::default());
        let err = perform_restore_orchestration(&ctx).unwrap_err();

        assert!(matches!(err, RestoreError::BackendUnavailable { .. }));
        assert_eq!(err.exit_code(), 1);
        assert!(!server.path().join(RESTORE_WORKSPACE).exists());
        assert_eq!(snapshot(&server.path().join("worlds")), before);
        Ok(())
    }

    #[test]
    fn test_empty_archive_leaves_world_in_place() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("empty.tar.gz");
        write_archive(&archive, &[])?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "current level");

        let ctx = builtin_tar(server.path(), &archive, Config::default());
        let err = perform_restore_orchestration(&ctx).unwrap_err();

        assert!(matches!(err, RestoreError::WorldNotStaged { .. }));
        assert_eq!(
            fs::read_to_string(server.path().join("worlds/Bedrock/level.dat"))?,
            "current level"
        );
        assert!(!server.path().join(RESTORE_WORKSPACE).exists());
        Ok(())
    }

    #[test]
    fn test_restore_and_pre_backup_through_system_tar() -> anyhow::Result<()> {
        if crate::utils::find_tar_executable().is_none() {
            return Ok(()); // no tar on PATH
        }
        let server = tempfile::tempdir()?;
        let archive = server.path().join("backup.tar.gz");
        write_archive(&archive, &[("Bedrock/level.dat", "restored")])?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "before restore");

        let config = Config {
            backup_old_world_before_restore: true,
            ..Config::default()
        };
        let ctx = context(server.path(), &archive, config, FakePlatform::default());
        assert!(matches!(ctx.backend, ArchiveBackend::Tar { program: Some(_) }));
        let outcome = perform_restore_orchestration(&ctx)?;

        assert_eq!(
            fs::read_to_string(server.path().join("worlds/Bedrock/level.dat"))?,
            "restored"
        );
        let PreBackupOutcome::Saved(saved) = outcome.pre_backup else {
            panic!("pre-restore backup was not saved: {:?}", outcome.pre_backup);
        };
        let check = server.path().join("check");
        ctx.backend.extract(&saved, &check)?;
        assert_eq!(fs::read_to_string(check.join("Bedrock/level.dat"))?, "before restore");
        Ok(())
    }

    #[test]
    fn test_archive_of_another_world_is_rejected() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("other.tar.gz");
        write_archive(&archive, &[("OtherWorld/level.dat", "other level")])?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "current level");
        let before = snapshot(&server.path().join("worlds"));

        let ctx = builtin_tar(server.path(), &archive, Config::default());
        let err = perform_restore_orchestration(&ctx).unwrap_err();

        assert!(matches!(err, RestoreError::WorldNotStaged { .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(snapshot(&server.path().join("worlds")), before);
        assert!(!server.path().join(RESTORE_WORKSPACE).exists());
        Ok(())
    }

    #[test]
    fn test_restore_twice_is_idempotent() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("backup.tar.gz");
        write_archive(
            &archive,
            &[
                ("Bedrock/level.dat", "level"),
                ("Bedrock/levelname.txt", "Bedrock level"),
                ("Bedrock/db/000010.ldb", "chunks"),
            ],
        )?;

        let ctx = builtin_tar(server.path(), &archive, Config::default());
        run_phases(&ctx, &mut Phase::WaitProcess)?;
        let first = snapshot(&server.path().join("worlds/Bedrock"));
        run_phases(&ctx, &mut Phase::WaitProcess)?;
        let second = snapshot(&server.path().join("worlds/Bedrock"));

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_pre_backup_archives_current_world() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("backup.tar.gz");
        write_archive(&archive, &[("Bedrock/level.dat", "restored")])?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "before restore");

        let config = Config {
            backup_old_world_before_restore: true,
            ..Config::default()
        };
        let ctx = builtin_tar(server.path(), &archive, config);
        let outcome = run_phases(&ctx, &mut Phase::WaitProcess)?;

        let PreBackupOutcome::Saved(saved) = outcome.pre_backup else {
            panic!("pre-restore backup was not saved: {:?}", outcome.pre_backup);
        };
        assert!(saved.starts_with(server.path().join("backup")));
        assert!(!server.path().join("temp_old_world_backup").exists());

        let check = server.path().join("check");
        ctx.backend.extract(&saved, &check)?;
        assert_eq!(fs::read_to_string(check.join("Bedrock/level.dat"))?, "before restore");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_pre_backup_does_not_stop_restore() -> anyhow::Result<()> {
        use crate::backup::archive::test_support::write_script;

        let server = tempfile::tempdir()?;
        let exe = server.path().join("7za");
        // Extraction works; compression always fails.
        write_script(
            &exe,
            r#"if [ "$1" = "x" ]; then
  for arg in "$@"; do case "$arg" in -o*) out="${arg#-o}";; esac; done
  mkdir -p "$out/Bedrock" && printf 'restored' > "$out/Bedrock/level.dat"
  exit 0
fi
echo "simulated compression failure" >&2
exit 2
"#,
        )?;
        let archive = server.path().join("backup.7z");
        fs::write(&archive, b"7z payload")?;
        write_file(server.path(), "worlds/Bedrock/level.dat", "before restore");

        let config = Config {
            use_7z: true,
            exe_7z_path: exe,
            backup_old_world_before_restore: true,
            ..Config::default()
        };
        let ctx = context(server.path(), &archive, config, FakePlatform::default());
        let outcome = perform_restore_orchestration(&ctx)?;

        assert!(matches!(outcome.pre_backup, PreBackupOutcome::Failed(_)));
        assert!(!server.path().join("temp_old_world_backup").exists());
        assert_eq!(
            fs::read_to_string(server.path().join("worlds/Bedrock/level.dat"))?,
            "restored"
        );
        Ok(())
    }

    #[test]
    fn test_waits_for_server_then_restarts() -> anyhow::Result<()> {
        let server = tempfile::tempdir()?;
        let archive = server.path().join("backup.tar.gz");
        write_archive(&archive, &[("Bedrock/level.dat", "restored")])?;
        write_file(server.path(), "start.sh", "./bedrock_server");

        let platform = FakePlatform::with_listings(vec![
            Ok("bedrock_server\n".to_string()),
            Ok("bedrock_server\n".to_string()),
        ]);
        let mut config = Config::default();
        config.restart.enabled = true;
        config.restart.wait_seconds = 0;
        config.restart.start_script_path = "start.sh".into();

        let mut ctx = context(server.path(), &archive, config, platform);
        ctx.backend = ArchiveBackend::Tar { program: None };
        let outcome = perform_restore_orchestration(&ctx)?;

        assert_eq!(
            outcome.restart,
            RestartOutcome::Launched(server.path().join("start.sh"))
        );
        Ok(())
    }
}
