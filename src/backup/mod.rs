mod logic;
pub(crate) mod archive;

pub use logic::PreBackupOutcome;

use crate::restore::RestoreContext;

/// Entry point for the optional pre-restore backup. Never fails the run:
/// every problem is logged and reported in the outcome.
pub fn run_pre_restore_backup(ctx: &RestoreContext) -> PreBackupOutcome {
    logic::perform_pre_restore_backup(ctx)
}
