//! Manual attendance subcommands: add, remove.
//!
//! Edits are checked against the session edit window before any request
//! is sent.

use std::io::Write;

use tracing::info;

use campusqr_core::api::{ApiClient, ManualAction};
use campusqr_core::{Clock, EditWindow, TokenKind};

/// Manual edit actions.
#[derive(clap::Subcommand, Debug, Clone)]
pub enum ManualCmd {
    /// Mark a student present by hand.
    Add(EditArgs),
    /// Remove a student's attendance.
    Remove(EditArgs),
}

/// Target of a manual edit.
#[derive(clap::Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(long)]
    pub session: String,
    #[arg(long)]
    pub student: String,
    /// The session is a lab session.
    #[arg(long)]
    pub lab: bool,
    /// Session creation time, Unix milliseconds.
    #[arg(long)]
    pub created_at: i64,
}

impl EditArgs {
    pub const fn kind(&self) -> TokenKind {
        if self.lab {
            TokenKind::LabAttendance
        } else {
            TokenKind::Attendance
        }
    }
}

impl ManualCmd {
    pub const fn parts(&self) -> (ManualAction, &EditArgs) {
        match self {
            Self::Add(args) => (ManualAction::Add, args),
            Self::Remove(args) => (ManualAction::Remove, args),
        }
    }

    /// Reject the edit locally if the session is past its edit window.
    pub fn check_window(&self, window: EditWindow, now_ms: i64) -> campusqr_core::Result<()> {
        let (_, args) = self.parts();
        window.check(&args.session, args.created_at, now_ms)
    }
}

/// Execute a manual edit.
pub async fn run(
    cmd: ManualCmd,
    api: &ApiClient,
    clock: &impl Clock,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    cmd.check_window(EditWindow::default(), clock.now_ms())?;

    let (action, args) = cmd.parts();
    api.manual_edit(args.kind(), action, &args.session, &args.student)
        .await?;
    info!(
        session_id = %args.session,
        student_id = %args.student,
        ?action,
        "Manual attendance edit applied"
    );

    let verb = match action {
        ManualAction::Add => "Added",
        ManualAction::Remove => "Removed",
    };
    writeln!(out, "{verb} {} in session {}", args.student, args.session)?;
    Ok(())
}
