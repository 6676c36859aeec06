//! Lab session subcommands: create, delete, show.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;
use std::time::Duration;

use tracing::info;

use campusqr_core::api::{ApiClient, LabSessionRequest};
use campusqr_core::{Emitter, EmitterTarget, LabClass, SystemClock};

use crate::emit_cmd::{class_field, ctrl_c, stream_tokens};
use crate::output::{write_lab_created, write_roster};

/// Lab subcommand actions.
#[derive(clap::Subcommand, Debug, Clone)]
pub enum LabAction {
    /// Open a lab session for one batch.
    Create(CreateArgs),
    /// Delete a lab session and its attendance.
    Delete {
        #[arg(long)]
        session: String,
    },
    /// List the students marked present.
    Show {
        #[arg(long)]
        session: String,
    },
}

/// Arguments of `campusqr lab create`.
#[derive(clap::Args, Debug, Clone)]
pub struct CreateArgs {
    /// Teacher ID.
    #[arg(long)]
    pub teacher: String,
    /// Class year.
    #[arg(long)]
    pub year: String,
    /// Division.
    #[arg(long)]
    pub division: String,
    /// Batch label, e.g. "C1".
    #[arg(long)]
    pub batch: String,
    /// Subject name.
    #[arg(long)]
    pub subject: String,
    /// Start emitting lab tokens for the new session right away.
    #[arg(long)]
    pub emit: bool,
}

impl CreateArgs {
    pub fn request(&self) -> LabSessionRequest {
        LabSessionRequest {
            teacher_id: self.teacher.clone(),
            year: class_field(&self.year),
            division: class_field(&self.division),
            batch: class_field(&self.batch),
            subject: self.subject.clone(),
        }
    }
}

/// Execute a lab subcommand.
pub async fn run(
    action: LabAction,
    api: &ApiClient,
    interval: Duration,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        LabAction::Create(args) => create(&args, api, interval, out).await,
        LabAction::Delete { session } => {
            api.delete_lab_session(&session).await?;
            writeln!(out, "Deleted lab session {session}")?;
            Ok(())
        }
        LabAction::Show { session } => {
            let roster = api.lab_session(&session).await?;
            write_roster(out, &roster)?;
            Ok(())
        }
    }
}

async fn create(
    args: &CreateArgs,
    api: &ApiClient,
    interval: Duration,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let request = args.request();
    let created = api.create_lab_session(&request).await?;
    info!(session_id = %created.session_id, "Lab session created");
    writeln!(out, "Lab session created")?;
    write_lab_created(out, &created)?;

    if args.emit {
        let class = LabClass {
            year: request.year,
            division: request.division,
            batch: request.batch,
        };
        let emitter = Emitter::new(created.session_id, EmitterTarget::Lab(class), SystemClock);
        stream_tokens(emitter, interval, None, out, ctrl_c()).await?;
    }
    Ok(())
}
