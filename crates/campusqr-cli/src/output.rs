//! Output formatting helpers.
//!
//! Payloads and scan outcomes are one JSON object per line so the output
//! can be piped into a QR renderer or a script.

use std::io::{self, Write};

use campusqr_core::api::{LabSessionCreated, LabSessionRoster};
use campusqr_core::{ScanOutcome, StudentContext};

pub fn write_outcome(w: &mut impl Write, outcome: &ScanOutcome) -> io::Result<()> {
    let mut line = serde_json::json!({
        "code": outcome.code(),
        "title": outcome.title(),
        "message": outcome.message(),
        "autoReset": outcome.auto_resets(),
    });
    if let ScanOutcome::Marked { kind, session_id } = outcome {
        line["type"] = kind.as_str().into();
        line["sessionId"] = session_id.as_str().into();
    }
    writeln!(w, "{line}")
}

pub fn write_context(w: &mut impl Write, ctx: &StudentContext) -> io::Result<()> {
    let field = |v: Option<&str>| v.unwrap_or("-").to_string();
    writeln!(w, "  Student:  {}", field(ctx.student_id.as_deref()))?;
    writeln!(w, "  Year:     {}", field(ctx.year.as_deref()))?;
    writeln!(w, "  Division: {}", field(ctx.division.as_deref()))?;
    writeln!(w, "  Batch:    {}", field(ctx.batch.as_deref()))?;
    Ok(())
}

pub fn write_lab_created(w: &mut impl Write, created: &LabSessionCreated) -> io::Result<()> {
    writeln!(w, "  Session:  {}", created.session_id)?;
    if let Some(expires) = &created.expires_at {
        let expires = expires.as_str().map_or_else(|| expires.to_string(), str::to_string);
        writeln!(w, "  Expires:  {expires}")?;
    }
    Ok(())
}

pub fn write_roster(w: &mut impl Write, roster: &LabSessionRoster) -> io::Result<()> {
    writeln!(w, "Present: {}", roster.present_students.len())?;
    for student in &roster.present_students {
        writeln!(w, "  {student}")?;
    }
    Ok(())
}
