//! Student subcommands: login, refresh.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;

use tracing::info;

use campusqr_core::api::{ApiClient, ProfileSource};
use campusqr_core::{KeyValueStore, StudentContextCache};

use crate::output::write_context;

/// Sign in and seed the cache with the returned identity.
pub async fn login<S: KeyValueStore>(
    api: &ApiClient,
    cache: &mut StudentContextCache<S>,
    id: &str,
    password: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let login = api
        .student_login(id, password)
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {e}"))?;
    cache.sign_in(&login)?;
    info!(student_id = id, "Logged in");

    writeln!(out, "Logged in as {}", login.id.as_deref().unwrap_or(id))?;
    writeln!(out, "Run `campusqr refresh` to load your lab batch.")?;
    Ok(())
}

/// Fetch the authoritative profile into the cache and print it.
pub async fn refresh<S: KeyValueStore, P: ProfileSource>(
    source: &P,
    cache: &mut StudentContextCache<S>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let ctx = cache.refresh(source).await?;
    writeln!(out, "Student context refreshed")?;
    write_context(out, &ctx)?;
    Ok(())
}
