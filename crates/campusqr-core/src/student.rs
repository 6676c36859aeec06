//! Student-context cache.
//!
//! Year, division and batch are fetched from the backend once per
//! scanner activation and kept in the local key-value store, so a scan
//! can be authorized without a network round-trip.

use tracing::{debug, info};

use crate::api::{MarkRequest, ProfileSource, StudentLogin};
use crate::error::{Error, Result};
use crate::scanner::ScanFailure;
use crate::storage::KeyValueStore;
use crate::token::{Token, TokenKind};

pub const KEY_STUDENT_ID: &str = "studentId";
pub const KEY_YEAR: &str = "studentYear";
pub const KEY_DIVISION: &str = "studentDivision";
pub const KEY_BATCH: &str = "studentSubBranch";

/// Snapshot of the cached student fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentContext {
    pub student_id: Option<String>,
    pub year: Option<String>,
    pub division: Option<String>,
    pub batch: Option<String>,
}

impl StudentContext {
    /// Authorize `token` against this context and build the mark request.
    ///
    /// Fails closed: a missing cached field needed by the token type is
    /// an authorization failure. Lab tokens must match year, division and
    /// batch exactly after string normalization.
    pub fn authorize(&self, token: &Token) -> std::result::Result<MarkRequest, ScanFailure> {
        let (Some(student_id), Some(year), Some(division)) =
            (&self.student_id, &self.year, &self.division)
        else {
            return Err(ScanFailure::AuthorizationMismatch {
                message: "Student profile not loaded; reopen the scanner".into(),
            });
        };

        let student_batch = match token.kind {
            TokenKind::Attendance => None,
            TokenKind::LabAttendance => {
                let batch_label = token
                    .batch
                    .as_ref()
                    .map_or_else(|| "?".to_string(), ToString::to_string);
                let denied = || ScanFailure::AuthorizationMismatch {
                    message: format!("This lab is only for Batch {batch_label}"),
                };

                let Some(batch) = &self.batch else {
                    return Err(denied());
                };
                let same = |cached: &str, field: Option<&crate::token::FieldValue>| {
                    field.is_some_and(|f| f.normalized() == cached)
                };
                if !(same(year, token.year.as_ref())
                    && same(division, token.division.as_ref())
                    && same(batch, token.batch.as_ref()))
                {
                    return Err(denied());
                }
                Some(batch.clone())
            }
        };

        Ok(MarkRequest {
            kind: token.kind,
            session_id: token.session_id.clone(),
            student_id: student_id.clone(),
            student_year: year.clone(),
            student_division: division.clone(),
            student_batch,
        })
    }
}

/// Cache of the signed-in student's class context.
#[derive(Debug)]
pub struct StudentContextCache<S> {
    store: S,
}

impl<S: KeyValueStore> StudentContextCache<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Read the cached fields. Never touches the network.
    pub fn read(&self) -> StudentContext {
        StudentContext {
            student_id: self.store.get(KEY_STUDENT_ID),
            year: self.store.get(KEY_YEAR),
            division: self.store.get(KEY_DIVISION),
            batch: self.store.get(KEY_BATCH),
        }
    }

    /// Fetch the authoritative profile and overwrite the cached fields.
    pub async fn refresh<P: ProfileSource>(&mut self, source: &P) -> Result<StudentContext> {
        let student_id = self
            .store
            .get(KEY_STUDENT_ID)
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingStudentId)?;

        let profile = source.fetch_profile(&student_id).await?;
        let year = profile.year.normalized();
        let division = profile.division.normalized();

        let mut entries = vec![(KEY_YEAR, year.as_str()), (KEY_DIVISION, division.as_str())];
        let batch = profile.sub_branch.map(|b| b.normalized());
        match &batch {
            Some(batch) => entries.push((KEY_BATCH, batch.as_str())),
            None => {
                self.store.remove(KEY_BATCH)?;
            }
        }
        self.store.set_many(&entries)?;

        info!(
            student_id = %student_id,
            year = %year,
            division = %division,
            batch = batch.as_deref().unwrap_or("-"),
            "Student context refreshed"
        );
        Ok(self.read())
    }

    /// Store the identity returned by a successful login. Class fields the
    /// login does not carry, and always the batch, are cleared until the
    /// next refresh.
    pub fn sign_in(&mut self, login: &StudentLogin) -> Result<()> {
        let id = login
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingStudentId)?;
        let year = login.year.as_ref().map(ToString::to_string);
        let division = login.division.as_ref().map(ToString::to_string);

        for key in [KEY_YEAR, KEY_DIVISION, KEY_BATCH] {
            self.store.remove(key)?;
        }
        let mut entries = vec![(KEY_STUDENT_ID, id)];
        if let Some(year) = &year {
            entries.push((KEY_YEAR, year.as_str()));
        }
        if let Some(division) = &division {
            entries.push((KEY_DIVISION, division.as_str()));
        }
        self.store.set_many(&entries)?;
        debug!(student_id = %id, "Student signed in");
        Ok(())
    }

    /// Forget everything about the signed-in student.
    pub fn sign_out(&mut self) -> Result<()> {
        for key in [KEY_STUDENT_ID, KEY_YEAR, KEY_DIVISION, KEY_BATCH] {
            self.store.remove(key)?;
        }
        Ok(())
    }
}
