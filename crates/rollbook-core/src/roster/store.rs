//! The in-memory roster snapshot and its fetch sequencing.
//!
//! Every listing is tagged with a `FetchTicket`. A response is applied only
//! if it belongs to the current epoch and is newer than the last applied
//! response; anything else is dropped. The epoch advances when the roster is
//! invalidated (logout), which orphans every fetch still in flight.

use tracing::debug;

use crate::models::StudentRecord;

use super::error::{FetchFailure, MutationFailure, RosterError};
use super::state::RosterStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    epoch: u64,
}

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
pub struct RosterStore {
    students: Vec<StudentRecord>,
    status: RosterStatus,
    error: Option<RosterError>,
    issued_seq: u64,
    applied_seq: u64,
    epoch: u64,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn students(&self) -> &[StudentRecord] {
        &self.students
    }

    pub fn status(&self) -> RosterStatus {
        self.status
    }

    pub fn error(&self) -> Option<&RosterError> {
        self.error.as_ref()
    }

    /// True while a fetch newer than the last applied one is outstanding.
    pub fn is_loading(&self) -> bool {
        self.applied_seq < self.issued_seq
    }

    /// Start a listing: issue a ticket, clear the error slot, mark loading.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued_seq += 1;
        self.error = None;
        self.status = RosterStatus::Loading;
        FetchTicket {
            seq: self.issued_seq,
            epoch: self.epoch,
        }
    }

    /// Apply a listing outcome. Returns false if the response was stale and
    /// dropped.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, result: Result<Vec<StudentRecord>, FetchFailure>) -> bool {
        if ticket.epoch != self.epoch {
            debug!(seq = ticket.seq, epoch = ticket.epoch, current = self.epoch, "Dropping fetch from previous session");
            return false;
        }
        if ticket.seq <= self.applied_seq {
            debug!(seq = ticket.seq, applied = self.applied_seq, "Dropping out-of-order fetch");
            return false;
        }

        self.applied_seq = ticket.seq;
        let failed = match result {
            Ok(students) => {
                self.students = students;
                if matches!(self.error, Some(RosterError::Fetch(_))) {
                    self.error = None;
                }
                false
            }
            Err(failure) => {
                self.error = Some(RosterError::Fetch(failure));
                true
            }
        };

        self.status = if self.is_loading() {
            RosterStatus::Loading
        } else if failed {
            RosterStatus::Errored
        } else {
            RosterStatus::Loaded
        };
        true
    }

    /// Surface a failed add/delete; roster data is untouched.
    pub fn record_mutation_failure(&mut self, failure: MutationFailure) {
        self.error = Some(RosterError::Mutation(failure));
    }

    /// Drop all roster state and orphan in-flight fetches.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.applied_seq = self.issued_seq;
        self.students.clear();
        self.error = None;
        self.status = RosterStatus::Idle;
    }
}
