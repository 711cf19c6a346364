//! Mount table and request handlers
//!
//! `ChangesService` is the transport-agnostic entry point: a thin façade
//! that resolves a mount name to its journal and barrier, decodes cursors,
//! runs the query, and re-encodes the result in whichever schema generation
//! the caller asked for.

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use chronicle_core::{ChangeNotification, JournalError, Position};
use chronicle_journal::{changes_since, Journal};
use chronicle_watcher::{SyncBarrier, SyncOutcome};

use crate::legacy::{LegacyChange, LegacyChangesSinceResponse};
use crate::wire::{ChangesSinceRequest, ChangesSinceResponse, WireChange};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no mount registered at {0:?}")]
    UnknownMount(String),
    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Everything the service needs per mount
#[derive(Clone)]
pub struct MountHandle {
    pub journal: Arc<Journal>,
    pub barrier: Arc<SyncBarrier>,
}

#[derive(Default)]
pub struct ChangesService {
    mounts: DashMap<String, MountHandle>,
}

impl ChangesService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_mount(
        &self,
        mount_point: impl Into<String>,
        journal: Arc<Journal>,
        barrier: Arc<SyncBarrier>,
    ) {
        let mount_point = mount_point.into();
        info!(mount = %mount_point, "mount registered");
        self.mounts
            .insert(mount_point, MountHandle { journal, barrier });
    }

    pub fn unregister_mount(&self, mount_point: &str) -> bool {
        let removed = self.mounts.remove(mount_point).is_some();
        if removed {
            info!(mount = %mount_point, "mount unregistered");
        }
        removed
    }

    fn handle(&self, mount_point: &str) -> Result<MountHandle, ServiceError> {
        self.mounts
            .get(mount_point)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::UnknownMount(mount_point.to_string()))
    }

    /// The mount's current position as an opaque cursor, for starting a
    /// subscription without reading history
    pub fn current_position(&self, mount_point: &str) -> Result<String, ServiceError> {
        Ok(self.handle(mount_point)?.journal.current_position().encode())
    }

    /// Wait until changes already accepted by the OS are query-visible.
    ///
    /// A timeout is reported in the outcome, not as an error.
    pub async fn synchronize_working_copy(
        &self,
        mount_point: &str,
    ) -> Result<SyncOutcome, ServiceError> {
        let handle = self.handle(mount_point)?;
        let outcome = handle.barrier.synchronize().await;
        debug!(mount = %mount_point, ?outcome, "synchronize");
        Ok(outcome)
    }

    fn query(
        &self,
        request: &ChangesSinceRequest,
    ) -> Result<(Vec<ChangeNotification>, Position), ServiceError> {
        let handle = self.handle(&request.mount_point)?;
        let from = Position::decode(&request.from_position)?;
        let result = changes_since(&handle.journal, from, &request.params())?;
        debug!(
            mount = %request.mount_point,
            from = %from,
            returned = result.changes.len(),
            "changes since"
        );
        Ok((result.changes, result.to_position))
    }

    pub fn changes_since(
        &self,
        request: &ChangesSinceRequest,
    ) -> Result<ChangesSinceResponse, ServiceError> {
        let (changes, to_position) = self.query(request)?;
        Ok(ChangesSinceResponse {
            to_position: to_position.encode(),
            changes: changes.iter().map(WireChange::from).collect(),
        })
    }

    /// Same query, answered in the flat schema for older clients
    pub fn changes_since_legacy(
        &self,
        request: &ChangesSinceRequest,
    ) -> Result<LegacyChangesSinceResponse, ServiceError> {
        let (changes, to_position) = self.query(request)?;
        Ok(LegacyChangesSinceResponse {
            to_position: to_position.encode(),
            changes: changes.iter().map(LegacyChange::from).collect(),
        })
    }
}
