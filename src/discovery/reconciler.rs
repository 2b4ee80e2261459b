//! Discovery reconciliation
//!
//! Runs a scan outside the coordinator lock and applies the snapshot to the
//! device registry. Passes are serialized so an older snapshot can never
//! overwrite a newer one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{Discovery, DiscoveryError};
use crate::coordinator::SessionCoordinator;
use crate::device::DeviceInfo;
use crate::engine::MediaEngine;

/// Refreshes the device registry from a [`Discovery`] collaborator
pub struct Reconciler<E: MediaEngine, D: Discovery> {
    coordinator: Arc<SessionCoordinator<E>>,
    discovery: D,
    pass: Mutex<()>,
}

impl<E: MediaEngine, D: Discovery> Reconciler<E, D> {
    /// Create a reconciler
    pub fn new(coordinator: Arc<SessionCoordinator<E>>, discovery: D) -> Self {
        Self {
            coordinator,
            discovery,
            pass: Mutex::new(()),
        }
    }

    /// Get the discovery collaborator
    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// Scan once and reconcile
    ///
    /// Returns the devices seen by the scan. On scan failure the registry is
    /// left untouched.
    pub async fn reconcile_once(&self) -> Result<Vec<DeviceInfo>, DiscoveryError> {
        let _pass = self.pass.lock().await;

        let devices = self.discovery.scan().await?;
        self.coordinator.reconcile(&devices).await;

        tracing::debug!(devices = devices.len(), "Reconciled device registry");
        Ok(devices)
    }

    /// Spawn periodic reconciliation
    pub fn spawn_reconcile_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; startup already ran a pass
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = reconciler.reconcile_once().await {
                    tracing::warn!(error = %e, "Periodic discovery failed");
                }
            }
        })
    }
}
