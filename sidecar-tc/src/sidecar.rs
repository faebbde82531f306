//! The per-container sidecar wrapper: owns the in-use marker for the
//! alternating working qdiscs and serializes every mutation.

use std::{collections::HashMap, net::IpAddr};

use tokio::sync::Mutex;

use crate::{
    command::{generate_init_command, generate_update_command, SidecarCommand},
    connection::PartitionConnection,
    executor::{ExecCommandExecutor, ExecError},
    qdisc::{IdError, WorkingQdisc},
};

/// The working qdisc that goes live on the very first initialization.
const INITIAL_WORKING_QDISC: WorkingQdisc = WorkingQdisc::A;

#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    /// An update was requested before [`Sidecar::init_traffic_control`] ran.
    #[error("traffic control for service '{service_id}' has not been initialized")]
    NotInitialized { service_id: String },
    #[error("failed to allocate a qdisc id: {0}")]
    Id(#[from] IdError),
    #[error("failed to execute {description} command in sidecar of service '{service_id}'")]
    Exec {
        service_id: String,
        description: &'static str,
        #[source]
        source: ExecError,
    },
}

/// Handle into the network state of one service container, manipulated
/// indirectly through its networking sidecar container.
///
/// All mutation goes through an internal mutex held across the whole exec
/// round-trip, so concurrent callers against the same sidecar are applied
/// strictly in the order they arrived ([`tokio::sync::Mutex`] is fair).
/// Distinct sidecars are fully independent. The in-use marker only advances
/// once the executor confirms success, so dropping a call mid-exec (the
/// cancellation path) leaves the wrapper's view consistent with whichever
/// side is actually live.
#[derive(Debug)]
pub struct Sidecar<E> {
    service_id: String,
    container_id: String,
    interface_name: String,
    /// Which working qdisc is live. `None` until initialized.
    qdisc_in_use: Mutex<Option<WorkingQdisc>>,
    executor: E,
}

impl<E: ExecCommandExecutor> Sidecar<E> {
    pub fn new(
        service_id: impl Into<String>,
        container_id: impl Into<String>,
        interface_name: impl Into<String>,
        executor: E,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            container_id: container_id.into(),
            interface_name: interface_name.into(),
            qdisc_in_use: Mutex::new(None),
            executor,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// The working qdisc currently receiving live traffic, if initialized.
    pub async fn qdisc_in_use(&self) -> Option<WorkingQdisc> {
        *self.qdisc_in_use.lock().await
    }

    /// Builds the root qdisc/class/filter skeleton inside the sidecar and
    /// marks qdisc A as live.
    ///
    /// Idempotent: once initialized, further calls return `Ok` without
    /// executing anything. A failed exec leaves the sidecar uninitialized,
    /// so the caller may simply retry.
    pub async fn init_traffic_control(&self) -> Result<(), SidecarError> {
        let mut in_use = self.qdisc_in_use.lock().await;
        if in_use.is_some() {
            return Ok(());
        }

        let command = generate_init_command(&self.interface_name);
        self.execute_in_sidecar(&command, "tc init").await?;

        *in_use = Some(INITIAL_WORKING_QDISC);
        Ok(())
    }

    /// Rebuilds the staging qdisc to match `connections` and atomically cuts
    /// live traffic over to it.
    ///
    /// Every command before the final root-filter replace only touches the
    /// currently-inactive side of the tree, so live traffic never observes a
    /// partially-built rule set. On failure the in-use marker is untouched:
    /// the staging side may be left half-built, but the next call destroys
    /// and rebuilds it anyway.
    pub async fn update_traffic_control(
        &self,
        connections: &HashMap<IpAddr, PartitionConnection>,
    ) -> Result<(), SidecarError> {
        let mut in_use = self.qdisc_in_use.lock().await;
        let live = in_use.ok_or_else(|| SidecarError::NotInitialized {
            service_id: self.service_id.clone(),
        })?;
        let staging = live.other();

        let command = generate_update_command(&self.interface_name, staging, connections)?;
        self.execute_in_sidecar(&command, "tc update").await?;

        *in_use = Some(staging);
        Ok(())
    }

    async fn execute_in_sidecar(
        &self,
        command: &SidecarCommand,
        description: &'static str,
    ) -> Result<(), SidecarError> {
        tracing::debug!(
            service = %self.service_id,
            container = %self.container_id,
            cmd = %command,
            "running {description} command in networking sidecar",
        );

        self.executor.exec(&self.container_id, command).await.map_err(|source| {
            SidecarError::Exec { service_id: self.service_id.clone(), description, source }
        })?;

        tracing::info!(
            service = %self.service_id,
            "successfully executed {description} command in networking sidecar",
        );

        Ok(())
    }
}
