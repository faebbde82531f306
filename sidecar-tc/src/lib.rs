//! Traffic-control engine for enclave networking sidecars.
//!
//! Builds and mutates the Linux `tc` qdisc/class/filter hierarchy inside a
//! per-service sidecar container to realize network partitions (packet loss,
//! delay, jitter) towards arbitrary peer IPs. Updates follow a blue/green
//! pattern over two alternating working qdiscs: the inactive side is rebuilt
//! from scratch, and a single root-filter replace atomically cuts live
//! traffic over to it.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use sidecar_tc::{
//!     connection::{PacketDelay, PartitionConnection},
//!     executor::RuntimeExecExecutor,
//!     sidecar::Sidecar,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sidecar = Sidecar::new("my-service", "sidecar-container", "eth0",
//!     RuntimeExecExecutor::default());
//! sidecar.init_traffic_control().await?;
//!
//! let mut connections = HashMap::new();
//! connections.insert(
//!     "10.4.0.7".parse()?,
//!     PartitionConnection::new(30.0).with_packet_delay(PacketDelay::uniform(150)),
//! );
//! sidecar.update_traffic_control(&connections).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod command;
pub mod connection;
pub mod executor;
pub mod qdisc;
pub mod sidecar;

pub use connection::{PacketDelay, PartitionConnection};
pub use executor::{ExecCommandExecutor, ExecError};
pub use qdisc::WorkingQdisc;
pub use sidecar::{Sidecar, SidecarError};
