//! Application core: domain orchestration, zero I/O.
//!
//! [`service::NodeService`] ties the tracker, sampler, transmission engine
//! and scheduler together. All interaction with hardware and the network
//! happens through the **port traits** in [`ports`], so the whole core runs
//! on the host against mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
