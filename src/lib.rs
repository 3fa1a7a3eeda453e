//! Lighting commands for an addressable LED strip over a compact UDP
//! protocol, and the device side interpreter that renders them.

pub mod color;
pub mod command;
pub mod config;
pub mod device;
pub mod events;
pub mod network;
