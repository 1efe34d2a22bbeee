//! Prometheus exporter for NetApp ONTAP storage arrays.
//!
//! Every poll runs one scrape pass: a cluster identity check, then every collection
//! task concurrently against the array's REST API. Samples pass through the device's
//! include/exclude filter before they are encoded.

pub mod api;
pub mod app;
pub mod collector;
pub mod config;
pub mod encoders;
pub mod exporter;
pub mod filter;
pub mod sample;
pub mod status;
