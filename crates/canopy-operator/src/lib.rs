//! Canopy operator: wires the registration engine into kube-rs controllers

#![deny(missing_docs)]

/// Controller construction and watch mappers
pub mod controller_runner;
/// CRD installation and manifest rendering
pub mod crds;
