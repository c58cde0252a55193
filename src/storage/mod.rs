//! Artifact storage module.
//!
//! This module reads and writes the PEM files the command-line tools produce.

pub mod files;
