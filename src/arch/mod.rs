//! # Architecture Abstraction Layer
//!
//! The Cortex-M4 port: tick timer, exception priorities, first-task launch
//! and the PendSV context switch.

pub mod cortex_m4;
