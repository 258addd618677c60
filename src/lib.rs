//! Moai core — onboarding checkpoint gating and progression state machines.

pub mod config;
pub mod error;
pub mod machine;
pub mod onboarding;
pub mod store;
