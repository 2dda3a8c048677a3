//! Reliable transaction submission pipeline
//!
//! Components in dependency order: [`ledger::LedgerClient`] (the remote
//! ledger boundary), [`estimator::FeeEstimator`] (lamports budgeting),
//! [`provisioner::AccountProvisioner`] (idempotent seed-derived account
//! creation) and [`orchestrator::SubmissionOrchestrator`] (funding, retry
//! and confirmation driving), plus the greeting program bindings the
//! service binary runs end to end.

pub mod config;
pub mod estimator;
pub mod greeting;
pub mod ledger;
pub mod orchestrator;
pub mod provisioner;
pub mod retry;
