//! Persistence for live decisions
//!
//! - Day-partitioned, minute-idempotent JSONL decision ledger
//! - Best-effort replicas of ledger partitions (directory mirror or HTTP object store)

pub mod ledger;
pub mod replica;

pub use ledger::{DecisionLedger, RecordOutcome, DEFAULT_REPLICA_PREFIX};
pub use replica::{DirectoryReplica, HttpObjectReplica, NoopReplica, ReplicaSink};
