//! Work distribution domain
//!
//! Everything that decides who handles a bordereau and when someone
//! must be alerted that nobody does:
//! - [`corbeille`]: the per-role work queue projection
//! - [`workload`]: handler capacity, team limits and health grading
//! - [`assignment`]: the pure handler selection policies
//! - [`escalation`]: overdue detection rules and the sweep loop
//! - [`ports`]: directory and team configuration seams
//! - [`services`]: assignment routing and corbeille resolution

pub mod assignment;
pub mod corbeille;
pub mod error;
pub mod escalation;
pub mod ports;
pub mod services;
pub mod workload;

pub use assignment::{select_handler, AssignmentPolicy};
pub use corbeille::{
    completed_statuts, open_statuts, Bucket, Corbeille, CorbeilleItem, CorbeilleStats,
    COMPLETED_CAP, COMPLETED_WINDOW_DAYS,
};
pub use error::DispatchError;
pub use escalation::{
    EscalationRule, EscalationSweeper, RuleCondition, RuleVerdict, SweepReport,
    DEFAULT_SWEEP_BATCH,
};
pub use ports::{DirectoryPort, EscalationRuleStore, TeamConfigStore};
pub use services::{
    AssignRequest, AssignmentOutcome, AssignmentService, BulkAssignmentReport, BulkFailure,
    ConfigUpdate, CorbeilleService, ReassignRequest,
};
pub use workload::{
    HandlerLoad, MemberWorkload, TeamHealth, TeamWorkload, TeamWorkloadConfig, User,
    DEFAULT_ALERT_THRESHOLD, DEFAULT_HANDLER_CAPACITY, DEFAULT_MAX_LOAD,
};
