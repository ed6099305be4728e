//! Group expense ledger.
//!
//! The pure core lives in three modules that share the data model:
//!
//! - [`balances`]: net position of every member from the raw expenses;
//! - [`planner`]: outstanding transfers, net of completed settlements;
//! - [`reconcile`]: expense rewrite after a member leaves a group.
//!
//! [`Engine`] persists groups, expenses and settlements with `sea-orm` and
//! wires the core functions to the stored data.

pub use balances::{Balance, Balances, ContributionKind, DroppedContribution, compute_balances};
pub use error::EngineError;
pub use expenses::{Expense, ExpenseEdit, NewExpense, Participant, SplitStrategy};
pub use groups::Group;
pub use money::Money;
pub use ops::{Engine, EngineBuilder, SettlementPlan};
pub use planner::{
    SettlementInstruction, outstanding_between, plan_settlements, validate_payment,
};
pub use reconcile::{ReconciledExpense, Reconciliation, reconcile_after_removal};
pub use settlements::{SettlementRecord, SettlementStatus};
pub use split::{Percent, Split};
pub use users::{Member, MemberId};

pub mod balances;
pub mod planner;
pub mod reconcile;

mod error;
mod expenses;
mod group_members;
mod groups;
mod money;
mod ops;
mod participants;
mod settlements;
mod split;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
