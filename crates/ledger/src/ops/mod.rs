use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{ResultEngine, SettlementInstruction, SettlementRecord};

mod balances;
mod expenses;
mod groups;
mod memberships;
mod settlements;
mod users;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Outstanding state of a group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    /// Transfers still required, net of completed settlements, in scan order.
    pub instructions: Vec<SettlementInstruction>,
    /// Recorded payments waiting for confirmation. They do not reduce
    /// `instructions` until marked completed.
    pub pending: Vec<SettlementRecord>,
}

/// Persistent ledger: groups, members, expenses and settlements stored with
/// `sea-orm`, with the balance, planning and reconciliation logic applied on
/// top.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
