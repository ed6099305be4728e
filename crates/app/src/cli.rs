use clap::{Args, Parser, Subcommand, ValueEnum};
use ledger::{EngineError, MemberId, Money, Percent, SettlementStatus, Split};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "splitta")]
#[command(about = "Shared expenses, balances and settlements for groups")]
pub struct Cli {
    /// Database connection string; overrides the `database` setting.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    User(User),
    Group(Group),
    Expense(Expense),
    /// Net position of every member of a group.
    Balances { group_id: Uuid },
    /// Outstanding transfers and pending payments of a group.
    Plan { group_id: Uuid },
    /// Record a payment between two members.
    Settle(SettleArgs),
    /// Confirm or reopen a recorded payment.
    PaymentStatus {
        settlement_id: Uuid,
        #[arg(value_enum)]
        status: Status,
    },
}

#[derive(Args, Debug)]
pub struct User {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    Show {
        username: String,
    },
}

#[derive(Args, Debug)]
pub struct Group {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        created_by: String,
    },
    Show {
        group_id: Uuid,
    },
    AddMember {
        group_id: Uuid,
        member: String,
    },
    RemoveMember {
        group_id: Uuid,
        member: String,
    },
}

#[derive(Args, Debug)]
pub struct Expense {
    #[command(subcommand)]
    pub command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
pub enum ExpenseCommand {
    Add {
        group_id: Uuid,
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        paid_by: String,
        #[command(flatten)]
        split: SplitArgs,
    },
    Edit {
        expense_id: Uuid,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        paid_by: Option<String>,
        #[command(flatten)]
        split: SplitArgs,
    },
    Delete {
        expense_id: Uuid,
    },
    List {
        group_id: Uuid,
    },
}

/// At most one split flag; `expense add` requires one.
#[derive(Args, Debug, Default)]
#[group(id = "split", multiple = false)]
pub struct SplitArgs {
    /// Equal split: `--equal alice,bob,carol`.
    #[arg(long)]
    pub equal: Option<String>,
    /// Percentages: `--percent alice=50,bob=50`.
    #[arg(long)]
    pub percent: Option<String>,
    /// Shares: `--shares alice=2,bob=1`.
    #[arg(long)]
    pub shares: Option<String>,
    /// Exact amounts: `--exact alice=10.00,bob=5.50`.
    #[arg(long)]
    pub exact: Option<String>,
}

#[derive(Args, Debug)]
pub struct SettleArgs {
    pub group_id: Uuid,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub amount: String,
    /// Record the payment as pending instead of completed.
    #[arg(long)]
    pub pending: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Status {
    Pending,
    Completed,
}

impl From<Status> for SettlementStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Pending => SettlementStatus::Pending,
            Status::Completed => SettlementStatus::Completed,
        }
    }
}

impl SplitArgs {
    pub fn into_split(self) -> Result<Option<Split>, EngineError> {
        if let Some(raw) = self.equal {
            let members = raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(MemberId::from)
                .collect();
            return Ok(Some(Split::Equal(members)));
        }
        if let Some(raw) = self.percent {
            return pairs(&raw, |v| v.parse::<Percent>())
                .map(Split::Percentage)
                .map(Some);
        }
        if let Some(raw) = self.shares {
            return pairs(&raw, |v| {
                v.parse::<u32>()
                    .map_err(|_| EngineError::InvalidSplit(format!("invalid shares: {v}")))
            })
            .map(Split::Shares)
            .map(Some);
        }
        if let Some(raw) = self.exact {
            return pairs(&raw, |v| v.parse::<Money>())
                .map(Split::Exact)
                .map(Some);
        }
        Ok(None)
    }
}

/// Parses `a=1,b=2` into member/value pairs, keeping their order.
fn pairs<T>(
    raw: &str,
    parse: impl Fn(&str) -> Result<T, EngineError>,
) -> Result<Vec<(MemberId, T)>, EngineError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (member, value) = item
                .split_once('=')
                .ok_or_else(|| EngineError::InvalidSplit(format!("expected member=value, got {item}")))?;
            let member = member.trim();
            if member.is_empty() {
                return Err(EngineError::InvalidSplit(format!(
                    "missing member in {item}"
                )));
            }
            Ok((MemberId::from(member), parse(value.trim())?))
        })
        .collect()
}
