use std::error::Error;

use clap::Parser;
use ledger::{Engine, ExpenseEdit, MemberId, Money, NewExpense, SettlementStatus};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;

use cli::{Cli, Command, ExpenseCommand, GroupCommand, UserCommand};

mod cli;
mod settings;

type ResultApp<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ResultApp<()> {
    let settings = settings::Settings::new()?;
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitta={level},ledger={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = connect_db(&url).await?;
    let engine = Engine::builder().database(db).build().await?;

    run(&engine, cli).await
}

async fn connect_db(url: &str) -> ResultApp<sea_orm::DatabaseConnection> {
    tracing::debug!(%url, "connecting to database");
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

/// Prints `value` as JSON when requested, otherwise runs `human`.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> ResultApp<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

async fn run(engine: &Engine, cli: Cli) -> ResultApp<()> {
    let json = cli.json;

    match cli.command {
        Command::User(user) => match user.command {
            UserCommand::Create {
                username,
                display_name,
                avatar_url,
            } => {
                let member = engine
                    .create_user(&username, &display_name, avatar_url.as_deref())
                    .await?;
                emit(json, &member, |m| println!("created user: {}", m.id))?;
            }
            UserCommand::Show { username } => {
                let member = engine.user(&MemberId::from(username)).await?;
                emit(json, &member, |m| {
                    println!("{} ({})", m.display_name, m.id);
                    if let Some(url) = &m.avatar_url {
                        println!("avatar: {url}");
                    }
                })?;
            }
        },
        Command::Group(group) => match group.command {
            GroupCommand::Create { name, created_by } => {
                let group_id = engine
                    .new_group(&name, &MemberId::from(created_by))
                    .await?;
                emit(json, &group_id, |id| println!("created group: {name} ({id})"))?;
            }
            GroupCommand::Show { group_id } => {
                let group = engine.group(group_id).await?;
                emit(json, &group, |g| {
                    println!("{} ({})", g.name, g.id);
                    println!("total expenses: {}", g.total_expenses);
                    for member in &g.members {
                        println!("  {member}");
                    }
                })?;
            }
            GroupCommand::AddMember { group_id, member } => {
                let member = MemberId::from(member);
                engine.add_group_member(group_id, &member).await?;
                emit(json, &member, |m| println!("added {m}"))?;
            }
            GroupCommand::RemoveMember { group_id, member } => {
                let member = MemberId::from(member);
                let reconciliation = engine.remove_group_member(group_id, &member).await?;
                emit(json, &reconciliation, |r| {
                    println!("removed {member}, {} expenses rewritten", r.changed.len());
                    for expense_id in &r.skipped {
                        println!("  no participants left: {expense_id}");
                    }
                    for expense_id in &r.orphaned_payers {
                        println!("  paid by {member}: {expense_id}");
                    }
                })?;
            }
        },
        Command::Expense(expense) => match expense.command {
            ExpenseCommand::Add {
                group_id,
                description,
                amount,
                paid_by,
                split,
            } => {
                let split = split.into_split()?.ok_or_else(|| {
                    ledger::EngineError::InvalidSplit(
                        "one of --equal, --percent, --shares, --exact is required".to_string(),
                    )
                })?;
                let new = NewExpense {
                    description,
                    amount: amount.parse::<Money>()?,
                    paid_by: MemberId::from(paid_by),
                    split,
                };
                let expense_id = engine.add_expense(group_id, new).await?;
                emit(json, &expense_id, |id| println!("created expense: {id}"))?;
            }
            ExpenseCommand::Edit {
                expense_id,
                description,
                amount,
                paid_by,
                split,
            } => {
                let edit = ExpenseEdit {
                    description,
                    amount: amount.map(|a| a.parse::<Money>()).transpose()?,
                    paid_by: paid_by.map(MemberId::from),
                    split: split.into_split()?,
                };
                let expense = engine.update_expense(expense_id, edit).await?;
                emit(json, &expense, print_expense)?;
            }
            ExpenseCommand::Delete { expense_id } => {
                engine.deactivate_expense(expense_id).await?;
                emit(json, &expense_id, |id| println!("deleted expense: {id}"))?;
            }
            ExpenseCommand::List { group_id } => {
                let expenses = engine.active_expenses(group_id).await?;
                emit(json, &expenses, |list| list.iter().for_each(print_expense))?;
            }
        },
        Command::Balances { group_id } => {
            let balances = engine.group_balances(group_id).await?;
            emit(json, &balances, |b| {
                for (member, balance) in b.iter() {
                    println!(
                        "{member}: paid {} owed {} net {}",
                        balance.paid, balance.owed, balance.net
                    );
                }
            })?;
        }
        Command::Plan { group_id } => {
            let plan = engine.settlement_plan(group_id).await?;
            emit(json, &plan, |p| {
                if p.instructions.is_empty() {
                    println!("all settled");
                }
                for i in &p.instructions {
                    println!("{} -> {}: {}", i.from_user_id, i.to_user_id, i.amount);
                }
                for record in &p.pending {
                    println!(
                        "pending {}: {} -> {}: {}",
                        record.id, record.from_user_id, record.to_user_id, record.amount
                    );
                }
            })?;
        }
        Command::Settle(args) => {
            let from = MemberId::from(args.from);
            let to = MemberId::from(args.to);
            let amount = args.amount.parse::<Money>()?;
            let record = if args.pending {
                engine
                    .record_settlement(args.group_id, &from, &to, amount, SettlementStatus::Pending)
                    .await?
            } else {
                engine.settle_up(args.group_id, &from, &to, amount).await?
            };
            emit(json, &record, |r| {
                println!(
                    "{} {} -> {}: {} ({})",
                    r.status.as_str(),
                    r.from_user_id,
                    r.to_user_id,
                    r.amount,
                    r.id
                )
            })?;
        }
        Command::PaymentStatus {
            settlement_id,
            status,
        } => {
            let record = engine
                .update_payment_status(settlement_id, status.into())
                .await?;
            emit(json, &record, |r| {
                println!("settlement {} is {}", r.id, r.status.as_str())
            })?;
        }
    }

    Ok(())
}

fn print_expense(expense: &ledger::Expense) {
    println!(
        "{} {} paid by {}: {} [{}]",
        expense.id,
        expense.description,
        expense.paid_by,
        expense.amount,
        expense.split.as_str()
    );
    for participant in &expense.participants {
        println!("  {} {}", participant.member_id, participant.amount);
    }
    if let Some(note) = &expense.reconciliation_note {
        println!("  ({note})");
    }
}
