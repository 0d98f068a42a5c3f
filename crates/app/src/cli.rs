use std::{collections::HashMap, error::Error};

use clap::{Args, Parser, Subcommand};
use engine::{
    AddExpenseCmd, Engine, EngineError, Expense, ParticipantId, Split, UpdateExpenseCmd,
    amount::{format_amount, parse_amount},
};
use uuid::Uuid;

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "housemates")]
#[command(about = "Track who owes whom in a shared household")]
pub struct Cli {
    /// Database connection string (also read from `DATABASE_URL`). Overrides
    /// the `database` setting.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, inspect and delete groups.
    #[command(subcommand)]
    Group(GroupCommand),
    /// Add or remove group members.
    #[command(subcommand)]
    Member(MemberCommand),
    /// Record, edit and delete expenses.
    #[command(subcommand)]
    Expense(ExpenseCommand),
    /// Clear the balance between DEBTOR and CREDITOR after an out-of-band
    /// payment.
    Settle {
        group: Uuid,
        debtor: String,
        creditor: String,
    },
    /// List outstanding debts.
    Debts { group: Uuid },
    /// Show what every member owes and is owed.
    Totals { group: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    New { name: String },
    List,
    Show { group: Uuid },
    Delete { group: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommand {
    Add { group: Uuid, name: String },
    Remove { group: Uuid, name: String },
}

#[derive(Subcommand, Debug)]
pub enum ExpenseCommand {
    Add {
        group: Uuid,
        #[command(flatten)]
        expense: ExpenseArgs,
    },
    Update {
        group: Uuid,
        expense_id: Uuid,
        #[command(flatten)]
        expense: ExpenseArgs,
    },
    Delete {
        group: Uuid,
        expense_id: Uuid,
    },
    List {
        group: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct ExpenseArgs {
    /// Member who paid.
    #[arg(long)]
    payer: String,
    /// Amount paid, e.g. `12,50`.
    #[arg(long, value_parser = parse_total)]
    total: f64,
    /// Explicit share as `NAME=AMOUNT`; repeat for every debtor.
    #[arg(long = "split", value_parser = parse_split)]
    splits: Vec<(String, f64)>,
    /// Split evenly among these members (default: everyone).
    #[arg(long, value_delimiter = ',', conflicts_with = "splits")]
    among: Vec<String>,
    #[arg(long)]
    description: Option<String>,
}

fn parse_total(raw: &str) -> Result<f64, String> {
    parse_amount(raw).map_err(|err| err.to_string())
}

fn parse_split(raw: &str) -> Result<(String, f64), String> {
    let (name, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=AMOUNT, got {raw}"))?;
    Ok((name.trim().to_string(), parse_total(amount)?))
}

pub async fn run(engine: &Engine, command: Command) -> CliResult<()> {
    match command {
        Command::Group(cmd) => group(engine, cmd).await,
        Command::Member(cmd) => member(engine, cmd).await,
        Command::Expense(cmd) => expense(engine, cmd).await,
        Command::Settle {
            group,
            debtor,
            creditor,
        } => {
            let debtor_id = engine.member_id(group, &debtor).await?;
            let creditor_id = engine.member_id(group, &creditor).await?;
            match engine.settle(group, debtor_id, creditor_id).await? {
                Some(debt) => {
                    let names = member_names(engine, group).await?;
                    println!(
                        "{} paid {} {}",
                        name_of(&names, debt.debtor),
                        name_of(&names, debt.creditor),
                        format_amount(debt.amount)
                    );
                }
                None => println!("{debtor} and {creditor} were already even"),
            }
            Ok(())
        }
        Command::Debts { group } => {
            let names = member_names(engine, group).await?;
            let debts = engine.debts(group).await?;
            if debts.is_empty() {
                println!("all settled up");
            }
            for debt in debts {
                println!(
                    "{} owes {} {}",
                    name_of(&names, debt.debtor),
                    name_of(&names, debt.creditor),
                    format_amount(debt.amount)
                );
            }
            Ok(())
        }
        Command::Totals { group } => {
            for totals in engine.member_totals(group).await? {
                println!(
                    "{:<16} owes {:>10}  is owed {:>10}  net {:>10}",
                    totals.member.name,
                    format_amount(totals.owed_by),
                    format_amount(totals.owed_to),
                    format_amount(totals.net)
                );
            }
            Ok(())
        }
    }
}

async fn group(engine: &Engine, cmd: GroupCommand) -> CliResult<()> {
    match cmd {
        GroupCommand::New { name } => {
            let id = engine.new_group(&name).await?;
            println!("created group: {name} ({id})");
        }
        GroupCommand::List => {
            for (id, name) in engine.list_groups().await? {
                println!("{id}  {name}");
            }
        }
        GroupCommand::Show { group } => {
            let snapshot = engine.group(group).await?;
            println!("{} ({})", snapshot.name, snapshot.id);
            for member in snapshot.members {
                println!("  {}", member.name);
            }
        }
        GroupCommand::Delete { group } => {
            engine.delete_group(group).await?;
            println!("deleted group {group}");
        }
    }
    Ok(())
}

async fn member(engine: &Engine, cmd: MemberCommand) -> CliResult<()> {
    match cmd {
        MemberCommand::Add { group, name } => {
            engine.add_member(group, &name).await?;
            println!("{name} joined");
        }
        MemberCommand::Remove { group, name } => {
            let names = member_names(engine, group).await?;
            let id = engine.member_id(group, &name).await?;
            match engine.remove_member(group, id).await {
                Ok(()) => println!("{name} left"),
                Err(EngineError::UnsettledDebt {
                    counterparty,
                    amount,
                    ..
                }) => {
                    let other = name_of(&names, counterparty);
                    let (from, to) = if amount > 0.0 {
                        (name.as_str(), other.as_str())
                    } else {
                        (other.as_str(), name.as_str())
                    };
                    return Err(format!(
                        "{name} cannot leave yet: {from} owes {to} {}",
                        format_amount(amount.abs())
                    )
                    .into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

async fn expense(engine: &Engine, cmd: ExpenseCommand) -> CliResult<()> {
    match cmd {
        ExpenseCommand::Add { group, expense } => {
            let (payer, splits) = resolve_expense(engine, group, &expense).await?;
            let added = engine
                .add_expense(AddExpenseCmd {
                    group_id: group,
                    payer,
                    total: expense.total,
                    splits,
                    description: expense.description,
                })
                .await?;
            println!("added expense {}", added.id);
        }
        ExpenseCommand::Update {
            group,
            expense_id,
            expense,
        } => {
            let (payer, splits) = resolve_expense(engine, group, &expense).await?;
            engine
                .update_expense(UpdateExpenseCmd {
                    group_id: group,
                    expense_id,
                    payer,
                    total: expense.total,
                    splits,
                    description: expense.description,
                })
                .await?;
            println!("updated expense {expense_id}");
        }
        ExpenseCommand::Delete { group, expense_id } => {
            engine.delete_expense(group, expense_id).await?;
            println!("deleted expense {expense_id}");
        }
        ExpenseCommand::List { group } => {
            let names = member_names(engine, group).await?;
            for expense in engine.expenses(group).await? {
                print_expense(&names, &expense);
            }
        }
    }
    Ok(())
}

/// Turns member names into ids; without explicit splits the total is shared
/// evenly.
async fn resolve_expense(
    engine: &Engine,
    group: Uuid,
    args: &ExpenseArgs,
) -> CliResult<(ParticipantId, Vec<Split>)> {
    let payer = engine.member_id(group, &args.payer).await?;
    if !args.splits.is_empty() {
        let mut splits = Vec::with_capacity(args.splits.len());
        for (name, amount) in &args.splits {
            splits.push(Split {
                debtor: engine.member_id(group, name).await?,
                amount: *amount,
            });
        }
        return Ok((payer, splits));
    }

    let debtors = if args.among.is_empty() {
        engine
            .group(group)
            .await?
            .members
            .into_iter()
            .map(|m| m.id)
            .collect()
    } else {
        let mut ids = Vec::with_capacity(args.among.len());
        for name in &args.among {
            ids.push(engine.member_id(group, name).await?);
        }
        ids
    };
    let even = Expense::even(payer, args.total, &debtors)?;
    Ok((payer, even.splits))
}

async fn member_names(engine: &Engine, group: Uuid) -> CliResult<HashMap<ParticipantId, String>> {
    Ok(engine
        .group(group)
        .await?
        .members
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect())
}

fn name_of(names: &HashMap<ParticipantId, String>, id: ParticipantId) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn print_expense(names: &HashMap<ParticipantId, String>, expense: &Expense) {
    println!(
        "{}  {} paid {}{}",
        expense.id,
        name_of(names, expense.payer),
        format_amount(expense.total),
        expense
            .description
            .as_deref()
            .map(|d| format!(" for {d}"))
            .unwrap_or_default()
    );
    for split in &expense.splits {
        println!(
            "    {:<16} {:>10}",
            name_of(names, split.debtor),
            format_amount(split.amount)
        );
    }
}
