//! # Operator Commands
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (parsing, dispatch)
//! ├── sale.rs     ◄─── add, remove, show, cancel
//! └── payment.rs  ◄─── pay, split
//! ```
//!
//! ## Command Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  "split cash:50 card:49.99"                                             │
//! │         │                                                               │
//! │         │ Command::parse                                                │
//! │         ▼                                                               │
//! │  Command::Split([cash £50.00, card £49.99])                             │
//! │         │                                                               │
//! │         │ execute(&PosSession, command)                                 │
//! │         ▼                                                               │
//! │  payment::split ──► PosSession::split ──► SplitPaymentCoordinator      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Result<Outcome, ApiError> ──► printed to the operator                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod payment;
pub mod sale;

use epos_core::{Money, PaymentMethod, SplitPaymentItem};

use crate::error::ApiError;
use crate::state::PosSession;

pub const HELP: &str = "\
Commands:
  add <product-id> <price> [vat-rate-id] [name...]   add a line (rates: standard, reduced, zero, exempt)
  remove <item-id>                                   remove a line (an id prefix is enough)
  show                                               show the current sale
  pay <method> [amount]                              pay with one method (amount defaults to the total)
  split <method>:<amount>[:<voucher-ref>] ...        pay with two or more methods
  cancel                                             abandon the current sale
  help                                               show this help
  quit                                               leave the terminal

Methods: card, cash, contactless, bank_transfer, voucher";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        product_id: String,
        price: Money,
        vat_rate_id: Option<String>,
        name: Option<String>,
    },
    Remove(String),
    Show,
    Pay {
        method: PaymentMethod,
        amount: Option<Money>,
    },
    Split(Vec<SplitPaymentItem>),
    Cancel,
    Help,
    Quit,
}

/// What the terminal should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, ApiError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match verb.to_lowercase().as_str() {
            "add" => {
                let [product_id, price, rest @ ..] = args.as_slice() else {
                    return Err(usage("add <product-id> <price> [vat-rate-id] [name...]"));
                };
                let (vat_rate_id, name) = match rest {
                    [] => (None, None),
                    [rate] => (Some(rate.to_string()), None),
                    [rate, name @ ..] => (Some(rate.to_string()), Some(name.join(" "))),
                };
                Command::Add {
                    product_id: product_id.to_string(),
                    price: parse_amount(price)?,
                    vat_rate_id,
                    name,
                }
            }
            "remove" | "rm" => match args.as_slice() {
                [item_id] => Command::Remove(item_id.to_string()),
                _ => return Err(usage("remove <item-id>")),
            },
            "show" | "ls" => Command::Show,
            "pay" => match args.as_slice() {
                [method] => Command::Pay {
                    method: parse_method(method)?,
                    amount: None,
                },
                [method, amount] => Command::Pay {
                    method: parse_method(method)?,
                    amount: Some(parse_amount(amount)?),
                },
                _ => return Err(usage("pay <method> [amount]")),
            },
            "split" => {
                if args.len() < 2 {
                    return Err(ApiError::validation(
                        "A split needs at least two payments, e.g. split cash:20 card:15.50",
                    ));
                }
                let legs = args
                    .iter()
                    .map(|token| payment::parse_split_leg(token))
                    .collect::<Result<Vec<_>, _>>()?;
                Command::Split(legs)
            }
            "cancel" => Command::Cancel,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(ApiError::validation(format!(
                    "Unknown command '{}'. Type 'help' for a list.",
                    other
                )))
            }
        };

        Ok(Some(command))
    }
}

/// Runs a parsed command against the session.
pub async fn execute(session: &PosSession, command: Command) -> Result<Outcome, ApiError> {
    let reply = match command {
        Command::Add {
            product_id,
            price,
            vat_rate_id,
            name,
        } => sale::add_item(
            session,
            &product_id,
            price,
            vat_rate_id.as_deref(),
            name.as_deref(),
        )?,
        Command::Remove(item_id) => sale::remove_item(session, &item_id)?,
        Command::Show => sale::show_sale(session),
        Command::Pay { method, amount } => payment::pay(session, method, amount).await?,
        Command::Split(legs) => payment::split(session, &legs).await?,
        Command::Cancel => sale::cancel_sale(session)?,
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Reply(reply))
}

/// Parses and runs one input line. Blank lines produce an empty reply.
pub async fn handle(session: &PosSession, line: &str) -> Result<Outcome, ApiError> {
    match Command::parse(line)? {
        Some(command) => execute(session, command).await,
        None => Ok(Outcome::Reply(String::new())),
    }
}

fn usage(form: &str) -> ApiError {
    ApiError::validation(format!("Usage: {}", form))
}

pub(crate) fn parse_amount(input: &str) -> Result<Money, ApiError> {
    Money::parse_pounds(input).map_err(|e| ApiError::validation(e.to_string()))
}

pub(crate) fn parse_method(input: &str) -> Result<PaymentMethod, ApiError> {
    input
        .parse::<PaymentMethod>()
        .map_err(|e| ApiError::validation(e.to_string()))
}
