//! loan-desk: command-line front end for the loan desk.
//!
//! Usage:
//!   loan-desk --db desk.db import --file history.json
//!   loan-desk --db desk.db register --phone 9876543210 --first Asha --last Rao --age 31 --salary 50000
//!   loan-desk --db desk.db eligibility --customer 1 --amount 200000 --rate 10 --tenure 2
//!   loan-desk --db desk.db issue --customer 1 --amount 200000 --rate 10 --tenure 2
//!   loan-desk --db desk.db loans --customer 1
//!   loan-desk --ipc-mode
//!
//! Every command prints one JSON document. In --ipc-mode the desk reads
//! one JSON command per line from stdin and answers each on stdout.

use anyhow::{anyhow, Result};
use loan_desk_core::{
    config::DeskConfig,
    customer::CustomerFields,
    engine::LoanEngine,
    loan::Loan,
    store::SqliteStore,
    types::{CustomerId, LoanId},
    underwriting::LoanRequest,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeskCommand {
    Register {
        phone_number: String,
        #[serde(flatten)]
        fields: CustomerFields,
    },
    Upsert {
        phone_number: String,
        #[serde(flatten)]
        fields: CustomerFields,
    },
    Import {
        loans: Vec<Loan>,
    },
    Score {
        customer_id: CustomerId,
    },
    Eligibility(LoanRequest),
    Issue(LoanRequest),
    Loan {
        loan_id: LoanId,
    },
    Loans {
        customer_id: CustomerId,
    },
    Quit,
}

/// Flags that take a value; everything else before the command word is a switch.
const VALUE_FLAGS: &[&str] = &[
    "--db", "--config", "--phone", "--first", "--last", "--age", "--salary", "--limit",
    "--customer", "--amount", "--rate", "--tenure", "--loan", "--file",
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let config_path = flag_value(&args, "--config").unwrap_or("./data/loan_desk.json");

    let config = if Path::new(config_path).exists() {
        DeskConfig::load(config_path)?
    } else {
        log::warn!("config: {config_path} not found, using defaults");
        DeskConfig::default()
    };

    let store = if db == ":memory:" {
        SqliteStore::in_memory()?
    } else {
        SqliteStore::open(db)?
    };
    store.migrate()?;
    log::info!("desk: opened {db}");

    let engine = LoanEngine::new(store, config)?;

    if ipc_mode {
        return run_ipc_loop(&engine);
    }

    let command = parse_command(&args)?;
    let output = dispatch(&engine, command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_ipc_loop(engine: &LoanEngine<SqliteStore>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<DeskCommand>(&line) {
            Ok(DeskCommand::Quit) => break,
            Ok(cmd) => dispatch(engine, cmd).unwrap_or_else(|e| error_json(&e)),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn dispatch(engine: &LoanEngine<SqliteStore>, cmd: DeskCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        DeskCommand::Register {
            phone_number,
            fields,
        } => serde_json::to_value(engine.register_customer(&phone_number, fields)?)?,
        DeskCommand::Upsert {
            phone_number,
            fields,
        } => serde_json::to_value(engine.upsert_customer(&phone_number, fields)?)?,
        DeskCommand::Import { loans } => serde_json::to_value(engine.import_loans(&loans)?)?,
        DeskCommand::Score { customer_id } => serde_json::json!({
            "customer_id": customer_id,
            "credit_score": engine.score(customer_id)?,
        }),
        DeskCommand::Eligibility(request) => serde_json::to_value(engine.evaluate(&request)?)?,
        DeskCommand::Issue(request) => serde_json::to_value(engine.issue(&request)?)?,
        DeskCommand::Loan { loan_id } => serde_json::to_value(engine.loan_details(loan_id)?)?,
        DeskCommand::Loans { customer_id } => {
            serde_json::to_value(engine.customer_loans(customer_id)?)?
        }
        DeskCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn error_json(err: &anyhow::Error) -> serde_json::Value {
    serde_json::json!({ "error": err.to_string() })
}

fn parse_command(args: &[String]) -> Result<DeskCommand> {
    let word = command_word(args).ok_or_else(|| {
        anyhow!(
            "missing command: register | upsert | import | score | eligibility | issue | loan | loans"
        )
    })?;

    let cmd = match word {
        "register" => DeskCommand::Register {
            phone_number: required::<String>(args, "--phone")?,
            fields: customer_fields(args)?,
        },
        "upsert" => DeskCommand::Upsert {
            phone_number: required::<String>(args, "--phone")?,
            fields: customer_fields(args)?,
        },
        "import" => DeskCommand::Import {
            loans: read_loans(&required::<String>(args, "--file")?)?,
        },
        "score" => DeskCommand::Score {
            customer_id: required(args, "--customer")?,
        },
        "eligibility" => DeskCommand::Eligibility(loan_request(args)?),
        "issue" => DeskCommand::Issue(loan_request(args)?),
        "loan" => DeskCommand::Loan {
            loan_id: required(args, "--loan")?,
        },
        "loans" => DeskCommand::Loans {
            customer_id: required(args, "--customer")?,
        },
        other => return Err(anyhow!("unknown command: {other}")),
    };
    Ok(cmd)
}

fn customer_fields(args: &[String]) -> Result<CustomerFields> {
    Ok(CustomerFields {
        first_name: required(args, "--first")?,
        last_name: required(args, "--last")?,
        age: required(args, "--age")?,
        monthly_salary: required(args, "--salary")?,
        approved_limit: optional(args, "--limit")?,
    })
}

/// A JSON array of loan records.
fn read_loans(path: &str) -> Result<Vec<Loan>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow!("Cannot parse {path}: {e}"))
}

fn loan_request(args: &[String]) -> Result<LoanRequest> {
    Ok(LoanRequest::new(
        required(args, "--customer")?,
        required(args, "--amount")?,
        required(args, "--rate")?,
        required(args, "--tenure")?,
    ))
}

/// First argument that is neither a flag nor a flag's value.
fn command_word(args: &[String]) -> Option<&str> {
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            rest.next();
        } else if !arg.starts_with("--") {
            return Some(arg.as_str());
        }
    }
    None
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn optional<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    flag_value(args, flag)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow!("invalid value for {flag}: {raw} ({e})"))
        })
        .transpose()
}

fn required<T>(args: &[String], flag: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional(args, flag)?.ok_or_else(|| anyhow!("missing required flag {flag}"))
}
