//! # Sterling EPOS Terminal Library
//!
//! The operator terminal for one till: a line-based command loop over a
//! single [`PosSession`].
//!
//! ## Module Organization
//! ```text
//! epos_terminal/
//! ├── lib.rs          ◄─── You are here (startup & command loop)
//! ├── state/
//! │   ├── mod.rs      ◄─── State type exports
//! │   ├── config.rs   ◄─── AppConfig (store, printer, payments)
//! │   └── session.rs  ◄─── PosSession: the active sale and settlement
//! ├── commands/
//! │   ├── mod.rs      ◄─── Command parsing and dispatch
//! │   ├── sale.rs     ◄─── add / remove / show / cancel
//! │   └── payment.rs  ◄─── pay / split
//! ├── printer.rs      ◄─── Receipt sinks (log, spool directory)
//! └── error.rs        ◄─── ApiError shown to the operator
//! ```

pub mod commands;
pub mod error;
pub mod printer;
pub mod state;

use std::io::Write;
use std::sync::Arc;

use epos_payments::HttpGateway;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use commands::Outcome;
use error::ApiError;
use state::{AppConfig, PosSession};

const PROMPT: &str = "epos> ";

/// Runs the terminal until the operator quits or stdin closes.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                       Terminal Startup                                  │
/// │                                                                         │
/// │  1. Initialize Logging ───────────────────────────────────────────────► │
/// │     • tracing-subscriber with env filter, written to stderr             │
/// │     • Default: INFO (epos crates at DEBUG), override with RUST_LOG      │
/// │                                                                         │
/// │  2. Load Configuration ───────────────────────────────────────────────► │
/// │     • defaults → epos.toml → EPOS_* environment                         │
/// │     • invalid config exits with status 2                                │
/// │                                                                         │
/// │  3. Build Session ────────────────────────────────────────────────────► │
/// │     • HTTP gateway for the configured provider                          │
/// │     • receipt printer (log | spool)                                     │
/// │                                                                         │
/// │  4. Command Loop ─────────────────────────────────────────────────────► │
/// │     • one line per command, replies on stdout                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn run() {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Sterling EPOS terminal");

    let config = match AppConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            std::process::exit(1);
        }
    };

    let session = match build_session(&config) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Failed to initialize session");
            std::process::exit(2);
        }
    };

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    if let Err(e) = runtime.block_on(repl(&session, stdin, &mut stdout)) {
        error!(error = %e, "Terminal I/O failed");
        std::process::exit(1);
    }

    info!("Terminal stopped");
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=epos::reconciliation=error` - Only reversal failures
/// - Default: INFO, DEBUG for epos crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,epos=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Wires the configured gateway and printer into a fresh session.
pub fn build_session(config: &AppConfig) -> Result<PosSession, ApiError> {
    let gateway = HttpGateway::from_config(&config.payments)?;
    let printer = printer::from_settings(&config.printer);

    info!(
        provider = %gateway.kind(),
        printer = ?config.printer.kind,
        store = %config.store.name,
        "Session ready"
    );

    Ok(PosSession::new(
        Arc::new(gateway),
        printer,
        config.store.clone(),
        config.printer.paper_width,
    ))
}

/// Reads commands from `input` until `quit` or end of input, writing replies
/// and errors to `out`.
pub async fn repl<R, W>(session: &PosSession, input: R, out: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "Sterling EPOS. Type 'help' for commands.")?;
    let mut lines = input.lines();

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match commands::handle(session, &line).await {
            Ok(Outcome::Reply(reply)) if reply.is_empty() => {}
            Ok(Outcome::Reply(reply)) => writeln!(out, "{}", reply)?,
            Ok(Outcome::Quit) => break,
            Err(e) => writeln!(out, "{}", e)?,
        }
    }

    let open = session.snapshot();
    if !open.is_empty() {
        warn!(
            sale_id = %open.id,
            items = open.item_count(),
            total = %open.total,
            "Leaving with an unpaid sale"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use epos_core::receipt::StoreDetails;
    use epos_payments::gateway::fake::FakeGateway;

    fn session() -> PosSession {
        PosSession::new(
            Arc::new(FakeGateway::new()),
            Arc::new(printer::LogPrinter),
            StoreDetails::default(),
            42,
        )
    }

    async fn drive(session: &PosSession, script: &str) -> String {
        let mut out = Vec::new();
        repl(session, script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_repl_cash_sale() {
        let session = session();
        let out = drive(&session, "add P-1 9.99\n\nshow\npay cash 20\nquit\nshow\n").await;

        assert!(out.starts_with("Sterling EPOS."));
        assert!(out.contains("TOTAL £11.99"));
        assert!(out.contains("Change due: £8.01"));
        // nothing after quit is executed
        assert_eq!(out.matches("SALE ").count(), 1);
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_repl_reports_errors_and_continues() {
        let session = session();
        let out = drive(&session, "pay card\nfrobnicate\nadd P-1 1.00\n").await;

        assert!(out.contains("[SaleError]"));
        assert!(out.contains("[ValidationError] Unknown command 'frobnicate'"));
        assert!(out.contains("Added P-1"));
        // end of input leaves the sale open
        assert_eq!(session.snapshot().item_count(), 1);
    }
}
