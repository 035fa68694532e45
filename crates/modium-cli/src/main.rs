//! modium — drive a closed WebView mod manager through its own IPC bridge.

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};
use modium_bridge::{bootstrap, listing, probe, BridgeClient, Reassembler, TokenCapture, TrafficRecorder};
use modium_core::protocol;
use modium_devtools::{detect_port, pick_target, DevtoolsSession};

/// First wait for a token after the poke.
const TOKEN_WAIT: Duration = Duration::from_secs(2);

/// Second wait, after nudging the UI into making some noise.
const TOKEN_WAIT_AFTER_NUDGE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };
    if let Err(msg) = cli.validate() {
        eprintln!("{msg}");
        std::process::exit(1);
    }

    if let Some(command) = &cli.command {
        return run_scan(command);
    }

    let port = detect_port(&cli.host, cli.port).await?;
    info!("Using DevTools at http://{}:{}", cli.host, port);
    let target = pick_target(&cli.host, port).await?;
    let session = DevtoolsSession::connect(&cli.host, port, &target).await?;

    // Passive observers first, so nothing that happens during bootstrap is
    // missed; then the page-side hooks and the poke that makes the app emit
    // a keyed request.
    let tokens = TokenCapture::attach(&session);

    if let Some(seconds) = cli.sniff {
        let recorder = TrafficRecorder::attach(&session);
        bootstrap::install(&session).await?;
        bootstrap::poke(&session).await;
        run_sniff(&cli, &recorder, seconds).await?;
        session.close().await;
        return Ok(());
    }

    bootstrap::install(&session).await?;
    bootstrap::poke(&session).await;

    if tokens.await_token(&session, TOKEN_WAIT).await.is_none() {
        probe::nudge_library(&session).await;
        tokens.await_token(&session, TOKEN_WAIT_AFTER_NUDGE).await;
    }

    let client = BridgeClient::new(session.clone(), tokens);

    if cli.list {
        let reassembler = Reassembler::attach(&session);
        let records =
            listing::list_installed(&client, &reassembler, cli.game, protocol::LISTING_PAGE_SIZE)
                .await;
        let json = serde_json::to_string_pretty(&records)?;
        match &cli.out {
            Some(path) => {
                std::fs::write(path, json)?;
                info!("wrote {} records to {}", records.len(), path.display());
            }
            None => println!("{json}"),
        }
    } else {
        let disabled = cli.disable;
        for &mod_id in &cli.mods {
            info!("set_disabled mod={mod_id} disabled={disabled}");
            client.set_disabled(cli.game, mod_id, disabled).await?;
        }
        info!("applying changes");
        client.apply_changes(cli.game).await;

        if !cli.no_refresh {
            probe::nudge_library(&session).await;
            info!("refresh attempted");
        }
    }

    session.close().await;
    Ok(())
}

/// Record non-local traffic for the requested duration, then dump it.
async fn run_sniff(cli: &Cli, recorder: &TrafficRecorder, seconds: u64) -> anyhow::Result<()> {
    info!("sniffing non-local traffic for {seconds}s");
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    match &cli.sniff_out {
        Some(path) => {
            recorder.write_json(path)?;
            info!("wrote {} entries to {}", recorder.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&recorder.snapshot())?),
    }
    Ok(())
}

/// Offline analysis subcommands; no session involved.
fn run_scan(command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Analyze { unpacked, out } => {
            let report = modium_scan::scan_bundle(unpacked)?;
            emit_report(&serde_json::to_string_pretty(&report)?, out.as_deref())
        }
        Command::AnalyzeNative { unpacked, out } => {
            let report = modium_scan::scan_binaries(unpacked)?;
            emit_report(&serde_json::to_string_pretty(&report)?, out.as_deref())
        }
        Command::InjectHook { unpacked } => {
            let patched = modium_scan::inject_hook(unpacked)?;
            if patched.is_empty() {
                println!("no startup files needed patching");
            } else {
                for path in patched {
                    println!("patched {}", path.display());
                }
            }
            Ok(())
        }
    }
}

fn emit_report(json: &str, out: Option<&std::path::Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("wrote report to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
