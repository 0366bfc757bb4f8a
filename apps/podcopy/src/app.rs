//! Wires configuration, the kubectl channel and a transfer session together.

use std::path::Path;
use std::process::ExitCode;

use clap::Args;
use podcopy_exec::KubectlExec;
use podcopy_transfer::{TransferOutcome, TransferRequest, TransferSession};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Where to run and how to report.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Pod to copy to or from.
    #[arg(short, long)]
    pub pod: String,

    /// Namespace of the pod [default: from config]
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Container within the pod [default: from config, else the pod default]
    #[arg(short, long)]
    pub container: Option<String>,

    /// Print the outcome as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Runs one transfer; Ctrl-C cancels it.
pub async fn run_transfer(
    config: &Config,
    request: TransferRequest,
    args: TargetArgs,
) -> anyhow::Result<ExitCode> {
    let target = config.target(
        &args.pod,
        args.namespace.as_deref(),
        args.container.as_deref(),
    );
    let exec = KubectlExec::new(config.kubectl_config());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling transfer");
            interrupt.cancel();
        }
    });

    let outcome = TransferSession::new(&exec, &target, cancel)
        .run(request)
        .await;
    ctrl_c.abort();

    report(&outcome, args.json)?;
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report(outcome: &TransferOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
        return Ok(());
    }

    match (&outcome.error, outcome.stats) {
        (Some(e), _) => eprintln!("podcopy: {e}"),
        (None, Some(stats)) => println!(
            "copied {} entries ({} bytes)",
            stats.entries, stats.bytes
        ),
        (None, None) => {}
    }
    Ok(())
}

pub fn show_config(path: &Path) -> anyhow::Result<()> {
    let config = Config::load_from(path)?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save_to(path)?;
    println!("wrote {}", path.display());
    Ok(())
}
