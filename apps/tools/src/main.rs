use std::{fs, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    poll_until_ready, DevWalletSigner, MessageResultFetcher, MessengerTransport, PollBudget,
    PollOutcome, PollTarget,
};
use shared::domain::{Action, LogicalKey, ProcessId};

const EVAL_POLL_BUDGET: PollBudget = PollBudget::new(10, Duration::from_millis(2000));

#[derive(Parser, Debug)]
#[command(about = "Deployment tools for the wellness agent")]
struct Cli {
    #[arg(long, default_value = "https://mu.ao-testnet.xyz")]
    messenger_unit_url: String,
    #[arg(long, default_value = "https://cu.ao-testnet.xyz")]
    compute_unit_url: String,
    /// Deployer wallet address used for signing.
    #[arg(long)]
    wallet: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Spawn a fresh agent process from a module.
    Spawn {
        #[arg(long)]
        module: String,
        #[arg(long)]
        scheduler: String,
        #[arg(long, default_value = "wellness-agent")]
        name: String,
    },
    /// Load agent source into a running process via an Eval message.
    Load {
        #[arg(long)]
        process: String,
        /// Path to the agent source file.
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();
    let signer = Arc::new(DevWalletSigner::new(cli.wallet.clone()));

    match cli.command {
        Command::Spawn {
            module,
            scheduler,
            name,
        } => {
            // Spawns are not addressed to an existing process; the bound id
            // is a placeholder the transport never uses for them.
            let transport = MessengerTransport::new(
                cli.messenger_unit_url,
                ProcessId::from("unspawned"),
                signer,
            );
            let process_id = transport
                .spawn_process(
                    &module,
                    &scheduler,
                    &[shared::protocol::Tag::new("Name", name)],
                )
                .await?;
            println!("spawned process {process_id}");
        }
        Command::Load { process, file } => {
            let code = fs::read_to_string(&file)
                .with_context(|| format!("failed to read agent source {file}"))?;
            let process_id = ProcessId::from(process);
            let transport = MessengerTransport::new(
                cli.messenger_unit_url,
                process_id.clone(),
                signer,
            );

            let message_id = transport.submit(Action::Eval, &[], &code).await?;
            println!("eval message {message_id} submitted, waiting for the result");

            let fetcher = MessageResultFetcher::new(cli.compute_unit_url, process_id);
            // The result route only needs the message id; the key is just
            // for log lines.
            let target = PollTarget {
                key: LogicalKey::from("eval"),
                message_id,
            };
            match poll_until_ready(&fetcher, &target, EVAL_POLL_BUDGET).await {
                PollOutcome::Ready(value) => println!("agent loaded: {value}"),
                PollOutcome::Exhausted => {
                    bail!("no eval result arrived; the process may still be booting")
                }
            }
        }
    }

    Ok(())
}
