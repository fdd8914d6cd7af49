use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod compile;
use compile::CompileArgs;

#[derive(Debug, Parser)]
#[command(name = "tronbox", about = "Smart contract build tooling for TRON", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile contract source files
    Compile(CompileArgs),
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Compile(args) => {
            let output = args.run().await?;
            tracing::debug!("{} contracts, status {:?}", output.contracts.len(), output.status);
        }
    }
    Ok(())
}
