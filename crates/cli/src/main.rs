use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use shopfloor_cli::{Cli, run};
use shopfloor_observability::LogConfig;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    shopfloor_observability::init(&LogConfig::default().with_format(cli.log_format));

    let client = cli.client()?;
    if !client.check_connectivity().await {
        tracing::warn!(api_url = %cli.api_url, "health check failed; trying anyway");
    }

    let mut stdout = std::io::stdout().lock();
    let all_committed = run(&cli.command, &client, &mut stdout).await?;

    Ok(if all_committed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
