//! `allocate`: allocate catalog materials to a job from the command line.
//!
//! The command drives the same [`AllocationWorkflow`] a UI would: load a
//! catalog page, select materials, edit quantities, pick a job, submit the
//! batch and report per-line outcomes.

use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use shopfloor_allocation::{
    AllocationDraft, AllocationWorkflow, BatchOutcome, CatalogSource, JobDirectory,
    MaterialLedger, fetch_open_jobs,
};
use shopfloor_client::config::{DEFAULT_API_URL, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};
use shopfloor_client::{ApiClient, ClientConfig};
use shopfloor_core::{JobId, MaterialId};
use shopfloor_observability::LogFormat;

#[derive(Parser, Debug, Clone)]
#[command(name = "allocate", version, about = "Allocate catalog materials to a job")]
pub struct Cli {
    /// Base URL of the shop-floor API.
    #[arg(long, env = "SHOPFLOOR_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Bearer token for the API.
    #[arg(long, env = "SHOPFLOOR_AUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "SHOPFLOOR_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "SHOPFLOOR_LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List jobs that currently accept materials.
    Jobs,
    /// List one catalog page with stock levels.
    Materials(PageArgs),
    /// Allocate materials to a job as one batch.
    Submit(SubmitArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PageArgs {
    /// Catalog page to load (1-based).
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Items per catalog page.
    #[arg(long, env = "SHOPFLOOR_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Target job id.
    #[arg(long)]
    pub job: JobId,

    /// Material and quantity as `ID=QTY`; repeat for each line.
    #[arg(long = "material", short = 'm', required = true)]
    pub materials: Vec<MaterialArg>,

    /// Notes attached to every line.
    #[arg(long)]
    pub notes: Option<String>,

    /// Validate and print the draft without submitting.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub page: PageArgs,
}

/// One `ID=QTY` command-line line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialArg {
    pub id: MaterialId,
    pub quantity: Decimal,
}

impl FromStr for MaterialArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, qty) = s
            .split_once('=')
            .ok_or_else(|| format!("expected ID=QTY, got `{s}`"))?;
        let id: MaterialId = id.parse().map_err(|e| format!("{e}"))?;
        let quantity = Decimal::from_str(qty.trim())
            .map_err(|e| format!("invalid quantity `{}`: {e}", qty.trim()))?;
        Ok(Self { id, quantity })
    }
}

impl Cli {
    pub fn page(&self) -> PageArgs {
        match &self.command {
            Command::Materials(page) => page.clone(),
            Command::Submit(args) => args.page.clone(),
            Command::Jobs => PageArgs::default(),
        }
    }

    pub fn client(&self) -> Result<ApiClient> {
        let page = self.page();
        let mut config = ClientConfig::new(&self.api_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_page_size(page.page_size);
        if let Some(token) = &self.token {
            config = config.with_token(token);
        }
        Ok(ApiClient::new(config)
            .context("failed to build HTTP client")?
            .with_page(page.page))
    }
}

/// Run `command` against `backend`, writing a report to `out`.
///
/// Returns `false` when a submission left any line uncommitted.
pub async fn run<B, W>(command: &Command, backend: &B, out: &mut W) -> Result<bool>
where
    B: CatalogSource + JobDirectory + MaterialLedger,
    W: Write,
{
    match command {
        Command::Jobs => {
            let jobs = fetch_open_jobs(backend)
                .await
                .context("failed to list open jobs")?;
            for job in &jobs {
                writeln!(out, "{}\t{}\t{}", job.id, job.status.as_str(), job.label())?;
            }
            Ok(true)
        }
        Command::Materials(_) => {
            let snapshot = backend
                .fetch_materials()
                .await
                .context("failed to load materials catalog")?;
            for item in snapshot.items() {
                writeln!(
                    out,
                    "{}\t{}\t{} {}\t@ {}",
                    item.id,
                    item.name,
                    item.current_stock_level.normalize(),
                    item.unit,
                    item.unit_price
                )?;
            }
            if let Some(page) = snapshot.page() {
                let total = page.total.map(|t| t.to_string()).unwrap_or_else(|| "?".into());
                writeln!(out, "page {} (limit {}, total {total})", page.page, page.limit)?;
            }
            Ok(true)
        }
        Command::Submit(args) => submit(args, backend, out).await,
    }
}

async fn submit<B, W>(args: &SubmitArgs, backend: &B, out: &mut W) -> Result<bool>
where
    B: CatalogSource + JobDirectory + MaterialLedger,
    W: Write,
{
    let mut workflow = AllocationWorkflow::load(backend)
        .await
        .context("failed to load materials catalog")?;
    let jobs = fetch_open_jobs(backend)
        .await
        .context("failed to list open jobs")?;
    let job = jobs
        .iter()
        .find(|j| j.id == args.job)
        .with_context(|| format!("job {} is not open for materials", args.job))?;

    for line in &args.materials {
        if !workflow.catalog().contains(&line.id) {
            bail!("material {} is not on the loaded catalog page", line.id);
        }
        if !workflow.selection().contains(&line.id) {
            workflow.toggle(line.id.clone())?;
        }
    }

    workflow.open_draft()?;
    for line in &args.materials {
        workflow.set_quantity(&line.id, line.quantity)?;
        if args.notes.is_some() {
            workflow.set_notes(&line.id, args.notes.clone())?;
        }
    }
    workflow.choose_job(job)?;

    if let Some(draft) = workflow.draft() {
        print_draft(draft, out)?;
    }
    if !workflow.can_submit() {
        bail!("draft has invalid lines; nothing was submitted");
    }
    if args.dry_run {
        writeln!(out, "dry run: nothing submitted")?;
        return Ok(true);
    }

    let result = workflow.submit(backend, backend).await?;
    tracing::info!(
        batch_id = %result.batch_id,
        succeeded = result.succeeded_count(),
        failed = result.failed_count(),
        "allocation finished"
    );
    writeln!(out, "{}", result.summary())?;
    if let Some(err) = workflow.refresh_error() {
        writeln!(out, "warning: stock levels may be stale: {err}")?;
    }

    Ok(result.outcome() == BatchOutcome::AllSucceeded)
}

fn print_draft<W: Write>(draft: &AllocationDraft, out: &mut W) -> Result<()> {
    for line in draft.lines() {
        let status = line.validation_message().unwrap_or_else(|| "ok".to_string());
        writeln!(
            out,
            "{}\t{}\t{} {}\t{}\t{status}",
            line.material_id(),
            line.material_name(),
            line.quantity().normalize(),
            line.unit(),
            line.total_cost()
        )?;
    }
    writeln!(out, "total\t{}", draft.aggregate_total())?;
    Ok(())
}
