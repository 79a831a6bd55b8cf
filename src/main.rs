use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use jobwait::cli::{Cli, Command};
use jobwait::config::JobwaitConfig;
use jobwait::orchestrator::{JobRequest, SessionOutcome, run_session};
use jobwait::service::HttpJobService;
use jobwait::ui::JobProgress;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => JobwaitConfig::load_from(path)?,
        None => JobwaitConfig::load()?,
    };
    let defaults = config.session_defaults();

    match &cli.command {
        Command::Check => {
            let resolved = cli.session_overrides().layered_over(&defaults).resolve()?;
            println!("# service: {}", config.service.base_url);
            println!("[session]");
            print!("{}", toml::to_string(&resolved.to_settings())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            statement,
            file,
            params,
            client_request_token,
        } => {
            let mut job = match file {
                Some(path) => JobRequest::load(path)?,
                None => JobRequest::default(),
            };
            if let Some(statement) = statement {
                job.submit.statement = statement.clone();
            }
            if job.submit.statement.trim().is_empty() {
                bail!("a statement is required, either as an argument or in --file");
            }
            job.submit.parameters.extend(params.iter().cloned());
            if client_request_token.is_some() {
                job.submit.client_request_token = client_request_token.clone();
            }

            // Flags override the job file, which overrides jobwait.toml.
            let settings = cli
                .session_overrides()
                .layered_over(&job.session)
                .layered_over(&defaults);

            let service = HttpJobService::with_timeout(
                &config.service.base_url,
                config.service.request_timeout(),
            )?;

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let progress = JobProgress::start(&job.submit.statement);
            let report = match run_session(&service, &job.submit, &settings, cancel, &progress).await
            {
                Ok(report) => report,
                Err(e) => {
                    progress.abort(&e);
                    return Err(e.into());
                }
            };
            progress.complete(&report);
            progress.print_report(&report);

            if report.outcome == SessionOutcome::Succeeded {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "jobwait=debug" } else { "jobwait=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
