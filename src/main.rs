use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use pitexplorer::{
    config::{Command, Config},
    dates::label,
    export,
    provider::{CeicClient, DataProvider},
    session::{LookupOutcome, SeriesSession, View, ViewKind},
    vintages::CellStyle,
};
use std::{env, sync::Arc};
use tokio::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

fn report_lookup(outcome: &LookupOutcome) -> Result<()> {
    match outcome {
        LookupOutcome::Selected { label, found, .. } => {
            println!("Found {} series.", found);
            println!("Selected: {}", label);
            Ok(())
        }
        LookupOutcome::EmptyInput => bail!("nothing to look up: empty input"),
        LookupOutcome::InvalidId(id) => bail!(
            "invalid series id format: {:?}; enter a numeric id or an SR code",
            id
        ),
        LookupOutcome::MissingFilters => bail!("frequency, geo and status are all required"),
        LookupOutcome::NoResults => bail!("no results found for the given criteria"),
        LookupOutcome::Failed(e) => bail!("lookup failed: {}", e),
    }
}

fn print_views(session: &mut SeriesSession, compare: Option<(NaiveDate, NaiveDate)>) {
    match session.view(ViewKind::Series, false) {
        Some(View::Series(points)) => {
            let last = points.last().map(|p| (label(p.date), p.value));
            println!("Latest revised series: {} points, last {:?}", points.len(), last);
        }
        _ => println!("Time series data (latest revisions) not available for this series."),
    }

    match session.view(ViewKind::VintagesTable, false) {
        Some(View::VintagesTable { table, styles }) => {
            let revisions = styles
                .iter()
                .flatten()
                .filter(|s| **s == CellStyle::Changed)
                .count();
            println!(
                "Vintages matrix: {} timepoints x {} vintages, {} highlighted revisions",
                table.num_rows(),
                table.num_columns(),
                revisions
            );
        }
        _ => {
            println!("Vintages data not available for this series.");
            return;
        }
    }
    if let Some(View::Heatmap(diff)) = session.view(ViewKind::Heatmap, false) {
        println!("Largest consecutive revision: {:?}", diff.max_abs());
    }
    if let Some(View::Animation(frames)) = session.view(ViewKind::Animation, false) {
        println!(
            "Animation: {} frames, y range {:?}",
            frames.frames.len(),
            frames.y_range
        );
    }
    match session.view(ViewKind::Comparison(compare), false) {
        Some(View::Comparison(cmp)) => println!(
            "Vintage comparison: {} vs {}",
            label(cmp.first_vintage),
            label(cmp.second_vintage)
        ),
        _ => println!("Could not generate comparison for selected dates."),
    }
    if let Some(View::Differences(diff)) = session.view(ViewKind::Differences, false) {
        let revised = diff.values.iter().filter(|v| !v.is_nan() && **v != 0.0).count();
        println!(
            "Last-minus-first: {} of {} timepoints revised",
            revised,
            diff.values.len()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) config ───────────────────────────────────────────────────
    let config = Config::parse();
    config.validate().map_err(|e| anyhow!(e))?;

    // ─── 3) login ────────────────────────────────────────────────────
    let start = Instant::now();
    let client = CeicClient::login(
        &config.server,
        config.username.as_deref().unwrap_or_default(),
        config.password.as_deref().unwrap_or_default(),
        config.client_options(),
    )
    .await
    .context("login failed; check your credentials and server configuration")?;
    info!(elapsed = ?start.elapsed(), "login ok");

    let provider: Arc<dyn DataProvider> = Arc::new(client);
    let mut session = SeriesSession::new(provider, config.vintage_query());

    // ─── 4) dispatch ─────────────────────────────────────────────────
    match config.command.clone() {
        Command::Load { series_id } => {
            let outcome = session.load_by_id(&series_id).await;
            report_lookup(&outcome)?;
        }

        Command::Search(args) => {
            let outcome = session.search(&args.into()).await;
            report_lookup(&outcome)?;
            for (label, id) in session.options() {
                println!("  {}\t{}", id, label);
            }
        }

        Command::Visualize {
            series_id,
            out,
            compare,
        } => {
            let outcome = session.load_by_id(&series_id).await;
            report_lookup(&outcome)?;

            let bundle = session
                .visualize(true)
                .await
                .ok_or_else(|| anyhow!("no series selected"))?
                .clone();

            let Some(meta) = &bundle.metadata else {
                error!(series = %series_id, "no metadata, visualizations cannot be displayed");
                bail!("failed to fetch metadata for series {}", series_id);
            };
            println!("{}", meta);

            let compare = compare.map(|d| (d[0], d[1]));
            print_views(&mut session, compare);

            let summary = tokio::task::spawn_blocking(move || {
                export::export_bundle(&bundle, &out, compare)
            })
            .await??;
            if summary.files.is_empty() {
                warn!("nothing exported");
            }
            for f in &summary.files {
                println!("wrote {}", f.display());
            }
        }
    }

    info!("all done");
    Ok(())
}
