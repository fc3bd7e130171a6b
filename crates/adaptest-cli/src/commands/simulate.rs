//! The `adaptest simulate` command.
//!
//! Runs simulated examinees with known abilities through complete sessions
//! against an in-memory store, then reports how well the engine recovered
//! each true ability.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;

use adaptest_core::engine::{CatEngine, ItemOffer, NextStep, ResponseOutcome, SessionObserver};
use adaptest_core::irt::round_to;
use adaptest_core::model::{AbilityLevel, Session, SessionKind, SessionSummary};
use adaptest_core::report::SessionReport;
use adaptest_core::simulation::{Examinee, SimulatedExaminee};
use adaptest_core::statistics::{compute_cohort_stats, share_at_or_above, CohortStats};
use adaptest_core::traits::CatStores;
use adaptest_store::InMemoryStore;

use super::{format_sem, load_workspace, require_items};

/// Prints one line per finished session.
struct ProgressObserver {
    total: usize,
    completed: AtomicUsize,
}

impl SessionObserver for ProgressObserver {
    fn on_session_started(&self, _session: &Session) {}

    fn on_item_offered(&self, offer: &ItemOffer) {
        tracing::trace!(session = %offer.session_id, item = %offer.item.id, "item offered");
    }

    fn on_response_recorded(&self, _outcome: &ResponseOutcome) {}

    fn on_session_completed(&self, session: &Session, summary: &SessionSummary) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        eprintln!(
            "  [{done}/{}] {} theta {:.3} after {} items ({})",
            self.total, session.learner_id, summary.final_theta, summary.total_items, summary.reason
        );
    }
}

#[derive(Debug, Serialize)]
struct SimulatedLearner {
    learner_id: String,
    true_theta: f64,
    estimated_theta: f64,
    error: f64,
    sem: Option<f64>,
    items: usize,
    accuracy_pct: f64,
    level: AbilityLevel,
}

#[derive(Debug, Serialize)]
struct SimulationOutput {
    seed: u64,
    learners: Vec<SimulatedLearner>,
    bias: f64,
    rmse: f64,
    cohort: CohortStats,
}

/// Drive one session to completion with `examinee` answering.
async fn run_examinee(
    engine: &CatEngine,
    learner_id: &str,
    mut examinee: impl Examinee,
) -> Result<SessionReport> {
    let session = engine
        .start_session(learner_id, SessionKind::PreAssessment, Some(0.0))
        .await?;

    while let NextStep::Item(offer) = engine.next_item(session.id).await? {
        let correct = examinee.answer(&offer.item);
        engine
            .record_response(session.id, &offer.item.id, correct)
            .await?;
    }

    Ok(engine.session_report(session.id).await?)
}

fn spread(i: usize, n: usize, min: f64, max: f64) -> f64 {
    if n <= 1 {
        return (min + max) / 2.0;
    }
    min + (max - min) * i as f64 / (n - 1) as f64
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config_path: Option<PathBuf>,
    item_bank: Option<PathBuf>,
    learners: usize,
    theta_min: f64,
    theta_max: f64,
    parallelism: usize,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    if learners == 0 {
        anyhow::bail!("--learners must be at least 1");
    }
    if theta_min > theta_max {
        anyhow::bail!("--theta-min ({theta_min}) is greater than --theta-max ({theta_max})");
    }

    let (config, catalog) = load_workspace(config_path.as_deref(), item_bank)?;
    require_items(&catalog)?;

    let seed = seed.or(config.seed).unwrap_or_else(rand::random);
    tracing::info!(
        learners,
        seed,
        bank = %catalog.id,
        "starting simulation"
    );

    let stores = CatStores::from_shared(Arc::new(InMemoryStore::from_catalog(&catalog)));
    let observer = Arc::new(ProgressObserver {
        total: learners,
        completed: AtomicUsize::new(0),
    });
    let engine = Arc::new(CatEngine::with_seed(stores, config.cat.clone(), seed)?.with_observer(observer));

    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut futures = FuturesUnordered::new();

    for i in 0..learners {
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        let true_theta = spread(i, learners, theta_min, theta_max);
        let learner_id = format!("sim-{i:03}");

        futures.push(async move {
            let _permit = semaphore.acquire().await?;
            let examinee = SimulatedExaminee::with_seed(true_theta, seed.wrapping_add(i as u64 + 1));
            let true_theta = examinee.true_theta();
            let report = run_examinee(&engine, &learner_id, examinee)
                .await
                .with_context(|| format!("simulation failed for {learner_id}"))?;
            anyhow::Ok((true_theta, report))
        });
    }

    let mut runs = Vec::with_capacity(learners);
    while let Some(result) = futures.next().await {
        runs.push(result?);
    }
    runs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let rows: Vec<SimulatedLearner> = runs
        .iter()
        .map(|(true_theta, report)| SimulatedLearner {
            learner_id: report.learner_id.clone(),
            true_theta: round_to(*true_theta, 3),
            estimated_theta: report.final_theta(),
            error: round_to(report.final_theta() - true_theta, 3),
            sem: report.sem(),
            items: report.responses.len(),
            accuracy_pct: report.accuracy_pct(),
            level: report.level(),
        })
        .collect();

    let n = rows.len() as f64;
    let bias = round_to(rows.iter().map(|r| r.error).sum::<f64>() / n, 3);
    let rmse = round_to((rows.iter().map(|r| r.error * r.error).sum::<f64>() / n).sqrt(), 3);

    let reports: Vec<SessionReport> = runs.into_iter().map(|(_, report)| report).collect();
    let cohort = compute_cohort_stats(&reports);

    print_table(&rows);
    eprintln!(
        "\nSessions: {}  Mean items: {:.2}  Mean SEM: {}  Bias: {:+.3}  RMSE: {:.3}",
        cohort.sessions,
        cohort.mean_items,
        cohort.mean_sem.map(format_sem).unwrap_or_else(|| "undefined".into()),
        bias,
        rmse
    );
    eprintln!(
        "Proficient or above: {:.1}%",
        share_at_or_above(&cohort, AbilityLevel::Proficient)
    );

    if let Some(path) = output {
        let result = SimulationOutput {
            seed,
            learners: rows,
            bias,
            rmse,
            cohort,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Simulation results: {}", path.display());
    }

    Ok(())
}

fn print_table(rows: &[SimulatedLearner]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Learner", "True θ", "Estimate", "Error", "SEM", "Items", "Accuracy", "Level",
    ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(&row.learner_id),
            Cell::new(format!("{:.3}", row.true_theta)),
            Cell::new(format!("{:.3}", row.estimated_theta)),
            Cell::new(format!("{:+.3}", row.error)),
            Cell::new(row.sem.map(format_sem).unwrap_or_else(|| "-".into())),
            Cell::new(row.items),
            Cell::new(format!("{:.1}%", row.accuracy_pct)),
            Cell::new(row.level),
        ]);
    }

    eprintln!("\n{table}");
}
