//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use adaptest_core::irt::{is_sem_defined, THETA_MAX, THETA_MIN};
use adaptest_core::report::SessionReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML report for one session.
pub fn generate_html(report: &SessionReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>adaptest report: {} ({})</title>\n",
        html_escape(&report.learner_id),
        report.kind
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>adaptest report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Learner: <strong>{}</strong> | {} | session {} | started {}</p>\n",
        html_escape(&report.learner_id),
        report.kind,
        report.session_id,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Status</th><th>Items</th><th>Correct</th><th>Accuracy</th><th>Theta</th><th>SEM</th><th>Level</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    let status = match &report.summary {
        Some(summary) => summary.reason.to_string(),
        None => "in progress".to_string(),
    };
    let sem = match report.summary.as_ref().map(|s| s.sem) {
        Some(sem) if is_sem_defined(sem) => format!("{sem:.3}"),
        _ => "-".to_string(),
    };
    html.push_str(&format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td><td>{:.3}</td><td>{}</td><td>{}</td></tr>\n",
        html_escape(&status),
        report.responses.len(),
        report.correct_count(),
        report.accuracy_pct(),
        report.final_theta(),
        sem,
        report.level(),
    ));
    html.push_str("</tbody></table>\n");

    html.push_str("<h2>Ability trajectory</h2>\n");
    html.push_str(&generate_theta_chart(&report.theta_trajectory()));

    let breakdown = report.category_breakdown();
    if !breakdown.is_empty() {
        html.push_str("<h2>Categories</h2>\n");
        html.push_str("<table class=\"categories\">\n");
        html.push_str(
            "<thead><tr><th>Category</th><th>Answered</th><th>Correct</th><th>Accuracy</th></tr></thead>\n",
        );
        html.push_str("<tbody>\n");
        for (category, counts) in &breakdown {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>\n",
                html_escape(category),
                counts.answered,
                counts.correct,
                counts.accuracy_pct()
            ));
        }
        html.push_str("</tbody></table>\n");
    }

    html.push_str("</section>\n");

    // Per-response results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Responses</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">#</th><th onclick=\"sortTable(1)\">Item</th><th onclick=\"sortTable(2)\">Category</th><th onclick=\"sortTable(3)\">Difficulty</th><th onclick=\"sortTable(4)\">Answer</th><th onclick=\"sortTable(5)\">Theta before</th><th onclick=\"sortTable(6)\">Theta after</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for (i, r) in report.responses.iter().enumerate() {
        let class = if r.is_correct { "pass" } else { "fail" };
        let text = if r.is_correct { "correct" } else { "incorrect" };

        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td class=\"{}\">{}</td><td>{:.3}</td><td>{:.3}</td></tr>\n",
            class,
            i + 1,
            html_escape(&r.item_id),
            html_escape(&r.category),
            r.params.b,
            class,
            text,
            r.theta_before,
            r.theta_after
        ));
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &SessionReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

/// Line chart of theta after each response on the fixed [-3, 3] scale.
fn generate_theta_chart(trajectory: &[f64]) -> String {
    let width = 600.0;
    let height = 240.0;
    let margin = 40.0;
    let plot_w = width - 2.0 * margin;
    let plot_h = height - 2.0 * margin;

    let x_of = |i: usize| {
        let steps = trajectory.len().saturating_sub(1).max(1) as f64;
        margin + plot_w * i as f64 / steps
    };
    let y_of = |theta: f64| {
        let t = (theta.clamp(THETA_MIN, THETA_MAX) - THETA_MIN) / (THETA_MAX - THETA_MIN);
        margin + plot_h * (1.0 - t)
    };

    let mut svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n"
    );

    // Gridlines at the level cut points and the scale ends.
    for theta in [-3.0, -1.0, 0.5, 1.5, 3.0] {
        let y = y_of(theta);
        svg.push_str(&format!(
            "  <line x1=\"{margin}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#9ca3af\" stroke-dasharray=\"4 4\"/>\n",
            margin + plot_w
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{y:.1}\" font-size=\"11\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{theta:+.1}</text>\n",
            margin - 6.0
        ));
    }

    let points: Vec<String> = trajectory
        .iter()
        .enumerate()
        .map(|(i, &theta)| format!("{:.1},{:.1}", x_of(i), y_of(theta)))
        .collect();
    svg.push_str(&format!(
        "  <polyline points=\"{}\" fill=\"none\" stroke=\"#3b82f6\" stroke-width=\"2\"/>\n",
        points.join(" ")
    ));
    for (i, &theta) in trajectory.iter().enumerate() {
        svg.push_str(&format!(
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"#3b82f6\"><title>{:.3}</title></circle>\n",
            x_of(i),
            y_of(theta),
            theta
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    if (!isNaN(na) && !isNaN(nb)) return asc ? na - nb : nb - na;
    return asc ? va.localeCompare(vb) : vb.localeCompare(va);
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::model::{
        AbilityLevel, CompletionReason, ItemParams, ResponseEvent, Session, SessionKind,
        SessionState, SessionSummary,
    };

    fn make_test_report() -> SessionReport {
        let mut session = Session::new("learner <7>", SessionKind::PreAssessment, 0.0);
        let responses = vec![
            ResponseEvent {
                session_id: session.id,
                learner_id: session.learner_id.clone(),
                item_id: "spell-001".into(),
                category: "Spelling".into(),
                is_correct: true,
                params: ItemParams::new(1.2, -0.5, 0.2),
                theta_before: 0.0,
                theta_after: 1.0,
                recorded_at: chrono::Utc::now(),
            },
            ResponseEvent {
                session_id: session.id,
                learner_id: session.learner_id.clone(),
                item_id: "gram-004".into(),
                category: "Grammar".into(),
                is_correct: false,
                params: ItemParams::new(1.0, 1.2, 0.2),
                theta_before: 1.0,
                theta_after: 0.42,
                recorded_at: chrono::Utc::now(),
            },
        ];
        session.state = SessionState::Completed;
        session.current_theta = 0.42;
        session.summary = Some(SessionSummary {
            total_items: 2,
            correct_count: 1,
            accuracy_pct: 50.0,
            final_theta: 0.42,
            sem: 0.812,
            level: AbilityLevel::Basic,
            reason: CompletionReason::MaximumItemsReached,
        });
        SessionReport::new(&session, responses)
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report();
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("spell-001"));
        assert!(html.contains("gram-004"));
        assert!(html.contains("maximum items reached"));
        assert!(html.contains("<polyline"));
        assert!(html.contains("50.00%"));
    }

    #[test]
    fn learner_id_is_escaped() {
        let html = generate_html(&make_test_report());
        assert!(html.contains("learner &lt;7&gt;"));
        assert!(!html.contains("learner <7>"));
    }

    #[test]
    fn chart_has_a_point_per_estimate() {
        let svg = generate_theta_chart(&[0.0, 1.0, 0.42]);
        assert_eq!(svg.matches("<circle").count(), 3);
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("report.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
