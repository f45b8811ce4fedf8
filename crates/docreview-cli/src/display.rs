//! Terminal rendering for the dashboard, the worklist and the field card.

use docreview_core::FieldReading;
use docreview_workflow::{Dashboard, FieldRow, LoadedReview};

const BAR_WIDTH: usize = 40;

// ── Dashboard ──

pub fn print_dashboard(dash: &Dashboard, threshold: f64) {
    println!("=== Document review ===");
    println!();
    println!("Metrics");
    println!("  {:<26} {}", "total documents", dash.total_documents);
    println!("  {:<26} {}", "need review", dash.outstanding);
    println!("  {:<26} {}", "verified or clean", dash.verified());
    println!("  {:<26} {}", "score threshold", threshold);
    println!();

    if dash.per_field.is_empty() {
        return;
    }
    println!("Outstanding by field (value missing or score <= {threshold})");
    let max = dash.max_field_count();
    for (field, count) in &dash.per_field {
        println!("  {:<26} {:>5} {}", field, count, bar(*count, max, BAR_WIDTH));
    }
    println!();
}

pub fn print_worklist(worklist: &[String]) {
    if worklist.is_empty() {
        println!("No documents need review.");
        return;
    }
    println!("{} document(s) need review:", worklist.len());
    for (i, name) in worklist.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, name);
    }
}

// ── Field card ──

/// Print the selected document as a card: viewer status, then every field
/// with a `!` on flagged rows and a numbered approval box.
pub fn print_review_card(review: &LoadedReview<'_>) {
    println!("=== {} ===", review.file_name());
    match review.viewer_error() {
        Some(err) => println!("  viewer unavailable: {err}"),
        None => println!("  {}", review.page_label()),
    }
    if let Some(at) = review.document().verification_date {
        println!("  verified {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();

    println!("Fields");
    let mut position = 0;
    for row in review.rows() {
        let check = if row.flag.is_some() {
            position += 1;
            let mark = if review.is_approved(&row.field.name) { 'x' } else { ' ' };
            format!("{position:>2}[{mark}]")
        } else {
            "     ".to_string()
        };
        println!("{}", field_line(&check, row));
        if let Some(reason) = &row.flag {
            println!("        ! {reason}");
        }
    }
    println!();

    let pending = review.pending();
    if review.approvals().is_empty() {
        println!("Nothing flagged; ready to submit.");
    } else if pending.is_empty() {
        println!("All checks approved; ready to submit.");
    } else {
        println!("Pending approval: {}", pending.join(", "));
    }
}

fn field_line(check: &str, row: &FieldRow) -> String {
    let FieldReading { value, score } = &row.reading;
    format!(
        " {check} {:<28} {:<30} {}",
        row.field.name,
        value.as_deref().unwrap_or("(missing)"),
        format_score(*score)
    )
}

// ── Helpers ──

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "score -".to_string(), |s| format!("score {s:.2}"))
}

/// Horizontal bar of `count` relative to `max`, at most `width` cells.
fn bar(count: u64, max: u64, width: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let cells = (count as f64 / max as f64 * width as f64).round() as usize;
    "#".repeat(cells.clamp(1, width))
}
