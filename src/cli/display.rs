use console::{style, Style};

use crate::board::{BoardCounts, StatusMarker, Task};
use crate::pool::PoolEntry;

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_success(&self, text: &str) {
        println!("{} {}", style("✓").green().bold(), text);
    }

    pub fn print_error(&self, text: &str) {
        eprintln!("{} {}", style("✗").red().bold(), text);
    }

    pub fn print_warning(&self, text: &str) {
        println!("{} {}", style("!").yellow().bold(), text);
    }

    pub fn print_info(&self, text: &str) {
        println!("{} {}", style("·").dim(), text);
    }

    pub fn print_counts(&self, counts: &BoardCounts) {
        println!(
            "Tasks: {} total ({} pending, {} in progress, {} done, {} failed, {} awaiting approval)",
            style(counts.total()).bold(),
            counts.pending,
            style(counts.in_progress).yellow(),
            style(counts.done).green(),
            style(counts.failed).red(),
            counts.pending_approval,
        );
    }

    pub fn print_task_row(&self, task: &Task) {
        let status_style = self.marker_style(task.marker);
        println!(
            "  {}  {:<12} {:<16} {}",
            status_style.apply_to(task.marker.glyph()),
            style(task.id.as_str()).bold(),
            status_style.apply_to(task.marker.to_string()),
            task.title,
        );
    }

    pub fn print_worker_row(&self, entry: &PoolEntry) {
        println!(
            "  {:<12} {:<8} pid {:<8} since {}",
            style(entry.task_id.as_str()).bold(),
            entry.kind,
            entry.pid,
            entry.started_at.format("%H:%M:%S"),
        );
    }

    fn marker_style(&self, marker: StatusMarker) -> Style {
        match marker {
            StatusMarker::Pending => Style::new().white(),
            StatusMarker::InProgress => Style::new().yellow(),
            StatusMarker::Done => Style::new().green(),
            StatusMarker::Failed => Style::new().red(),
            StatusMarker::PendingApproval => Style::new().magenta(),
        }
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
