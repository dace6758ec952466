use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::task::{Priority, StatusMarker, Task, TaskId};

fn entry_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^- (\[[ =xX*P]\])\s+\[([^\]]+)\]\s*(.*)$").expect("valid regex")
    })
}

/// Result of parsing the board markdown.
///
/// `entry_lines` maps each task to the zero-based line index of its entry
/// line so status rewrites can touch exactly one glyph.
#[derive(Debug, Default)]
pub struct ParsedBoard {
    pub tasks: Vec<Task>,
    pub entry_lines: HashMap<TaskId, usize>,
    /// (line number, message) for entries that were reported and excluded.
    pub invalid: Vec<(usize, String)>,
}

impl ParsedBoard {
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Dependencies must reference identifiers that exist on the board.
    pub fn validate_dependencies(&self) -> Vec<(TaskId, TaskId)> {
        let known: Vec<&TaskId> = self.tasks.iter().map(|t| &t.id).collect();
        let mut unknown = Vec::new();
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !known.contains(&dep) {
                    unknown.push((task.id.clone(), dep.clone()));
                }
            }
        }
        unknown
    }
}

/// Section of a task entry currently receiving sub-bullets.
#[derive(PartialEq)]
enum SubSection {
    None,
    Scope,
    Acceptance,
}

/// Parses the board markdown. Only entries under the `## TASKS` section are
/// considered; HTML comment lines are ignored; entries with invalid
/// identifiers are reported and excluded.
pub fn parse_board(content: &str) -> ParsedBoard {
    let mut board = ParsedBoard::default();
    let mut in_tasks = false;
    let mut current: Option<Task> = None;
    let mut section = SubSection::None;

    for (line_no, raw) in content.lines().enumerate() {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("<!--") {
            continue;
        }

        if let Some(heading) = raw.strip_prefix("## ") {
            if in_tasks {
                // A new section ends the task list.
                if let Some(task) = current.take() {
                    board.tasks.push(task);
                }
            }
            in_tasks = heading.trim().eq_ignore_ascii_case("TASKS");
            continue;
        }

        if !in_tasks {
            continue;
        }

        if let Some(captures) = entry_pattern().captures(raw) {
            if let Some(task) = current.take() {
                board.tasks.push(task);
            }
            section = SubSection::None;

            let glyph = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let id_text = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            let title = captures.get(3).map(|m| m.as_str().trim()).unwrap_or("");

            let Some(marker) = StatusMarker::from_glyph(glyph) else {
                board
                    .invalid
                    .push((line_no + 1, format!("unknown status glyph {}", glyph)));
                continue;
            };

            match id_text.parse::<TaskId>() {
                Ok(id) => {
                    let mut task = Task::new(id.clone(), title);
                    task.marker = marker;
                    board.entry_lines.insert(id, line_no);
                    current = Some(task);
                }
                Err(_) => {
                    warn!(line = line_no + 1, id = %id_text, "Excluding entry with invalid identifier");
                    board
                        .invalid
                        .push((line_no + 1, format!("invalid identifier {}", id_text)));
                }
            }
            continue;
        }

        let Some(task) = current.as_mut() else {
            continue;
        };

        // Field lines are indented bullets under the entry.
        if let Some(rest) = field_value(trimmed, "Description:") {
            task.description = rest.to_string();
            section = SubSection::None;
        } else if let Some(rest) = field_value(trimmed, "Priority:") {
            match rest.parse::<Priority>() {
                Ok(p) => task.priority = p,
                Err(_) => board
                    .invalid
                    .push((line_no + 1, format!("invalid priority {}", rest))),
            }
            section = SubSection::None;
        } else if let Some(rest) = field_value(trimmed, "Dependencies:") {
            if !rest.eq_ignore_ascii_case("none") {
                for part in rest.split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    match part.parse::<TaskId>() {
                        Ok(dep) => task.dependencies.push(dep),
                        Err(_) => board
                            .invalid
                            .push((line_no + 1, format!("invalid dependency {}", part))),
                    }
                }
            }
            section = SubSection::None;
        } else if field_value(trimmed, "Scope:").is_some() {
            section = SubSection::Scope;
        } else if field_value(trimmed, "Acceptance Criteria:").is_some() {
            section = SubSection::Acceptance;
        } else if let Some(item) = trimmed.strip_prefix("- ") {
            match section {
                SubSection::Scope => task.scope.push(item.trim().to_string()),
                SubSection::Acceptance => task.acceptance_criteria.push(item.trim().to_string()),
                SubSection::None => {}
            }
        }
    }

    if let Some(task) = current.take() {
        board.tasks.push(task);
    }

    board
}

fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    line.strip_prefix("- ")
        .and_then(|rest| rest.strip_prefix(field))
        .map(str::trim)
}

/// Renders tasks back to the canonical board form. Used for `init`
/// scaffolding and tests; status rewrites edit the original text instead.
pub fn render_board(tasks: &[Task]) -> String {
    let mut out = String::from("## TASKS\n\n");

    for task in tasks {
        out.push_str(&format!(
            "- {} [{}] {}\n",
            task.marker.glyph(),
            task.id,
            task.title
        ));
        if !task.description.is_empty() {
            out.push_str(&format!("  - Description: {}\n", task.description));
        }
        out.push_str(&format!("  - Priority: {}\n", task.priority));
        if task.dependencies.is_empty() {
            out.push_str("  - Dependencies: none\n");
        } else {
            let deps: Vec<&str> = task.dependencies.iter().map(|d| d.as_str()).collect();
            out.push_str(&format!("  - Dependencies: {}\n", deps.join(", ")));
        }
        if !task.scope.is_empty() {
            out.push_str("  - Scope:\n");
            for item in &task.scope {
                out.push_str(&format!("    - {}\n", item));
            }
        }
        if !task.acceptance_criteria.is_empty() {
            out.push_str("  - Acceptance Criteria:\n");
            for item in &task.acceptance_criteria {
                out.push_str(&format!("    - {}\n", item));
            }
        }
        out.push('\n');
    }

    out
}
