use std::io::Write;

use anyhow::{Context, Result};

use crate::session_list::EntryRow;
use crate::suggest::TaskInput;
use crate::time_entry::AvailableTask;
use crate::timer::{Controls, TimerState};

/// Consoleにタイマーとセッション一覧を表示するためのtrait。
pub trait ConsolePresenter {
    /// タイマーの状態と経過時間を表示する。
    fn show_timer(&mut self, state: &TimerState, controls: &Controls, clock: &str) -> Result<()>;

    /// セッション一覧を表示する。
    ///
    /// # Arguments
    ///
    /// * `rows` - 表示する行
    fn show_rows(&mut self, rows: &[EntryRow]) -> Result<()>;

    /// 入力候補を表示する。
    fn show_suggestions(&mut self, tasks: &[&AvailableTask]) -> Result<()>;
}

/// Markdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

fn input_label(input: &TaskInput) -> String {
    match (input.text.as_str(), input.task_id) {
        ("", None) => "(untitled)".to_string(),
        ("", Some(task_id)) => format!("task #{}", task_id),
        (text, _) => text.to_string(),
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    fn show_timer(&mut self, state: &TimerState, controls: &Controls, clock: &str) -> Result<()> {
        let status = match state {
            TimerState::Idle => "idle",
            TimerState::Running { .. } => "running",
            TimerState::Paused { .. } => "paused",
        };
        let input = TaskInput {
            text: controls.input_text.clone(),
            task_id: controls.input_task_id,
        };
        let label = match state {
            TimerState::Idle => String::new(),
            _ => format!(" {}", input_label(&input)),
        };

        writeln!(self.writer, "{} [{}]{}", clock, status, label)
            .context("Failed to write timer")?;

        Ok(())
    }

    // 行をlist形式で表示する。
    fn show_rows(&mut self, rows: &[EntryRow]) -> Result<()> {
        if rows.is_empty() {
            writeln!(self.writer, "No sessions tracked yet.")
                .context("Failed to write empty message")?;
            return Ok(());
        }

        for row in rows {
            let project = row
                .project_name
                .as_deref()
                .map(|project| format!(" - {}", project))
                .unwrap_or_default();
            let link = row
                .edit_link()
                .map(|link| format!(" ({})", link))
                .unwrap_or_default();
            let track = if row.track_enabled { "" } else { " (track disabled)" };
            writeln!(
                self.writer,
                "- #{} {}{}: {}{}{}",
                row.entry_id, row.name, project, row.duration, link, track
            )
            .with_context(|| format!("Failed to write entry row: {:?}", row))?;
        }

        Ok(())
    }

    fn show_suggestions(&mut self, tasks: &[&AvailableTask]) -> Result<()> {
        for task in tasks {
            writeln!(
                self.writer,
                "- #{} {} ({})",
                task.task_id,
                task.title,
                task.project_name.as_deref().unwrap_or_default()
            )
            .with_context(|| format!("Failed to write suggestion: {:?}", task))?;
        }

        Ok(())
    }
}
