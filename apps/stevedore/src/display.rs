//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use serde::Serialize;
use std::io;
use std::time::Duration;
use stevedore_script::ScriptSummary;
use stevedore_workflow::WorkflowResult;

use crate::cli::ColorChoice;

/// What a command produced
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum OperationResult {
    Workflow(WorkflowResult),
    Verified(ScriptSummary),
    Cleaned { removed: bool },
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    color_choice: ColorChoice,
    term: Term,
}

impl OutputRenderer {
    pub fn new(json_output: bool, color_choice: ColorChoice) -> Self {
        Self {
            json_output,
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            OperationResult::Workflow(workflow) => self.render_workflow(workflow),
            OperationResult::Verified(summary) => self.render_summary(summary),
            OperationResult::Cleaned { removed } => {
                if *removed {
                    println!("Removed warm container.");
                } else {
                    println!("No warm container for this project.");
                }
                Ok(())
            }
        }
    }

    fn render_workflow(&self, result: &WorkflowResult) -> io::Result<()> {
        if !result.step_results.is_empty() {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(vec![
                Cell::new("Step").add_attribute(Attribute::Bold),
                Cell::new("Context").add_attribute(Attribute::Bold),
                Cell::new("Status").add_attribute(Attribute::Bold),
                Cell::new("Duration").add_attribute(Attribute::Bold),
            ]);

            for step in &result.step_results {
                let status = if step.success {
                    Cell::new("ok").fg(Color::Green)
                } else {
                    Cell::new("failed").fg(Color::Red)
                };
                table.add_row(vec![
                    Cell::new(&step.name),
                    Cell::new(step.context.as_deref().unwrap_or("-")),
                    status,
                    Cell::new(format_duration(step.duration)),
                ]);
            }

            println!("{table}");
        }

        let headline = format!(
            "{} {} in {} ({} steps run, {} failed)",
            result.workflow_name,
            if result.success { "succeeded" } else { "failed" },
            format_duration(result.duration),
            result.steps_run(),
            result.steps_failed(),
        );
        println!("{}", self.style_outcome(&headline, result.success));

        if let Some(failed) = result.failed_step() {
            if let Some(error) = &failed.error {
                println!("  {}: {error}", failed.name);
            }
        }
        Ok(())
    }

    fn render_summary(&self, summary: &ScriptSummary) -> io::Result<()> {
        println!("{}", self.style_bold(&summary.workflow_name));
        if let Some(description) = &summary.metadata.description {
            println!("{description}");
        }
        println!();

        if summary.steps.is_empty() {
            println!("No steps registered.");
            return Ok(());
        }

        for (index, step) in summary.steps.iter().enumerate() {
            let detail = step
                .message
                .as_deref()
                .or(step.context.as_deref())
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            println!("{:>3}. {}{detail}", index + 1, step.name);
        }
        Ok(())
    }

    fn style_bold(&self, text: &str) -> String {
        if self.supports_color() {
            Style::new().bold().apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn style_outcome(&self, text: &str, success: bool) -> String {
        if !self.supports_color() {
            return text.to_string();
        }
        let style = if success {
            Style::new().green().bold()
        } else {
            Style::new().red().bold()
        };
        style.apply_to(text).to_string()
    }

    fn supports_color(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_durations_render_in_milliseconds() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn cleaned_result_serializes_as_plain_object() {
        let json = serde_json::to_value(OperationResult::Cleaned { removed: true }).unwrap();
        assert_eq!(json, serde_json::json!({ "removed": true }));
    }
}
