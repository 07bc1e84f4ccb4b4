use std::io::{self, Write};
use std::time::Instant;

use colored::Colorize;
use serde::Serialize;

use crate::output::format::OutputFormat;
use crate::output::model::{CommandError, CommandResult, ErrorCode, SCHEMA_VERSION};

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	origin: Option<String>,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			origin: None,
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = Some(origin.into());
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			origin: self.origin,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.start_time.elapsed().as_millis() as u64),
		}
	}
}

/// Print a command result to stdout in the specified format.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(data) = result.data.as_ref().and_then(|d| serde_json::to_value(d).ok()) {
			write_fields(&mut stdout, &data, 0);
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "{} [{}]: {}", "Error".red().bold(), error.code, error.message);
	}
}

fn write_fields(out: &mut impl Write, value: &serde_json::Value, depth: usize) {
	let indent = "  ".repeat(depth);
	match value {
		serde_json::Value::Object(map) => {
			for (key, value) in map {
				match value {
					serde_json::Value::Object(_) => {
						let _ = writeln!(out, "{indent}{}:", key.bold());
						write_fields(out, value, depth + 1);
					}
					serde_json::Value::Null => {
						let _ = writeln!(out, "{indent}{}: {}", key.bold(), "-".dimmed());
					}
					other => {
						let _ = writeln!(out, "{indent}{}: {}", key.bold(), scalar(other));
					}
				}
			}
		}
		other => {
			let _ = writeln!(out, "{indent}{}", scalar(other));
		}
	}
}

fn scalar(value: &serde_json::Value) -> String {
	match value {
		serde_json::Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
