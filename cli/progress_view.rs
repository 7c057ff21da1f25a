use colored::Colorize;
use std::io::Write;

const BAR_WIDTH: usize = 30;

/// Redraws a single progress line on stderr.
pub struct ProgressView {
	last_line_len: usize,
	finished: bool,
}

impl ProgressView {
	pub fn new() -> ProgressView {
		ProgressView {
			last_line_len: 0,
			finished: false,
		}
	}

	pub fn update(&mut self, percent: f64, message: &str) {
		let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
		let filled = filled.min(BAR_WIDTH);
		let bar = format!(
			"{}{}",
			"=".repeat(filled),
			" ".repeat(BAR_WIDTH - filled)
		);
		let line = format!("[{}] {:>5.1}% {}", bar, percent, message);
		let padding = self.last_line_len.saturating_sub(line.len());
		let mut stderr = std::io::stderr();
		let _ = write!(stderr, "\r{}{}", line.cyan(), " ".repeat(padding));
		let _ = stderr.flush();
		self.last_line_len = line.len();
		if percent >= 100.0 {
			self.finish();
		}
	}

	fn finish(&mut self) {
		if !self.finished && self.last_line_len > 0 {
			eprintln!();
		}
		self.finished = true;
	}
}

impl Drop for ProgressView {
	fn drop(&mut self) {
		self.finish();
	}
}
