//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Scout CLI.

use crate::research::{EventPayload, StreamEvent, ToolStatus};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Scout banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "Scout".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   Scout v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Render one pipeline event.
    ///
    /// Text chunks are written inline without a newline so the report
    /// appears as it streams.
    pub fn event(&self, event: &StreamEvent) {
        match &event.payload {
            EventPayload::TextChunk { content, .. } => {
                print!("{}", content);
                io::stdout().flush().ok();
            }
            EventPayload::MessageComplete { .. } => println!("\n"),
            _ => {
                if let Some(line) = self.event_line(event) {
                    println!("{}", line);
                }
            }
        }
    }

    /// One status line for a non-text event, `None` for text events.
    pub fn event_line(&self, event: &StreamEvent) -> Option<String> {
        let seq = format!("[{:>3}]", event.sequence);
        let line = match &event.payload {
            EventPayload::StageStart { name, message, .. } => {
                if self.colored {
                    format!("  {} {} {}", seq.dimmed(), name.cyan().bold(), message)
                } else {
                    format!("  {} {} {}", seq, name, message)
                }
            }
            EventPayload::StageEnd {
                status, result, error, ..
            } => {
                let detail = result.as_deref().or(error.as_deref()).unwrap_or("");
                match (status, self.colored) {
                    (ToolStatus::Error, true) => {
                        format!("  {} {} {}", seq.dimmed(), "✗".red().bold(), detail.yellow())
                    }
                    (_, true) => format!("  {} {} {}", seq.dimmed(), "✓".green().bold(), detail),
                    (status, false) => format!("  {} [{}] {}", seq, status.as_str(), detail),
                }
            }
            EventPayload::PipelineEnd { session_id } => {
                if self.colored {
                    format!("  {} {} {}", seq.dimmed(), "done".bright_green().bold(), session_id.dimmed())
                } else {
                    format!("  {} [DONE] {}", seq, session_id)
                }
            }
            EventPayload::Error { code, message, .. } => {
                if self.colored {
                    format!("  {} {} {}", seq.dimmed(), code.red().bold(), message.red())
                } else {
                    format!("  {} [ERROR] {}: {}", seq, code, message)
                }
            }
            EventPayload::TextChunk { .. } | EventPayload::MessageComplete { .. } => return None,
        };
        Some(line)
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
