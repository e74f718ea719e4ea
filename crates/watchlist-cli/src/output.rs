use clap::ValueEnum;
use comfy_table::{presets, modifiers, Table};
use owo_colors::OwoColorize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn message(&self, kind: &str, marker: String, msg: &str) {
        match self.format {
            OutputFormat::Human if marker.is_empty() => println!("{}", msg),
            OutputFormat::Human => println!("{} {}", marker, msg),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": kind, "message": msg }));
            }
        }
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        self.message("success", "✓".green().to_string(), msg.as_ref());
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        // Errors are shown even in quiet mode
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", "✗".red(), msg.as_ref()),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": "error", "message": msg.as_ref() }));
            }
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        self.message("info", String::new(), msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        self.message("warning", "⚠".yellow().to_string(), msg.as_ref());
    }

    /// Human-mode only text such as headers and blank lines
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.quiet || !self.is_human() {
            return;
        }
        println!("{}", msg.as_ref());
    }

    /// Render a table in the shared style (human mode only)
    pub fn table(&self, mut table: Table) {
        if self.quiet || !self.is_human() {
            return;
        }
        table.load_preset(presets::UTF8_FULL);
        table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
        println!("{}", table);
    }

    pub fn json(&self, data: &serde_json::Value) {
        if self.quiet && !self.is_human() {
            return;
        }
        self.print_json(data);
    }

    fn print_json(&self, data: &serde_json::Value) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(data).unwrap_or_default()),
            OutputFormat::JsonPretty => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default())
            }
            OutputFormat::Human => println!("{}", data),
        }
    }
}
