//! Stdout rendering for `--output table|json|json-compact|plain`.
//!
//! Tag tables go through `tabled`, JSON through serde, and `plain` prints
//! one EPC (or other key) per line for piping into scripts.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color ────────────────────────────────────────────────────────────

/// Whether notices on stderr should be colored.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Rendering ────────────────────────────────────────────────────────

/// Render a collection. Tables use `to_row`; `plain` prints one `key_fn`
/// value per line. An empty collection renders as nothing in both.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    key_fn: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
    R: Tabled,
{
    if let Some(structured) = render_structured(format, data) {
        return structured;
    }
    if data.is_empty() {
        return String::new();
    }
    match format {
        OutputFormat::Plain => data.iter().map(key_fn).collect::<Vec<_>>().join("\n"),
        _ => Table::new(data.iter().map(to_row))
            .with(Style::rounded())
            .to_string(),
    }
}

/// Render one value. Tables use the hand-formatted `detail_fn` view.
pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    key_fn: impl Fn(&T) -> String,
) -> String {
    render_structured(format, data).unwrap_or_else(|| match format {
        OutputFormat::Plain => key_fn(data),
        _ => detail_fn(data),
    })
}

/// Write to stdout unless `--quiet` or there is nothing to show.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// JSON renderings; `None` for the human formats.
fn render_structured<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Option<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data),
        OutputFormat::JsonCompact => serde_json::to_string(data),
        OutputFormat::Table | OutputFormat::Plain => return None,
    };
    Some(rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}")))
}
