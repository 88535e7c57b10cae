//! Table observer for pretty-printing instrument registries.
//!
//! This module provides [`TableObserver`], which renders a [`Registry`] (or
//! every registry of an [`Instrumentation`]) as a formatted table using the
//! `tabled` crate. Columns follow the instrument kind's report columns.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! hedron-instrument = { version = "0.3", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use hedron_instrument::instrumentation::Instrumentation;
//! use hedron_instrument::observers::table::{TableObserver, TableStyle};
//!
//! let instruments = Instrumentation::new()?;
//! instruments.counter("requests").add(1000);
//! instruments.max_counter("in_flight").add(3);
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render(instruments.max_counters(), true));
//! // ╭───────────┬───────┬─────╮
//! // │ Name      │ count │ max │
//! // ├───────────┼───────┼─────┤
//! // │ in_flight │ 3     │ 3   │
//! // ╰───────────┴───────┴─────╯
//! ```

use tabled::{builder::Builder, settings::Style, Table};

use crate::instrumentation::Instrumentation;
use crate::registry::{Instrument, Registry};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

/// Configuration for the table observer.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// The style to use for rendering.
    pub style: TableStyle,
    /// Whether to show the header row.
    pub show_header: bool,
    /// Title printed above a single rendered registry. When unset the
    /// instrument kind is used.
    pub title: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            title: None,
        }
    }
}

/// An observer that renders instrument registries as tables.
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    config: TableConfig,
}

impl TableObserver {
    /// Creates a new table observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new table observer with the specified configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self { config }
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Sets whether to show the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    /// Sets the title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn build_table<I: Instrument>(&self, registry: &Registry<I>, exclude_unused: bool) -> Table {
        let mut builder = Builder::default();
        if self.config.show_header {
            builder.push_record(
                std::iter::once("Name".to_string())
                    .chain(I::COLUMNS.iter().map(|column| column.to_string())),
            );
        }
        for instrument in registry.instruments() {
            if exclude_unused && instrument.is_unused() {
                continue;
            }
            builder.push_record(
                std::iter::once(instrument.name().to_string()).chain(instrument.values()),
            );
        }

        let mut table = builder.build();
        self.apply_style(&mut table);
        table
    }

    /// Renders one registry, one row per instrument sorted by name.
    pub fn render<I: Instrument>(&self, registry: &Registry<I>, exclude_unused: bool) -> String {
        let title = self.config.title.as_deref().unwrap_or(I::KIND);
        format!("{}\n{}", title, self.build_table(registry, exclude_unused))
    }

    /// Renders every non-empty registry of `instrumentation`, each titled
    /// with its instrument kind.
    pub fn render_all(&self, instrumentation: &Instrumentation, exclude_unused: bool) -> String {
        let mut sections = Vec::new();
        self.push_section(&mut sections, instrumentation.counters(), exclude_unused);
        self.push_section(&mut sections, instrumentation.max_counters(), exclude_unused);
        self.push_section(&mut sections, instrumentation.counter_ranges(), exclude_unused);
        self.push_section(&mut sections, instrumentation.throughputs(), exclude_unused);
        self.push_section(&mut sections, instrumentation.timed_scopes(), exclude_unused);
        sections.join("\n\n")
    }

    fn push_section<I: Instrument>(
        &self,
        sections: &mut Vec<String>,
        registry: &Registry<I>,
        exclude_unused: bool,
    ) {
        let has_rows = registry
            .instruments()
            .iter()
            .any(|instrument| !(exclude_unused && instrument.is_unused()));
        if has_rows {
            let table = self.build_table(registry, exclude_unused);
            sections.push(format!("{}\n{}", I::KIND, table));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{Counter, MaxCounter};
    use crate::scheduler::SchedulerConfig;
    use crate::timed_scope::NoAlerts;

    #[test]
    fn test_render_empty_registry() {
        let registry: Registry<Counter> = Registry::new();
        let output = TableObserver::new().render(&registry, false);
        assert!(output.starts_with("Counter\n"));
        assert!(output.contains("Name"));
        assert!(output.contains("count"));
    }

    #[test]
    fn test_render_rows_sorted_by_name() {
        let registry: Registry<Counter> = Registry::new();
        registry.get_or_create_with("zeta", Counter::new).add(5);
        registry.get_or_create_with("alpha", Counter::new).add(1000);

        let output = TableObserver::new().render(&registry, false);
        let alpha = output.find("alpha").unwrap();
        let zeta = output.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(output.contains("1000"));
    }

    #[test]
    fn test_exclude_unused() {
        let registry: Registry<MaxCounter> = Registry::new();
        registry.get_or_create_with("busy", MaxCounter::new).add(2);
        registry.get_or_create_with("idle", MaxCounter::new);

        let output = TableObserver::new().render(&registry, true);
        assert!(output.contains("busy"));
        assert!(!output.contains("idle"));
        assert!(output.contains("max"));
    }

    #[test]
    fn test_without_header_and_custom_title() {
        let registry: Registry<Counter> = Registry::new();
        registry.get_or_create_with("requests", Counter::new).increment();

        let output = TableObserver::new()
            .with_header(false)
            .with_title("Traffic")
            .with_style(TableStyle::Ascii)
            .render(&registry, false);

        assert!(output.starts_with("Traffic\n"));
        assert!(!output.contains("Name"));
        assert!(output.contains('+'));
    }

    #[test]
    fn test_markdown_style() {
        let registry: Registry<Counter> = Registry::new();
        registry.get_or_create_with("requests", Counter::new).increment();

        let output = TableObserver::new()
            .with_style(TableStyle::Markdown)
            .render(&registry, false);
        assert!(output.contains('|'));
    }

    #[test]
    fn test_render_all_skips_empty_kinds() {
        let instruments = Instrumentation::builder()
            .scheduler_config(SchedulerConfig::new().worker_threads(1))
            .build()
            .unwrap();
        instruments.counter("requests").increment();
        instruments.timed_scope("handler").run(0, NoAlerts, || ());

        let output = TableObserver::new().render_all(&instruments, true);
        assert!(output.contains("Counter\n"));
        assert!(output.contains("TimedScope\n"));
        assert!(output.contains("avgMsecExcludingSlowest"));
        assert!(!output.contains("MaxCounter"));
        assert!(!output.contains("CounterRange"));
    }
}
