//! Table formatting utilities for CLI list output
//!
//! Commands describe their columns once with [`ColumnDef`] and build one
//! [`TableRow`] per record; [`TableFormatter`] renders the rows as aligned
//! text, CSV or a markdown table.

use chrono::NaiveDate;
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;
use crate::core::placeholder::PLACEHOLDER_STATUS;

/// Configuration for table output
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Show summary line after table (e.g., "5 WIP(s) found")
    pub show_summary: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { show_summary: true }
    }
}

impl TableConfig {
    /// Create config optimized for piping (no summary)
    pub fn for_pipe() -> Self {
        Self {
            show_summary: false,
        }
    }
}

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// WIP number or serial number (cyan)
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Free-text lifecycle status; placeholders are dimmed
    Status(String),
    /// Test outcome (pass=green, fail=red)
    Verdict(String),
    Date(NaiveDate),
    Number(i64),
    /// Float value with precision
    Float(f64, usize),
    /// Displayed as "-"
    Empty,
}

impl CellValue {
    pub fn text(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Text(v.to_string()))
    }

    pub fn id(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Id(v.to_string()))
    }

    pub fn status(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Status(v.to_string()))
    }

    pub fn verdict(value: Option<&str>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Verdict(v.to_string()))
    }

    pub fn date(value: Option<NaiveDate>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Date)
    }

    pub fn number(value: Option<i64>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Number)
    }

    pub fn float(value: Option<f64>) -> Self {
        value.map_or(CellValue::Empty, |v| CellValue::Float(v, 2))
    }

    /// Format for aligned text output (with colors if terminal)
    pub fn format_tsv(&self, width: usize) -> String {
        let text = truncate_str(&self.raw(), width.saturating_sub(1).max(1));
        // Pad on the visible text; ANSI codes would throw off `{:<width$}`
        let padding = " ".repeat(width.saturating_sub(text.chars().count()));
        let styled = match self {
            CellValue::Id(_) => style(text).cyan(),
            CellValue::Status(s) if s == PLACEHOLDER_STATUS => style(text).dim(),
            CellValue::Verdict(v) => match v.to_ascii_lowercase().as_str() {
                "pass" | "passed" => style(text).green(),
                "fail" | "failed" => style(text).red().bold(),
                _ => style(text).yellow(),
            },
            CellValue::Empty => style(text).dim(),
            _ => style(text),
        };
        format!("{}{}", styled, padding)
    }

    /// Unstyled cell text, as used by CSV and markdown output
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) | CellValue::Status(s) | CellValue::Verdict(s) => {
                s.clone()
            }
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Float(f, precision) => format!("{:.*}", precision, f),
            CellValue::Empty => "-".to_string(),
        }
    }

    pub fn display_width(&self) -> usize {
        self.raw().chars().count()
    }
}

/// Column definition: key, header and maximum width
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// One output row, cells addressed by column key
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    fn value(&self, key: &str) -> CellValue {
        self.get(key).cloned().unwrap_or(CellValue::Empty)
    }
}

/// Table formatter that outputs rows in various formats
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    config: TableConfig,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            config: TableConfig::default(),
        }
    }

    /// Configure the formatter with custom settings
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Output rows in the specified format
    pub fn output(&self, rows: &[TableRow], format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Csv => self.output_csv(rows),
            OutputFormat::Md => {
                println!("{}", self.render_md(rows));
                Ok(())
            }
            _ => {
                self.output_tsv(rows);
                Ok(())
            }
        }
    }

    /// Calculate dynamic column widths based on actual content
    fn calculate_widths(&self, rows: &[TableRow]) -> Vec<usize> {
        self.columns
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                col.header
                    .len()
                    .max(max_content + 2)
                    .min(col.width)
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow]) {
        let widths = self.calculate_widths(rows);

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                format!(
                    "{}{}",
                    style(col.header).bold(),
                    " ".repeat(w.saturating_sub(col.header.len()))
                )
            })
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            let parts: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(col, w)| row.value(col.key).format_tsv(*w))
                .collect();
            println!("{}", parts.join(" ").trim_end());
        }

        if self.config.show_summary {
            println!();
            println!("{} {}(s) found.", style(rows.len()).cyan(), self.entity_name);
        }
    }

    fn output_csv(&self, rows: &[TableRow]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer
            .write_record(self.columns.iter().map(|c| c.key))
            .into_diagnostic()?;
        for row in rows {
            writer
                .write_record(self.columns.iter().map(|c| match row.value(c.key) {
                    CellValue::Empty => String::new(),
                    value => value.raw(),
                }))
                .into_diagnostic()?;
        }
        writer.flush().into_diagnostic()?;
        Ok(())
    }

    /// Markdown table via tabled
    pub fn render_md(&self, rows: &[TableRow]) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
        for row in rows {
            builder.push_record(self.columns.iter().map(|c| row.value(c.key).raw()));
        }
        builder.build().with(Style::markdown()).to_string()
    }
}
