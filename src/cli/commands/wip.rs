//! `reptracker wip` command - WIP lots and placeholder numbers

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::{miette, Result};
use serde::Serialize;

use crate::cli::helpers::{date_arg, note, open_store, print_structured, success};
use crate::cli::table::{CellValue, ColumnDef, TableConfig, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::order::{get_wip, insert_wip, tests_for_wip, update_wip};
use crate::core::placeholder::{allocate_wip, next_wip_number, retire_placeholder};
use crate::core::Config;
use crate::entities::{TestAttempt, Wip, WipData, WipState};

const TEST_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("test_id", "TEST", 7),
    ColumnDef::new("attempt", "TRY", 5),
    ColumnDef::new("date", "DATE", 12),
    ColumnDef::new("result", "RESULT", 10),
    ColumnDef::new("mode", "MODE", 12),
    ColumnDef::new("notes", "NOTES", 30),
];

#[derive(clap::Args, Debug, Clone)]
pub struct WipFields {
    /// Coldhead serial number
    #[arg(long, short = 'c')]
    pub coldhead: Option<String>,

    /// Displacer serial number
    #[arg(long, short = 'd')]
    pub displacer: Option<String>,

    /// Arrival date (YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    pub arrival: Option<NaiveDate>,

    /// Teardown date (YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    pub teardown: Option<NaiveDate>,

    /// Status
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Mark active or inactive
    #[arg(long)]
    pub active: Option<bool>,
}

impl WipFields {
    fn to_data(&self) -> WipData {
        WipData {
            coldhead_serial_number: self.coldhead.clone(),
            displacer_serial_number: self.displacer.clone(),
            arrival_date: self.arrival,
            teardown_date: self.teardown,
            status: self.status.clone(),
            is_active: self.active,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum WipCommands {
    /// Add a WIP with an explicit number (no-op when it exists)
    Add {
        /// WIP number
        wip: String,

        #[command(flatten)]
        fields: WipFields,
    },

    /// Change fields of an existing WIP
    Update {
        /// WIP number
        wip: String,

        #[command(flatten)]
        fields: WipFields,
    },

    /// Print the next unused WIP number without allocating it
    Next,

    /// Allocate a placeholder WIP number (reusing a retired one when possible)
    Placeholder,

    /// Return an unused placeholder WIP to the reuse pool
    Retire {
        /// WIP number
        wip: String,
    },

    /// Show a WIP with its lifecycle state and tests
    Show {
        /// WIP number
        wip: String,
    },
}

#[derive(Serialize)]
struct WipDetail {
    #[serde(flatten)]
    wip: Wip,
    state: WipState,
    tests: Vec<TestAttempt>,
}

pub fn run(cmd: WipCommands, global: &GlobalOpts, config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    match cmd {
        WipCommands::Add { wip, fields } => {
            let record = Wip {
                wip_number: wip,
                data: fields.to_data(),
            };
            if store.with_transaction(|s| insert_wip(s, &record))? {
                success(global, format!("Added WIP {}", style(&record.wip_number).cyan()));
            } else {
                note(global, format!("WIP {} already exists", record.wip_number));
            }
        }
        WipCommands::Update { wip, fields } => {
            store.with_transaction(|s| update_wip(s, &wip, &fields.to_data()))?;
            success(global, format!("Updated WIP {}", style(&wip).cyan()));
        }
        WipCommands::Next => {
            println!("{}", next_wip_number(&store.session())?);
        }
        WipCommands::Placeholder => {
            let wip_number = store.with_transaction(allocate_wip)?;
            if global.quiet {
                println!("{}", wip_number);
            } else {
                success(
                    global,
                    format!("Allocated placeholder WIP {}", style(&wip_number).cyan()),
                );
            }
        }
        WipCommands::Retire { wip } => {
            store.with_transaction(|s| retire_placeholder(s, &wip))?;
            success(global, format!("Retired placeholder WIP {}", style(&wip).cyan()));
        }
        WipCommands::Show { wip } => {
            let session = store.session();
            let record = get_wip(&session, &wip)?
                .ok_or_else(|| miette!("WIP '{}' does not exist", wip))?;
            let detail = WipDetail {
                state: record.state(),
                tests: tests_for_wip(&session, &wip)?,
                wip: record,
            };
            show_detail(&detail, global)?;
        }
    }
    Ok(())
}

fn show_detail(detail: &WipDetail, global: &GlobalOpts) -> Result<()> {
    match global.format {
        OutputFormat::Auto | OutputFormat::Yaml | OutputFormat::Json => {
            print_structured(detail, global.format)
        }
        format => {
            let data = &detail.wip.data;
            if !global.quiet {
                println!("{}", style("─".repeat(60)).dim());
                println!(
                    "{}: {}  {}",
                    style("WIP").bold(),
                    style(&detail.wip.wip_number).cyan(),
                    style(detail.state).yellow()
                );
                println!(
                    "{}: {}",
                    style("Coldhead").bold(),
                    data.coldhead_serial_number.as_deref().unwrap_or("-")
                );
                println!(
                    "{}: {}",
                    style("Displacer").bold(),
                    data.displacer_serial_number.as_deref().unwrap_or("-")
                );
                println!(
                    "{}: {}",
                    style("Status").bold(),
                    data.status.as_deref().unwrap_or("-")
                );
                println!("{}", style("─".repeat(60)).dim());
            }
            if detail.tests.is_empty() {
                note(global, "No tests recorded");
                return Ok(());
            }
            let rows: Vec<TableRow> = detail
                .tests
                .iter()
                .map(|test| {
                    TableRow::new()
                        .cell("test_id", CellValue::Number(test.test_id))
                        .cell("attempt", CellValue::number(test.data.test_attempt))
                        .cell("date", CellValue::date(test.data.test_date))
                        .cell("result", CellValue::verdict(test.data.pass_fail.as_deref()))
                        .cell("mode", CellValue::text(test.data.mode.as_deref()))
                        .cell("notes", CellValue::text(test.data.notes.as_deref()))
                })
                .collect();
            TableFormatter::new(TEST_COLUMNS, "test")
                .with_config(TableConfig::for_pipe())
                .output(&rows, format)
        }
    }
}
