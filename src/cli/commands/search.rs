//! `reptracker search` command - find WIPs and their tests

use miette::Result;

use crate::cli::helpers::{note, open_store, print_structured};
use crate::cli::table::{CellValue, ColumnDef, TableConfig, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{flexible_search, Config, SearchCriteria, SearchResults};

const WIP_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("wip", "WIP", 12),
    ColumnDef::new("coldhead", "COLDHEAD", 16),
    ColumnDef::new("displacer", "DISPLACER", 16),
    ColumnDef::new("status", "STATUS", 16),
    ColumnDef::new("arrival", "ARRIVAL", 12),
    ColumnDef::new("teardown", "TEARDOWN", 12),
    ColumnDef::new("tests", "TESTS", 7),
    ColumnDef::new("last", "LAST", 10),
];

const TEST_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("wip", "WIP", 12),
    ColumnDef::new("coldhead", "COLDHEAD", 16),
    ColumnDef::new("displacer", "DISPLACER", 16),
    ColumnDef::new("test_id", "TEST", 7),
    ColumnDef::new("attempt", "TRY", 5),
    ColumnDef::new("date", "DATE", 12),
    ColumnDef::new("result", "RESULT", 10),
    ColumnDef::new("mode", "MODE", 12),
    ColumnDef::new("eff1", "EFF1", 8),
    ColumnDef::new("eff2", "EFF2", 8),
];

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Serial number matching either a coldhead or a displacer
    pub serial: Option<String>,

    /// Coldhead serial number
    #[arg(long, short = 'c')]
    pub coldhead: Option<String>,

    /// WIP number
    #[arg(long, short = 'w')]
    pub wip: Option<String>,

    /// Displacer serial number
    #[arg(long, short = 'd')]
    pub displacer: Option<String>,

    /// Test id
    #[arg(long)]
    pub test_id: Option<i64>,

    /// Include inactive placeholder WIPs
    #[arg(long)]
    pub all: bool,

    /// One row per test instead of one row per WIP
    #[arg(long)]
    pub tests: bool,
}

impl SearchArgs {
    fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            coldhead_serial: self.coldhead.clone(),
            wip_number: self.wip.clone(),
            displacer_serial: self.displacer.clone(),
            test_id: self.test_id,
            serial_number: self.serial.clone(),
            include_inactive: self.all,
        }
    }
}

pub fn run(args: SearchArgs, global: &GlobalOpts, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let results = flexible_search(&store.session(), &args.criteria())?;

    match global.format {
        OutputFormat::Yaml | OutputFormat::Json => print_structured(&results, global.format),
        format => {
            if results.is_empty() {
                note(global, "No matching WIPs");
                return Ok(());
            }
            let table_config = if global.quiet || format == OutputFormat::Tsv {
                TableConfig::for_pipe()
            } else {
                TableConfig::default()
            };
            if args.tests {
                TableFormatter::new(TEST_COLUMNS, "test")
                    .with_config(table_config)
                    .output(&test_rows(&results), format)
            } else {
                TableFormatter::new(WIP_COLUMNS, "WIP")
                    .with_config(table_config)
                    .output(&wip_rows(&results), format)
            }
        }
    }
}

fn wip_rows(results: &SearchResults) -> Vec<TableRow> {
    results
        .iter()
        .map(|record| {
            let last = record.tests.last().and_then(|t| t.pass_fail.as_deref());
            TableRow::new()
                .cell("wip", CellValue::Id(record.wip_number.clone()))
                .cell("coldhead", CellValue::id(record.coldhead_serial_number.as_deref()))
                .cell("displacer", CellValue::id(record.displacer_serial_number.as_deref()))
                .cell("status", CellValue::status(record.wip_status.as_deref()))
                .cell("arrival", CellValue::date(record.arrival_date))
                .cell("teardown", CellValue::date(record.teardown_date))
                .cell("tests", CellValue::Number(record.tests.len() as i64))
                .cell("last", CellValue::verdict(last))
        })
        .collect()
}

fn test_rows(results: &SearchResults) -> Vec<TableRow> {
    results
        .iter()
        .flat_map(|record| {
            record.tests.iter().map(move |test| {
                TableRow::new()
                    .cell("wip", CellValue::Id(record.wip_number.clone()))
                    .cell("coldhead", CellValue::id(record.coldhead_serial_number.as_deref()))
                    .cell("displacer", CellValue::id(record.displacer_serial_number.as_deref()))
                    .cell("test_id", CellValue::Number(test.test_id))
                    .cell("attempt", CellValue::number(test.test_attempt))
                    .cell("date", CellValue::date(test.test_date))
                    .cell("result", CellValue::verdict(test.pass_fail.as_deref()))
                    .cell("mode", CellValue::text(test.mode.as_deref()))
                    .cell("eff1", CellValue::float(test.efficiency1))
                    .cell("eff2", CellValue::float(test.efficiency2))
            })
        })
        .collect()
}
