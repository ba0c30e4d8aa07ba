//! `reptracker order` command - record a received unit in one transaction

use chrono::NaiveDate;
use console::style;
use miette::{miette, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::cli::helpers::{date_arg, open_store, print_structured, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{insert_new_order, Config, DisplacerOrder, NewOrder};
use crate::entities::{Coldhead, ColdheadData, DisplacerData, TestData};

#[derive(clap::Args, Debug)]
pub struct OrderArgs {
    /// Read the whole order from a YAML or JSON file
    #[arg(long, conflicts_with_all = ["coldhead", "wip"])]
    pub file: Option<PathBuf>,

    /// Coldhead serial number
    #[arg(long, short = 'c', required_unless_present = "file")]
    pub coldhead: Option<String>,

    /// Coldhead status
    #[arg(long)]
    pub coldhead_status: Option<String>,

    /// WIP number (a placeholder number is allocated when omitted)
    #[arg(long, short = 'w')]
    pub wip: Option<String>,

    /// WIP status
    #[arg(long)]
    pub status: Option<String>,

    /// Arrival date (YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    pub arrival: Option<NaiveDate>,

    /// Displacer serial number
    #[arg(long, short = 'd', conflicts_with = "placeholder_displacer")]
    pub displacer: Option<String>,

    /// Allocate a placeholder displacer serial
    #[arg(long)]
    pub placeholder_displacer: bool,

    /// Record one test with this outcome
    #[arg(long)]
    pub pass_fail: Option<String>,

    /// Test mode
    #[arg(long)]
    pub mode: Option<String>,

    /// Test date (YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    pub test_date: Option<NaiveDate>,

    /// Test notes
    #[arg(long)]
    pub test_notes: Option<String>,
}

impl OrderArgs {
    fn to_order(&self) -> Result<NewOrder> {
        if let Some(path) = &self.file {
            return read_order(path);
        }

        let serial = self
            .coldhead
            .clone()
            .ok_or_else(|| miette!("--coldhead is required without --file"))?;
        let mut order = NewOrder::new(Coldhead {
            coldhead_id: None,
            serial_number: serial,
            data: ColdheadData {
                status: self.coldhead_status.clone(),
                notes: None,
            },
        });
        order.wip_number = self.wip.clone();
        order.wip.status = self.status.clone();
        order.wip.arrival_date = self.arrival;

        if self.displacer.is_some() || self.placeholder_displacer {
            order.displacer = Some(DisplacerOrder {
                displacer_serial_number: self.displacer.clone(),
                data: DisplacerData::default(),
            });
        }

        let test = TestData {
            pass_fail: self.pass_fail.clone(),
            mode: self.mode.clone(),
            test_date: self.test_date,
            notes: self.test_notes.clone(),
            ..TestData::default()
        };
        if !test.is_empty() {
            order.tests.push(test);
        }
        Ok(order)
    }
}

fn read_order(path: &Path) -> Result<NewOrder> {
    let contents = std::fs::read_to_string(path).into_diagnostic()?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&contents).into_diagnostic()
    } else {
        serde_yml::from_str(&contents).into_diagnostic()
    }
}

pub fn run(args: OrderArgs, global: &GlobalOpts, config: &Config) -> Result<()> {
    let order = args.to_order()?;
    let mut store = open_store(config)?;
    let receipt = insert_new_order(&mut store, &order)?;

    match global.format {
        OutputFormat::Yaml | OutputFormat::Json => print_structured(&receipt, global.format),
        _ => {
            success(
                global,
                format!(
                    "Recorded {} (coldhead {}{})",
                    style(&receipt.wip_number).cyan(),
                    style(&receipt.coldhead_serial_number).cyan(),
                    receipt
                        .displacer_serial_number
                        .as_ref()
                        .map(|d| format!(", displacer {}", style(d).cyan()))
                        .unwrap_or_default()
                ),
            );
            if !receipt.test_ids.is_empty() {
                success(global, format!("Added {} test(s)", receipt.test_ids.len()));
            }
            if global.quiet {
                println!("{}", receipt.wip_number);
            }
            Ok(())
        }
    }
}
