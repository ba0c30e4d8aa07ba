//! `reptracker test` command - test attempts recorded against a WIP

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{date_arg, open_store, success};
use crate::cli::GlobalOpts;
use crate::core::order::{insert_test, update_test};
use crate::core::Config;
use crate::entities::TestData;

#[derive(clap::Args, Debug, Clone)]
pub struct TestFields {
    /// Outcome (e.g. Pass, Fail)
    #[arg(long, short = 'r')]
    pub pass_fail: Option<String>,

    /// Test mode
    #[arg(long, short = 'm')]
    pub mode: Option<String>,

    /// Notes
    #[arg(long, short = 'n')]
    pub notes: Option<String>,

    /// Test date (YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    pub date: Option<NaiveDate>,

    /// Attempt number (defaults to the next attempt for the WIP)
    #[arg(long)]
    pub attempt: Option<i64>,

    /// Turns
    #[arg(long)]
    pub turns: Option<i64>,

    /// First stage heater power
    #[arg(long)]
    pub first_stage_heaters: Option<f64>,

    /// Second stage heater power
    #[arg(long)]
    pub second_stage_heater: Option<f64>,

    /// First stage temperature
    #[arg(long)]
    pub first_stage_temp: Option<f64>,

    /// Second stage temperature
    #[arg(long)]
    pub second_stage_temp: Option<f64>,

    /// Efficiency, first stage
    #[arg(long)]
    pub efficiency1: Option<f64>,

    /// Efficiency, second stage
    #[arg(long)]
    pub efficiency2: Option<f64>,

    /// Coldhead serial (defaults to the WIP's coldhead)
    #[arg(long, short = 'c')]
    pub coldhead: Option<String>,

    /// Displacer serial (defaults to the WIP's displacer)
    #[arg(long, short = 'd')]
    pub displacer: Option<String>,
}

impl TestFields {
    fn to_data(&self) -> TestData {
        TestData {
            coldhead_serial_number: self.coldhead.clone(),
            displacer_serial_number: self.displacer.clone(),
            test_date: self.date,
            test_attempt: self.attempt,
            pass_fail: self.pass_fail.clone(),
            notes: self.notes.clone(),
            mode: self.mode.clone(),
            turns: self.turns,
            first_stage_heaters: self.first_stage_heaters,
            second_stage_heater: self.second_stage_heater,
            first_stage_temp: self.first_stage_temp,
            second_stage_temp: self.second_stage_temp,
            efficiency1: self.efficiency1,
            efficiency2: self.efficiency2,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TestCommands {
    /// Record a test attempt under an existing WIP
    Add {
        /// WIP number
        wip: String,

        #[command(flatten)]
        fields: TestFields,
    },

    /// Change fields of a recorded test
    Update {
        /// Test id
        test_id: i64,

        #[command(flatten)]
        fields: TestFields,
    },
}

pub fn run(cmd: TestCommands, global: &GlobalOpts, config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    match cmd {
        TestCommands::Add { wip, fields } => {
            let data = fields.to_data();
            let test_id = store.with_transaction(|s| insert_test(s, &wip, &data))?;
            if global.quiet {
                println!("{}", test_id);
            } else {
                success(
                    global,
                    format!(
                        "Added test {} to WIP {}",
                        style(test_id).cyan(),
                        style(&wip).cyan()
                    ),
                );
            }
        }
        TestCommands::Update { test_id, fields } => {
            store.with_transaction(|s| update_test(s, test_id, &fields.to_data()))?;
            success(global, format!("Updated test {}", style(test_id).cyan()));
        }
    }
    Ok(())
}
