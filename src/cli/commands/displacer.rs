//! `reptracker displacer` command - displacer records and placeholder serials

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{date_arg, note, open_store, success};
use crate::cli::GlobalOpts;
use crate::core::order::{insert_displacer, update_displacer, upsert_displacer};
use crate::core::placeholder::{allocate_displacer, next_displacer_serial};
use crate::core::Config;
use crate::entities::{Displacer, DisplacerData};

#[derive(clap::Args, Debug, Clone)]
pub struct DisplacerFields {
    /// Status
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Notes
    #[arg(long, short = 'n')]
    pub notes: Option<String>,

    /// Date the displacer was first opened (YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    pub opened: Option<NaiveDate>,

    /// Mark active or inactive
    #[arg(long)]
    pub active: Option<bool>,
}

impl DisplacerFields {
    fn to_data(&self) -> DisplacerData {
        DisplacerData {
            status: self.status.clone(),
            notes: self.notes.clone(),
            initial_open_date: self.opened,
            is_active: self.active,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum DisplacerCommands {
    /// Add a displacer (no-op when the serial is already known)
    Add {
        /// Displacer serial number
        serial: String,

        #[command(flatten)]
        fields: DisplacerFields,
    },

    /// Insert a displacer or overwrite the given fields of an existing one
    Upsert {
        /// Displacer serial number
        serial: String,

        #[command(flatten)]
        fields: DisplacerFields,
    },

    /// Change fields of an existing displacer
    Update {
        /// Displacer serial number
        serial: String,

        #[command(flatten)]
        fields: DisplacerFields,
    },

    /// Print the next free placeholder serial without allocating it
    Next,

    /// Allocate a placeholder displacer serial
    Placeholder,
}

pub fn run(cmd: DisplacerCommands, global: &GlobalOpts, config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    match cmd {
        DisplacerCommands::Add { serial, fields } => {
            let displacer = Displacer {
                displacer_serial_number: serial,
                data: fields.to_data(),
            };
            if store.with_transaction(|s| insert_displacer(s, &displacer))? {
                success(
                    global,
                    format!(
                        "Added displacer {}",
                        style(&displacer.displacer_serial_number).cyan()
                    ),
                );
            } else {
                note(
                    global,
                    format!(
                        "Displacer {} already exists",
                        displacer.displacer_serial_number
                    ),
                );
            }
        }
        DisplacerCommands::Upsert { serial, fields } => {
            let displacer = Displacer {
                displacer_serial_number: serial,
                data: fields.to_data(),
            };
            store.with_transaction(|s| upsert_displacer(s, &displacer))?;
            success(
                global,
                format!(
                    "Saved displacer {}",
                    style(&displacer.displacer_serial_number).cyan()
                ),
            );
        }
        DisplacerCommands::Update { serial, fields } => {
            store.with_transaction(|s| update_displacer(s, &serial, &fields.to_data()))?;
            success(global, format!("Updated displacer {}", style(&serial).cyan()));
        }
        DisplacerCommands::Next => {
            let serial = next_displacer_serial(&store.session())?;
            println!("{}", serial);
        }
        DisplacerCommands::Placeholder => {
            let serial = store.with_transaction(allocate_displacer)?;
            if global.quiet {
                println!("{}", serial);
            } else {
                success(
                    global,
                    format!("Allocated placeholder displacer {}", style(&serial).cyan()),
                );
            }
        }
    }
    Ok(())
}
