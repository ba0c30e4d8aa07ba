//! `reptracker coldhead` command - coldhead records

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{note, open_store, success};
use crate::cli::GlobalOpts;
use crate::core::order::{insert_coldhead, update_coldhead, upsert_coldhead};
use crate::core::Config;
use crate::entities::{Coldhead, ColdheadData};

#[derive(clap::Args, Debug, Clone)]
pub struct ColdheadFields {
    /// Status (free text, e.g. Active, Retired)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Notes
    #[arg(long, short = 'n')]
    pub notes: Option<String>,
}

impl ColdheadFields {
    fn to_data(&self) -> ColdheadData {
        ColdheadData {
            status: self.status.clone(),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ColdheadCommands {
    /// Add a coldhead (no-op when the serial is already known)
    Add {
        /// Serial number
        serial: String,

        /// Explicit coldhead id
        #[arg(long)]
        id: Option<i64>,

        #[command(flatten)]
        fields: ColdheadFields,
    },

    /// Insert a coldhead or overwrite the given fields of an existing one
    Upsert {
        /// Serial number
        serial: String,

        #[command(flatten)]
        fields: ColdheadFields,
    },

    /// Change fields of an existing coldhead
    Update {
        /// Serial number
        serial: String,

        #[command(flatten)]
        fields: ColdheadFields,
    },
}

pub fn run(cmd: ColdheadCommands, global: &GlobalOpts, config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    match cmd {
        ColdheadCommands::Add { serial, id, fields } => {
            let coldhead = Coldhead {
                coldhead_id: id,
                serial_number: serial,
                data: fields.to_data(),
            };
            let created = store.with_transaction(|s| insert_coldhead(s, &coldhead))?;
            if created {
                success(
                    global,
                    format!("Added coldhead {}", style(&coldhead.serial_number).cyan()),
                );
            } else {
                note(
                    global,
                    format!("Coldhead {} already exists", coldhead.serial_number),
                );
            }
        }
        ColdheadCommands::Upsert { serial, fields } => {
            let coldhead = Coldhead {
                coldhead_id: None,
                serial_number: serial,
                data: fields.to_data(),
            };
            store.with_transaction(|s| upsert_coldhead(s, &coldhead))?;
            success(
                global,
                format!("Saved coldhead {}", style(&coldhead.serial_number).cyan()),
            );
        }
        ColdheadCommands::Update { serial, fields } => {
            store.with_transaction(|s| update_coldhead(s, &serial, &fields.to_data()))?;
            success(global, format!("Updated coldhead {}", style(&serial).cyan()));
        }
    }
    Ok(())
}
