//! UQM development CLI.
//!
//! Drives the core operations against a JSON snapshot file so a local
//! operator can walk tickets through their lifecycle without running the
//! server. State is loaded before and saved after every mutating command;
//! nothing is written when an operation fails.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use uqm_core::{
    config::{load_journey_catalogue, resolve_journey_file},
    AssignmentResolver, BankTicketEngine, CoreConfig, JourneyCatalogue, JourneyEngine,
    QueueResult, Reporting, Snapshot, StoreSet, SystemClock, DEFAULT_CAS_RETRY_LIMIT,
};
use uqm_types::{BranchCode, DepartmentName};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "uqm")]
#[command(about = "UQM queue management CLI")]
struct Cli {
    /// Snapshot file holding the record store between invocations
    #[arg(long, env = "UQM_DATA_FILE", default_value = "uqm-data.json")]
    data: PathBuf,

    /// Journey catalogue override (defaults to searching for journeys.yaml)
    #[arg(long, env = "UQM_JOURNEYS_FILE")]
    journeys: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PayerArg {
    Cash,
    Insurance,
}

impl From<PayerArg> for uqm_core::PayerType {
    fn from(payer: PayerArg) -> Self {
        match payer {
            PayerArg::Cash => uqm_core::PayerType::Cash,
            PayerArg::Insurance => uqm_core::PayerType::Insurance,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a bank ticket
    Issue {
        /// Service queue id
        queue_id: Uuid,
        /// Branch code
        branch: String,
    },
    /// Assign a ticket to a counter (start or resume serving)
    Assign {
        ticket_id: Uuid,
        counter_id: Uuid,
    },
    /// Put a serving ticket on hold
    Hold { ticket_id: Uuid },
    /// Complete service for a ticket
    Serve { ticket_id: Uuid },
    /// Register a counter for a branch for today
    OpenCounter {
        branch: String,
        counter_number: u32,
        user_id: Uuid,
        queue_id: Uuid,
    },
    /// List today's available counters for a branch
    Counters { branch: String },
    /// Today's served-ticket statistics for a branch
    Summary { branch: String },
    /// Admit a patient onto a journey
    Admit {
        journey_id: String,
        #[arg(value_enum)]
        payer: PayerArg,
    },
    /// Enter a department (idempotent if already open there)
    Enter {
        ticket_id: Uuid,
        department: String,
    },
    /// Assign a room to the open visit in a department
    Room {
        ticket_id: Uuid,
        department: String,
        room_id: Uuid,
    },
    /// Clear a cash payment for the open visit in a department
    Pay {
        ticket_id: Uuid,
        department: String,
    },
    /// Close the current visit and move the journey forward
    Advance { ticket_id: Uuid },
    /// Mark a journey ticket as a no-show
    NoShow { ticket_id: Uuid },
    /// Upsert the room owned by a staff member
    RoomStaff {
        staff_id: Uuid,
        department: String,
        room_number: u32,
    },
    /// Journey outcome counts
    Outcomes,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let stores = StoreSet::from_snapshot(Snapshot::load(&cli.data)?)?;
    let clock = Arc::new(SystemClock);

    // Bank commands never consult the catalogue, so they work with an empty
    // one; hospital commands resolve the real file.
    let with_catalogue = |catalogue: JourneyCatalogue| -> QueueResult<Arc<CoreConfig>> {
        Ok(Arc::new(CoreConfig::new(
            catalogue,
            DEFAULT_CAS_RETRY_LIMIT,
        )?))
    };
    let hospital_cfg = || -> QueueResult<Arc<CoreConfig>> {
        let file = resolve_journey_file(cli.journeys.clone())?;
        with_catalogue(load_journey_catalogue(&file)?)
    };

    let bank = || -> QueueResult<BankTicketEngine> {
        Ok(BankTicketEngine::new(
            stores.bank_tickets.clone(),
            stores.counters.clone(),
            stores.sequences.clone(),
            clock.clone(),
            with_catalogue(JourneyCatalogue::default())?,
        ))
    };
    let journeys = || -> QueueResult<JourneyEngine> {
        Ok(JourneyEngine::new(
            stores.hospital_tickets.clone(),
            clock.clone(),
            hospital_cfg()?,
        ))
    };
    let resolver = AssignmentResolver::new(stores.counters.clone(), stores.rooms.clone(), clock.clone());
    let reporting = Reporting::new(
        stores.bank_tickets.clone(),
        stores.hospital_tickets.clone(),
        clock.clone(),
    );

    let save = |stores: &StoreSet| -> QueueResult<()> { stores.to_snapshot()?.save(&cli.data) };

    match &cli.command {
        Commands::Issue { queue_id, branch } => {
            match bank()?.issue(*queue_id, BranchCode::new(branch)?) {
                Ok(ticket) => {
                    save(&stores)?;
                    println!("Issued ticket {} (id: {})", ticket.ticket_number, ticket.id);
                }
                Err(e) => eprintln!("Error issuing ticket: {}", e),
            }
        }
        Commands::Assign {
            ticket_id,
            counter_id,
        } => match bank()?.assign_to_counter(*ticket_id, *counter_id) {
            Ok(ticket) => {
                save(&stores)?;
                println!(
                    "Ticket {} now serving at counter {} (waited {}s)",
                    ticket.ticket_number,
                    counter_id,
                    ticket.not_served_secs
                );
            }
            Err(e) => eprintln!("Error assigning ticket: {}", e),
        },
        Commands::Hold { ticket_id } => match bank()?.hold(*ticket_id) {
            Ok(ticket) => {
                save(&stores)?;
                println!(
                    "Ticket {} on hold (served {}s so far)",
                    ticket.ticket_number, ticket.serving_secs
                );
            }
            Err(e) => eprintln!("Error holding ticket: {}", e),
        },
        Commands::Serve { ticket_id } => match bank()?.serve(*ticket_id) {
            Ok(ticket) => {
                save(&stores)?;
                println!(
                    "Ticket {} served: waited {}s, serving {}s, hold {}s, total {}s",
                    ticket.ticket_number,
                    ticket.not_served_secs,
                    ticket.serving_secs,
                    ticket.hold_secs,
                    ticket.total_secs.unwrap_or_default()
                );
            }
            Err(e) => eprintln!("Error serving ticket: {}", e),
        },
        Commands::OpenCounter {
            branch,
            counter_number,
            user_id,
            queue_id,
        } => match resolver.open_counter(
            BranchCode::new(branch)?,
            *counter_number,
            *user_id,
            *queue_id,
        ) {
            Ok(counter) => {
                save(&stores)?;
                println!("Opened counter {} (id: {})", counter.counter_number, counter.id);
            }
            Err(e) => eprintln!("Error opening counter: {}", e),
        },
        Commands::Counters { branch } => {
            let counters = resolver.find_available_counters(&BranchCode::new(branch)?)?;
            if counters.is_empty() {
                println!("No available counters at {}.", branch);
            } else {
                for counter in counters {
                    println!(
                        "Counter {}: id {}, teller {}",
                        counter.counter_number, counter.id, counter.user_id
                    );
                }
            }
        }
        Commands::Summary { branch } => {
            let summary = reporting.branch_day_summary(&BranchCode::new(branch)?)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Admit { journey_id, payer } => {
            match journeys()?.admit(journey_id, (*payer).into()) {
                Ok(ticket) => {
                    save(&stores)?;
                    println!(
                        "Admitted ticket {} on journey {} (first department: {})",
                        ticket.id, ticket.journey_id, ticket.department_history[0].department
                    );
                }
                Err(e) => eprintln!("Error admitting ticket: {}", e),
            }
        }
        Commands::Enter {
            ticket_id,
            department,
        } => match journeys()?.enter_department(*ticket_id, DepartmentName::new(department)?) {
            Ok(ticket) => {
                save(&stores)?;
                println!(
                    "Ticket {} has {} history entries",
                    ticket.id,
                    ticket.department_history.len()
                );
            }
            Err(e) => eprintln!("Error entering department: {}", e),
        },
        Commands::Room {
            ticket_id,
            department,
            room_id,
        } => match journeys()?.assign_room(*ticket_id, &DepartmentName::new(department)?, *room_id)
        {
            Ok(_) => {
                save(&stores)?;
                println!("Assigned room {} for {}", room_id, department);
            }
            Err(e) => eprintln!("Error assigning room: {}", e),
        },
        Commands::Pay {
            ticket_id,
            department,
        } => match journeys()?.clear_payment(*ticket_id, &DepartmentName::new(department)?) {
            Ok(_) => {
                save(&stores)?;
                println!("Cleared payment for {}", department);
            }
            Err(e) => eprintln!("Error clearing payment: {}", e),
        },
        Commands::Advance { ticket_id } => match journeys()?.advance(*ticket_id) {
            Ok(ticket) => {
                save(&stores)?;
                if ticket.completed {
                    println!("Ticket {} completed its journey", ticket.id);
                } else {
                    println!("Ticket {} advanced to step {}", ticket.id, ticket.current_step);
                }
            }
            Err(e) => eprintln!("Error advancing ticket: {}", e),
        },
        Commands::NoShow { ticket_id } => match journeys()?.mark_no_show(*ticket_id) {
            Ok(ticket) => {
                save(&stores)?;
                println!("Ticket {} marked as no-show", ticket.id);
            }
            Err(e) => eprintln!("Error marking no-show: {}", e),
        },
        Commands::RoomStaff {
            staff_id,
            department,
            room_number,
        } => match resolver.assign_room_to_staff(
            *staff_id,
            DepartmentName::new(department)?,
            *room_number,
        ) {
            Ok(room) => {
                save(&stores)?;
                println!(
                    "Staff {} now owns room {} in {}",
                    room.staff_id, room.room_number, room.department
                );
            }
            Err(e) => eprintln!("Error assigning room: {}", e),
        },
        Commands::Outcomes => {
            let outcomes = reporting.journey_outcomes()?;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
    }

    Ok(())
}
