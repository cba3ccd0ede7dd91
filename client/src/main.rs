use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vax_client::{
    api_client::{ApiClient, ApiResponse, Paged},
    chain::{ChainRecordClient, HttpRpcClient},
    config::Config,
    history::{self, HistoryRow, HistoryView},
    orchestrator::{AppointmentOrchestrator, BookingRequest},
    wallet,
};
use solana_sdk::signature::Signer;
use vax_common::{lamports_as_sol_string, Pubkey, VaccinationRecord};

#[derive(Parser)]
#[command(name = "vax", version)]
#[command(about = "Vaccination appointments backed by on-chain records", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "vax.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the global appointment counter if it does not exist yet
    InitCounter,
    /// Show the current appointment counter
    Counter,
    /// Book and pay an appointment by card
    BookCard {
        #[arg(long)]
        vaccine_id: u64,
        #[arg(long)]
        patient_id: u64,
        #[arg(long)]
        center_id: u64,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
    },
    /// Book a cash appointment (on-chain record only)
    BookCash {
        #[arg(long)]
        vaccine_id: u64,
        #[arg(long)]
        patient_id: u64,
        #[arg(long)]
        center_id: u64,
        #[arg(long)]
        date: String,
    },
    /// Show a patient's appointment history
    History {
        #[arg(long)]
        patient_id: u64,
        #[arg(long, default_value_t = history::DEFAULT_PAGE)]
        page: usize,
        #[arg(long, default_value_t = history::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Cancel a pending appointment
    Cancel { appointment_id: String },
    /// Set the on-chain status of a record
    SetStatus {
        appointment_id: String,
        status: String,
    },
    /// Assign a doctor on-chain and on the backend
    SetDoctor {
        appointment_id: String,
        doctor_id: u64,
    },
    /// Mark a backend appointment as completed
    Complete { appointment_id: String },
    /// List appointments
    Appointments {
        /// Raw query string, e.g. "page=1&pageSize=10"
        #[arg(long, default_value = "")]
        query: String,
    },
    /// List the signed-in user's schedule
    MySchedule {
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Report a payment gateway response to the backend
    UpdatePayment {
        #[arg(long)]
        payment_id: String,
        #[arg(long)]
        signature: String,
    },
    /// Print the record address of an appointment
    Copy { appointment_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(&cli.config)?;
    let api = ApiClient::new(&config.api)?;
    let chain = build_chain_client(&config)?;

    match cli.command {
        Commands::InitCounter => match chain.initialize_counter().await? {
            Some(signature) => println!("Counter initialized: {}", signature),
            None => println!("Counter already initialized"),
        },
        Commands::Counter => match chain.get_counter().await? {
            Some(counter) => println!("Appointments recorded: {}", counter.appointment_count),
            None => println!("Counter not initialized"),
        },
        Commands::BookCard {
            vaccine_id,
            patient_id,
            center_id,
            date,
            time,
        } => {
            let request = BookingRequest {
                vaccine_id,
                patient_id,
                center_id,
                appointment_date: date,
                appointment_time: time,
            };
            let outcome = AppointmentOrchestrator::new(&api, &chain)
                .book_credit_card(&request)
                .await?;
            println!("Stage reached: {}", outcome.stage);
            if let Some(details) = &outcome.appointment.data {
                if let Some(id) = &details.appointment_id {
                    println!("Backend appointment: {}", id);
                }
                if let Some(amount) = details.amount {
                    println!("Amount: {}", lamports_as_sol_string(amount));
                }
            }
            if let Some(record) = &outcome.record {
                println!("Record address: {}", record.address);
                println!("Record signature: {}", record.signature);
            }
            if let Some(signature) = &outcome.payment_signature {
                println!("Payment signature: {}", signature);
            }
            if let Some(reason) = outcome.failure {
                bail!("Booking stopped after '{}': {}", outcome.stage, reason);
            }
        }
        Commands::BookCash {
            vaccine_id,
            patient_id,
            center_id,
            date,
        } => {
            let request = BookingRequest {
                vaccine_id,
                patient_id,
                center_id,
                appointment_date: date,
                appointment_time: String::new(),
            };
            let booking = AppointmentOrchestrator::new(&api, &chain)
                .book_cash(&request)
                .await?;
            if let Some(signature) = &booking.counter_signature {
                println!("Counter initialized: {}", signature);
            }
            println!("Record address: {}", booking.record.address);
            println!("Signature: {}", booking.record.signature);
            print_record(&booking.record.record);
        }
        Commands::History {
            patient_id,
            page,
            page_size,
        } => {
            let rows: Vec<HistoryRow> = HistoryView::new(&api, &chain).load(patient_id).await?;
            print!("{}", history::render(&history::paginate(&rows, page, page_size)));
        }
        Commands::Cancel { appointment_id } => {
            let signature = HistoryView::new(&api, &chain)
                .cancel(&appointment_id)
                .await?;
            println!("Appointment {} cancelled: {}", appointment_id, signature);
        }
        Commands::SetStatus {
            appointment_id,
            status,
        } => {
            let address = parse_address(&appointment_id)?;
            let signature = chain.update_vaccination_status(&address, &status).await?;
            println!("Status set to {}: {}", status.to_lowercase(), signature);
        }
        Commands::SetDoctor {
            appointment_id,
            doctor_id,
        } => {
            let address = parse_address(&appointment_id)?;
            let signature = chain.update_doctor_id(&address, doctor_id).await?;
            info!(%appointment_id, %signature, "Doctor assigned on-chain");
            let response = api.update_appointment(&appointment_id, doctor_id).await?;
            ensure_success(&response, "Failed to update appointment")?;
            println!("Doctor {} assigned: {}", doctor_id, signature);
        }
        Commands::Complete { appointment_id } => {
            let response = api.complete_appointment(&appointment_id).await?;
            ensure_success(&response, "Failed to complete appointment")?;
            println!("Appointment {} completed", appointment_id);
        }
        Commands::Appointments { query } => {
            let response = api.list_appointments(&query).await?;
            print_paged(response)?;
        }
        Commands::MySchedule { query } => {
            let response = api.my_schedule(&query).await?;
            print_paged(response)?;
        }
        Commands::UpdatePayment {
            payment_id,
            signature,
        } => {
            let response = api.update_payment(&payment_id, &signature).await?;
            ensure_success(&response, "Failed to update payment")?;
            println!("Payment {} updated", payment_id);
        }
        Commands::Copy { appointment_id } => {
            let address = HistoryView::new(&api, &chain)
                .copy_reference(&appointment_id)
                .await?;
            println!("{}", address);
        }
    }

    Ok(())
}

fn build_chain_client(config: &Config) -> Result<ChainRecordClient<HttpRpcClient>> {
    let solana = &config.solana;
    let rpc = HttpRpcClient::new(
        &solana.rpc_url,
        solana.commitment()?,
        Duration::from_secs(config.api.timeout_seconds),
    );
    let mut chain = ChainRecordClient::new(rpc, solana.program_id()?).with_confirmation(
        solana.confirm_attempts,
        Duration::from_millis(solana.confirm_interval_ms),
    );

    match solana.keypair_path() {
        Some(path) => {
            let keypair = wallet::load_keypair(&path)?;
            info!(wallet = %keypair.pubkey(), "Wallet loaded");
            chain = chain.with_wallet(Arc::new(keypair));
        }
        None => warn!("No keypair_path configured, signing operations are unavailable"),
    }
    if let Some(payee) = solana.center_wallet()? {
        chain = chain.with_payee(payee);
    }
    Ok(chain)
}

fn parse_address(appointment_id: &str) -> Result<Pubkey> {
    appointment_id
        .parse()
        .with_context(|| format!("Invalid appointment ID: {}", appointment_id))
}

fn ensure_success<T>(response: &ApiResponse<T>, what: &str) -> Result<()> {
    if !response.is_success() {
        bail!("{}: {}", what, response.failure());
    }
    Ok(())
}

fn print_paged(response: ApiResponse<Paged<serde_json::Value>>) -> Result<()> {
    let paged = response.into_data()?;
    for item in &paged.result {
        println!("{}", serde_json::to_string_pretty(item)?);
    }
    println!(
        "Page {} of {} ({} total)",
        paged.meta.page, paged.meta.pages, paged.meta.total
    );
    Ok(())
}

fn print_record(record: &VaccinationRecord) {
    println!("Patient ID: {}", record.patient_id);
    println!("Vaccine ID: {}", record.vaccine_id);
    println!("Center ID: {}", record.center_id);
    println!("Date: {}", history::format_date(&record.appointment_date));
    println!("Status: {}", record.status);
}
