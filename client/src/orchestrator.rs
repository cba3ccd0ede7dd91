//! Appointment booking workflows spanning the backend and the chain.
//!
//! Card bookings run four steps in order: create the backend appointment,
//! create the on-chain record, pay on-chain, then save both signatures on the
//! backend. The first failing step ends the run; earlier steps are not rolled
//! back.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use solana_sdk::signature::Signature;
use tracing::{error, info};
use vax_common::CreateVaccinationRecordArgs;

use crate::api_client::{
    ApiClient, ApiResponse, CreditCardAppointment, CreditCardAppointmentRequest, SignatureUpdate,
};
use crate::chain::{ChainRecordClient, CreatedRecord, PaymentRequest, SolanaRpc};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub vaccine_id: u64,
    pub patient_id: u64,
    pub center_id: u64,
    pub appointment_date: String,
    pub appointment_time: String,
}

impl BookingRequest {
    fn record_args(&self) -> CreateVaccinationRecordArgs {
        CreateVaccinationRecordArgs {
            patient_id: self.patient_id,
            vaccine_id: self.vaccine_id,
            appointment_date: self.appointment_date.clone(),
            center_id: self.center_id,
        }
    }
}

/// Last step a card booking completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStage {
    BackendCreated,
    RecordCreated,
    PaymentProcessed,
    SignaturesSaved,
}

impl std::fmt::Display for BookingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            BookingStage::BackendCreated => "backend appointment created",
            BookingStage::RecordCreated => "on-chain record created",
            BookingStage::PaymentProcessed => "payment processed",
            BookingStage::SignaturesSaved => "signatures saved",
        };
        write!(f, "{}", stage)
    }
}

#[derive(Debug)]
pub struct BookingOutcome {
    pub stage: BookingStage,
    pub appointment: ApiResponse<CreditCardAppointment>,
    pub record: Option<CreatedRecord>,
    pub payment_signature: Option<Signature>,
    pub signature_response: Option<ApiResponse<serde_json::Value>>,
    /// Why the workflow stopped before saving signatures
    pub failure: Option<String>,
}

impl BookingOutcome {
    pub fn is_complete(&self) -> bool {
        self.stage == BookingStage::SignaturesSaved && self.failure.is_none()
    }

    fn stopped(mut self, reason: String) -> Self {
        error!(stage = %self.stage, "Booking stopped: {}", reason);
        self.failure = Some(reason);
        self
    }
}

#[derive(Debug)]
pub struct CashBooking {
    /// Present when this booking had to create the counter
    pub counter_signature: Option<Signature>,
    pub record: CreatedRecord,
}

pub struct AppointmentOrchestrator<'a, R> {
    api: &'a ApiClient,
    chain: &'a ChainRecordClient<R>,
}

impl<'a, R: SolanaRpc> AppointmentOrchestrator<'a, R> {
    pub fn new(api: &'a ApiClient, chain: &'a ChainRecordClient<R>) -> Self {
        Self { api, chain }
    }

    /// Card booking. Transport failures of the first step are errors; any later
    /// failure is reported in the outcome together with what was completed.
    pub async fn book_credit_card(&self, request: &BookingRequest) -> Result<BookingOutcome> {
        let backend_request = CreditCardAppointmentRequest {
            vaccine_id: request.vaccine_id,
            patient_id: request.patient_id,
            center_id: request.center_id,
            appointment_date: request.appointment_date.clone(),
            appointment_time: request.appointment_time.clone(),
        };
        let appointment = self
            .api
            .create_credit_card_appointment(&backend_request)
            .await
            .context("Failed to create appointment")?;

        let mut outcome = BookingOutcome {
            stage: BookingStage::BackendCreated,
            appointment,
            record: None,
            payment_signature: None,
            signature_response: None,
            failure: None,
        };

        if !outcome.appointment.is_success() {
            let reason = outcome.appointment.failure();
            return Ok(outcome.stopped(reason));
        }
        let Some(details) = outcome.appointment.data.clone() else {
            return Ok(outcome.stopped("Backend returned no appointment data".to_string()));
        };
        let Some(appointment_id) = details.appointment_id.as_ref().map(|id| id.to_string()) else {
            return Ok(outcome.stopped("Backend returned no appointment ID".to_string()));
        };
        info!(%appointment_id, "Backend appointment created");

        let record = match self.chain.create_vaccination_record(&request.record_args()).await {
            Ok(record) => record,
            Err(e) => return Ok(outcome.stopped(e.to_string())),
        };
        outcome.stage = BookingStage::RecordCreated;
        let record_signature = record.signature.to_string();
        let record_address = record.address.to_string();
        outcome.record = Some(record);

        let payment = PaymentRequest {
            payment_id: details
                .payment_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            amount: details.amount.unwrap_or_default(),
            appointment_id: appointment_id.clone(),
        };
        let payment_signature = match self.chain.process_payment(&payment).await {
            Ok(signature) => signature,
            Err(e) => return Ok(outcome.stopped(e.to_string())),
        };
        outcome.stage = BookingStage::PaymentProcessed;
        outcome.payment_signature = Some(payment_signature);

        let update = SignatureUpdate {
            signature: record_signature,
            payment_signature: payment_signature.to_string(),
            record_address,
        };
        let response = match self.api.update_signature(&appointment_id, &update).await {
            Ok(response) => response,
            Err(e) => return Ok(outcome.stopped(format!("{:#}", e))),
        };
        if !response.is_success() {
            let reason = response.failure();
            outcome.signature_response = Some(response);
            return Ok(outcome.stopped(reason));
        }
        outcome.signature_response = Some(response);
        outcome.stage = BookingStage::SignaturesSaved;
        info!(%appointment_id, "Appointment booked and paid");
        Ok(outcome)
    }

    /// Cash booking: chain only, no backend row and no payment.
    pub async fn book_cash(&self, request: &BookingRequest) -> Result<CashBooking> {
        let counter_signature = self
            .chain
            .initialize_counter()
            .await
            .map_err(|e| anyhow!("Failed to create appointment: {}", e))?;
        if counter_signature.is_some() {
            info!("Counter was missing and has been initialized");
        }
        let record = self
            .chain
            .create_vaccination_record(&request.record_args())
            .await
            .map_err(|e| anyhow!("Failed to create appointment: {}", e))?;
        info!(record = %record.address, "Cash appointment recorded on-chain");
        Ok(CashBooking {
            counter_signature,
            record,
        })
    }
}
