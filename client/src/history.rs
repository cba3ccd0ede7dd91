//! The patient's own appointment history: records come from the chain, names
//! from the backend lookups.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tabular::{Row, Table};
use tracing::{info, warn};
use solana_sdk::signature::Signature;
use vax_common::{Pubkey, VaccinationStatus};

use crate::api_client::ApiClient;
use crate::chain::{ChainRecordClient, RecordEntry, SolanaRpc};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Center and vaccine names keyed by id.
#[derive(Debug, Default, Clone)]
pub struct Lookups {
    pub centers: HashMap<u64, String>,
    pub vaccines: HashMap<u64, String>,
}

impl Lookups {
    /// Fetches both lookups concurrently. A failed lookup leaves its map empty.
    pub async fn load(api: &ApiClient) -> Self {
        let (centers, vaccines) = tokio::join!(api.get_centers(), api.get_vaccines());
        let mut lookups = Lookups::default();
        match centers {
            Ok(centers) => {
                lookups.centers = centers.into_iter().map(|c| (c.center_id, c.name)).collect()
            }
            Err(e) => warn!("Failed to fetch centers: {:#}", e),
        }
        match vaccines {
            Ok(vaccines) => {
                lookups.vaccines = vaccines
                    .into_iter()
                    .map(|v| (v.vaccine_id, v.name))
                    .collect()
            }
            Err(e) => warn!("Failed to fetch vaccines: {:#}", e),
        }
        lookups
    }

    pub fn vaccine_label(&self, vaccine_id: u64) -> String {
        self.vaccines
            .get(&vaccine_id)
            .cloned()
            .unwrap_or_else(|| format!("Vaccine ID: {}", vaccine_id))
    }

    pub fn center_label(&self, center_id: u64) -> String {
        self.centers
            .get(&center_id)
            .cloned()
            .unwrap_or_else(|| format!("Center ID: {}", center_id))
    }
}

pub fn doctor_label(doctor_id: Option<u64>) -> String {
    match doctor_id {
        Some(id) => format!("Doctor ID: {}", id),
        None => "Not assigned".to_string(),
    }
}

/// Renders a date as `YYYY-MM-DD` when it parses, otherwise returns it unchanged.
pub fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return date.date_naive().format("%Y-%m-%d").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return datetime.date().format("%Y-%m-%d").to_string();
        }
    }
    for pattern in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, pattern) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    raw.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    /// On-chain record address; also the reference users copy
    pub appointment_id: String,
    pub vaccine: String,
    pub date: String,
    pub status: VaccinationStatus,
    pub center: String,
    pub doctor: String,
}

impl HistoryRow {
    pub fn from_entry(entry: &RecordEntry, lookups: &Lookups) -> Self {
        let record = &entry.record;
        Self {
            appointment_id: entry.address.to_string(),
            vaccine: lookups.vaccine_label(record.vaccine_id),
            date: format_date(&record.appointment_date),
            status: record.status,
            center: lookups.center_label(record.center_id),
            doctor: doctor_label(record.doctor_id),
        }
    }

    pub fn actions(&self) -> &'static str {
        if self.status.is_cancellable() {
            "cancel, copy"
        } else {
            "copy"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub page_size: usize,
    pub pages: usize,
    pub total: usize,
}

impl<T> Page<'_, T> {
    /// 1-based index of the first item shown, 0 when the page is empty.
    pub fn first(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.page - 1).saturating_mul(self.page_size) + 1
        }
    }

    pub fn last(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            self.first() + self.items.len() - 1
        }
    }

    pub fn footer(&self) -> String {
        format!("{}-{} of {} records", self.first(), self.last(), self.total)
    }
}

/// Slices out page `page` (1-based). Zero page or page size fall back to the defaults.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page = if page == 0 { DEFAULT_PAGE } else { page };
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    let total = items.len();
    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);
    Page {
        items: &items[start..end],
        page,
        page_size,
        pages: total.div_ceil(page_size),
        total,
    }
}

pub fn render(page: &Page<'_, HistoryRow>) -> String {
    #[allow(clippy::literal_string_with_formatting_args)]
    let mut table = Table::new("{:<}  {:<}  {:<}  {:<}  {:<}  {:<}  {:<}").with_row(
        Row::from_cells(
            [
                "Appointment ID",
                "Vaccine",
                "Date",
                "Status",
                "Center",
                "Doctor",
                "Actions",
            ]
            .iter()
            .cloned(),
        ),
    );
    for row in page.items {
        table.add_row(
            Row::new()
                .with_cell(&row.appointment_id)
                .with_cell(&row.vaccine)
                .with_cell(&row.date)
                .with_cell(row.status)
                .with_cell(&row.center)
                .with_cell(&row.doctor)
                .with_cell(row.actions()),
        );
    }
    format!("{}{}\n", table, page.footer())
}

pub struct HistoryView<'a, R> {
    api: &'a ApiClient,
    chain: &'a ChainRecordClient<R>,
}

impl<'a, R: SolanaRpc> HistoryView<'a, R> {
    pub fn new(api: &'a ApiClient, chain: &'a ChainRecordClient<R>) -> Self {
        Self { api, chain }
    }

    /// Loads the patient's records and resolves their display names.
    pub async fn load(&self, patient_id: u64) -> Result<Vec<HistoryRow>> {
        let (lookups, records) = tokio::join!(
            Lookups::load(self.api),
            self.chain.get_vaccination_records(patient_id)
        );
        let records = records?;
        Ok(records
            .iter()
            .map(|entry| HistoryRow::from_entry(entry, &lookups))
            .collect())
    }

    /// Cancels a pending appointment on-chain, then on the backend.
    pub async fn cancel(&self, appointment_id: &str) -> Result<Signature> {
        let address: Pubkey = appointment_id
            .parse()
            .with_context(|| format!("Invalid appointment ID: {}", appointment_id))?;
        let record = self
            .chain
            .get_vaccination_record(&address)
            .await?
            .with_context(|| format!("Appointment {} not found", appointment_id))?;
        if !record.status.is_cancellable() {
            bail!(
                "Only pending appointments can be cancelled, {} is {}",
                appointment_id,
                record.status
            );
        }

        let signature = self
            .chain
            .update_vaccination_status(&address, VaccinationStatus::Cancelled.as_str())
            .await
            .context("Failed to cancel appointment")?;
        let response = self
            .api
            .cancel_appointment(appointment_id)
            .await
            .context("Failed to cancel appointment")?;
        if response.status_code != 200 {
            bail!("Failed to cancel appointment: {}", response.failure());
        }
        info!(%appointment_id, %signature, "Appointment cancelled");
        Ok(signature)
    }

    /// The on-chain record address to hand to the clipboard.
    pub async fn copy_reference(&self, appointment_id: &str) -> Result<String> {
        let address: Pubkey = appointment_id
            .parse()
            .with_context(|| format!("Invalid appointment ID: {}", appointment_id))?;
        match self.chain.get_vaccination_record(&address).await? {
            Some(_) => Ok(address.to_string()),
            None => bail!("Appointment {} not found", appointment_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeRpc;
    use crate::config::ApiConfig;
    use solana_sdk::signer::keypair::keypair_from_seed;
    use mockito::Server;
    use std::sync::Arc;
    use std::time::Duration;
    use vax_common::{CreateVaccinationRecordArgs, VaccinationRecord};

    fn program_id() -> Pubkey {
        Pubkey::new_from_array([42u8; 32])
    }

    fn api(server: &mockito::Server) -> ApiClient {
        ApiClient::new(&ApiConfig {
            endpoint: server.url(),
            access_token: None,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn chain() -> ChainRecordClient<FakeRpc> {
        let wallet = Arc::new(keypair_from_seed(&[1u8; 32]).unwrap());
        ChainRecordClient::new(FakeRpc::new(program_id()), program_id())
            .with_wallet(wallet)
            .with_confirmation(3, Duration::ZERO)
    }

    fn record(status: VaccinationStatus, doctor_id: Option<u64>) -> VaccinationRecord {
        VaccinationRecord {
            appointment_id: Pubkey::new_from_array([5u8; 32]),
            patient_id: 7,
            vaccine_id: 2,
            appointment_date: "2025-06-01T08:00:00.000Z".to_string(),
            center_id: 99,
            doctor_id,
            status,
            authority: Pubkey::new_from_array([6u8; 32]),
            created_at: 0,
            updated_at: 0,
        }
    }

    async fn mock_lookups(server: &mut mockito::Server) {
        server
            .mock("GET", "/centers")
            .with_status(200)
            .with_body(
                r#"{"statusCode":200,"data":{"meta":{"page":1,"pageSize":10,"pages":1,"total":1},"result":[{"centerId":3,"name":"City Hall"}]}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/vaccines")
            .with_status(200)
            .with_body(
                r#"{"statusCode":200,"data":{"meta":{"page":1,"pageSize":10,"pages":1,"total":1},"result":[{"vaccineId":2,"name":"Measles"}]}}"#,
            )
            .create_async()
            .await;
    }

    async fn create(chain: &ChainRecordClient<FakeRpc>, patient_id: u64) -> String {
        chain.initialize_counter().await.unwrap();
        chain
            .create_vaccination_record(&CreateVaccinationRecordArgs {
                patient_id,
                vaccine_id: 2,
                appointment_date: "2025-06-01".to_string(),
                center_id: 3,
            })
            .await
            .unwrap()
            .address
            .to_string()
    }

    #[test]
    fn test_labels_fall_back_to_ids() {
        let lookups = Lookups::default();
        assert_eq!(lookups.vaccine_label(4), "Vaccine ID: 4");
        assert_eq!(lookups.center_label(9), "Center ID: 9");
        assert_eq!(doctor_label(Some(12)), "Doctor ID: 12");
        assert_eq!(doctor_label(None), "Not assigned");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-06-01"), "2025-06-01");
        assert_eq!(format_date("2025-06-01T08:00:00.000Z"), "2025-06-01");
        assert_eq!(format_date("2025-06-01T08:00:00"), "2025-06-01");
        assert_eq!(format_date("2025/06/01"), "2025-06-01");
        assert_eq!(format_date("next tuesday"), "next tuesday");
    }

    #[test]
    fn test_paginate_and_footer() {
        let items: Vec<u32> = (1..=25).collect();
        let page = paginate(&items, 1, 10);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.pages, 3);
        assert_eq!(page.footer(), "1-10 of 25 records");

        let last = paginate(&items, 3, 10);
        assert_eq!(last.items, &[21, 22, 23, 24, 25]);
        assert_eq!(last.footer(), "21-25 of 25 records");

        let beyond = paginate(&items, 9, 10);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.footer(), "0-0 of 25 records");

        let defaults = paginate(&items, 0, 0);
        assert_eq!(defaults.page, DEFAULT_PAGE);
        assert_eq!(defaults.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_paginate_huge_page_values_do_not_overflow() {
        let items: Vec<u32> = (1..=25).collect();

        let huge_size = paginate(&items, 2, usize::MAX);
        assert!(huge_size.items.is_empty());
        assert_eq!(huge_size.pages, 1);
        assert_eq!(huge_size.footer(), "0-0 of 25 records");

        let first_of_huge = paginate(&items, 1, usize::MAX);
        assert_eq!(first_of_huge.items.len(), 25);
        assert_eq!(first_of_huge.footer(), "1-25 of 25 records");

        let huge_page = paginate(&items, usize::MAX, 10);
        assert!(huge_page.items.is_empty());
        assert_eq!(huge_page.page, usize::MAX);
        assert_eq!(huge_page.footer(), "0-0 of 25 records");
    }

    #[test]
    fn test_render_row_labels_and_actions() {
        let lookups = Lookups::default();
        let rows = vec![
            HistoryRow::from_entry(
                &RecordEntry {
                    address: Pubkey::new_from_array([5u8; 32]),
                    record: record(VaccinationStatus::Pending, None),
                },
                &lookups,
            ),
            HistoryRow::from_entry(
                &RecordEntry {
                    address: Pubkey::new_from_array([8u8; 32]),
                    record: record(VaccinationStatus::Completed, Some(4)),
                },
                &lookups,
            ),
        ];
        assert_eq!(rows[0].actions(), "cancel, copy");
        assert_eq!(rows[1].actions(), "copy");

        let output = render(&paginate(&rows, 1, 10));
        assert!(output.contains("Appointment ID"));
        assert!(output.contains("Vaccine ID: 2"));
        assert!(output.contains("Center ID: 99"));
        assert!(output.contains("Not assigned"));
        assert!(output.contains("Doctor ID: 4"));
        assert!(output.contains("2025-06-01"));
        assert!(output.trim_end().ends_with("1-2 of 2 records"));
    }

    #[tokio::test]
    async fn test_load_resolves_names() {
        let mut server = Server::new_async().await;
        mock_lookups(&mut server).await;
        let chain = chain();
        create(&chain, 7).await;
        create(&chain, 8).await;

        let api = api(&server);
        let rows = HistoryView::new(&api, &chain).load(7).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vaccine, "Measles");
        assert_eq!(rows[0].center, "City Hall");
        assert_eq!(rows[0].doctor, "Not assigned");
    }

    #[tokio::test]
    async fn test_load_survives_lookup_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/centers")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        server
            .mock("GET", "/vaccines")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let chain = chain();
        create(&chain, 7).await;

        let api = api(&server);
        let rows = HistoryView::new(&api, &chain).load(7).await.unwrap();
        assert_eq!(rows[0].vaccine, "Vaccine ID: 2");
        assert_eq!(rows[0].center, "Center ID: 3");
    }

    #[tokio::test]
    async fn test_cancel_updates_chain_then_backend() {
        let mut server = Server::new_async().await;
        let chain = chain();
        let appointment_id = create(&chain, 7).await;
        let backend = server
            .mock("PUT", format!("/appointments/{}/cancel", appointment_id).as_str())
            .with_status(200)
            .with_body(r#"{"statusCode":200,"message":"cancelled"}"#)
            .create_async()
            .await;

        let api = api(&server);
        HistoryView::new(&api, &chain)
            .cancel(&appointment_id)
            .await
            .unwrap();
        backend.assert_async().await;

        let address: Pubkey = appointment_id.parse().unwrap();
        assert_eq!(
            chain.rpc().record(&address).unwrap().status,
            VaccinationStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_cancel_reports_backend_rejection() {
        let mut server = Server::new_async().await;
        let chain = chain();
        let appointment_id = create(&chain, 7).await;
        let _backend = server
            .mock("PUT", format!("/appointments/{}/cancel", appointment_id).as_str())
            .with_status(409)
            .with_body(r#"{"statusCode":409,"error":"Conflict","message":"Already paid out"}"#)
            .create_async()
            .await;

        let api = api(&server);
        let err = HistoryView::new(&api, &chain)
            .cancel(&appointment_id)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to cancel appointment: Conflict: Already paid out"
        );
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let mut server = Server::new_async().await;
        let backend = server
            .mock("PUT", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let chain = chain();
        let address = Pubkey::new_from_array([5u8; 32]);
        chain
            .rpc()
            .insert_record(address, &record(VaccinationStatus::Completed, Some(4)));

        let api = api(&server);
        let err = HistoryView::new(&api, &chain)
            .cancel(&address.to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Only pending appointments"));
        backend.assert_async().await;
        assert_eq!(chain.rpc().sent_count(), 0);
    }

    #[tokio::test]
    async fn test_copy_reference() {
        let server = Server::new_async().await;
        let chain = chain();
        let appointment_id = create(&chain, 7).await;

        let api = api(&server);
        let view = HistoryView::new(&api, &chain);
        assert_eq!(view.copy_reference(&appointment_id).await.unwrap(), appointment_id);
        let missing = Pubkey::new_from_array([9u8; 32]).to_string();
        assert!(view.copy_reference(&missing).await.is_err());
        assert!(view.copy_reference("not-a-key").await.is_err());
    }
}
