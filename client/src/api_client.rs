use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;

/// Backend REST client for appointments, payments and lookups.
pub struct ApiClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub error: Option<String>,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Human-readable failure description built from `error` and `message`.
    pub fn failure(&self) -> String {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => format!("{}: {}", error, message),
            (Some(error), None) => error.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => format!("status code {}", self.status_code),
        }
    }

    pub fn into_data(self) -> Result<T> {
        if !self.is_success() {
            bail!("API error: {}", self.failure());
        }
        self.data.ok_or_else(|| anyhow!("No data in response"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub page_size: u64,
    pub pages: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    pub meta: PageMeta,
    pub result: Vec<T>,
}

/// Backend identifiers arrive as either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendId::Number(id) => write!(f, "{}", id),
            BackendId::Text(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardAppointmentRequest {
    pub vaccine_id: u64,
    pub patient_id: u64,
    pub center_id: u64,
    pub appointment_date: String,
    pub appointment_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardAppointment {
    pub appointment_id: Option<BackendId>,
    pub payment_id: Option<BackendId>,
    /// Charge in lamports
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureUpdate {
    pub signature: String,
    pub payment_signature: String,
    /// On-chain record address, the id shared with the backend mirror
    pub record_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DoctorUpdate {
    doctor_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Center {
    pub center_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccine {
    pub vaccine_id: u64,
    pub name: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Creates the backend appointment row that starts a card booking.
    pub async fn create_credit_card_appointment(
        &self,
        request: &CreditCardAppointmentRequest,
    ) -> Result<ApiResponse<CreditCardAppointment>> {
        self.send(Method::POST, "/appointments/credit-card", Some(request))
            .await
    }

    /// Stores the record and payment signatures on the backend appointment.
    pub async fn update_signature(
        &self,
        appointment_id: &str,
        update: &SignatureUpdate,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let path = format!("/appointments/{}/signature", appointment_id);
        self.send(Method::PUT, &path, Some(update)).await
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let path = format!("/appointments/{}/cancel", appointment_id);
        self.send(Method::PUT, &path, None::<&()>).await
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let path = format!("/appointments/{}/complete", appointment_id);
        self.send(Method::PUT, &path, None::<&()>).await
    }

    /// Assigns a doctor to the backend appointment.
    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        doctor_id: u64,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let path = format!("/appointments/{}", appointment_id);
        self.send(Method::PUT, &path, Some(&DoctorUpdate { doctor_id }))
            .await
    }

    /// Lists appointments; `query` is passed through as the raw query string.
    pub async fn list_appointments(
        &self,
        query: &str,
    ) -> Result<ApiResponse<Paged<serde_json::Value>>> {
        let path = with_query("/appointments", query);
        self.send(Method::GET, &path, None::<&()>).await
    }

    pub async fn my_schedule(&self, query: &str) -> Result<ApiResponse<Paged<serde_json::Value>>> {
        let path = with_query("/appointments/my-schedule", query);
        self.send(Method::GET, &path, None::<&()>).await
    }

    /// Records the gateway's verdict for a payment.
    pub async fn update_payment(
        &self,
        payment_id: &str,
        signature: &str,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let path = format!(
            "/appointments/update-payment?paymentId={}&vnpResponse={}",
            urlencoding::encode(payment_id),
            urlencoding::encode(signature)
        );
        self.send(Method::POST, &path, None::<&()>).await
    }

    pub async fn get_centers(&self) -> Result<Vec<Center>> {
        let response: ApiResponse<Paged<Center>> =
            self.send(Method::GET, "/centers", None::<&()>).await?;
        Ok(response.into_data()?.result)
    }

    pub async fn get_vaccines(&self) -> Result<Vec<Vaccine>> {
        let response: ApiResponse<Paged<Vaccine>> =
            self.send(Method::GET, "/vaccines", None::<&()>).await?;
        Ok(response.into_data()?.result)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        let builder = self.client.request(method, &url);
        match &self.access_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Sends a request and parses the response envelope. Error statuses whose
    /// body is still an envelope come back as `Ok`, so callers see the
    /// backend's `error` and `message`.
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>> {
        let mut builder = self.request(method.clone(), path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to {} {}", method, path))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;
        debug!(%method, path, %status, "Backend response");

        match serde_json::from_str::<ApiResponse<T>>(&response_body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => {
                bail!("HTTP {} for {} {}: {}", status, method, path, response_body)
            }
            Err(e) => Err(e).with_context(|| {
                format!(
                    "Failed to deserialize response from {} {}: {}",
                    method, path, response_body
                )
            }),
        }
    }
}

fn with_query(path: &str, query: &str) -> String {
    let query = query.trim_start_matches('?');
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}
