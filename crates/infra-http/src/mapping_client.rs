// Distance-matrix HTTP client
//
// Request:  GET {base_url}/distancematrix/json?origins=lat,lng|..&destinations=..&key=..
// Response: { "status": "OK", "rows": [ { "elements": [ { "status": "OK",
//             "distance": { "value": <meters> }, "duration": { "value": <seconds> } } ] } ] }

use async_trait::async_trait;
use fieldops_core::domain::Coordinate;
use fieldops_core::port::{MappingClient, MappingError, RouteEstimate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const METERS_PER_MILE: f64 = 1_609.344;

#[derive(Debug, Clone)]
pub struct MappingClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Transport-level timeout; the distance provider applies its own per attempt
    pub timeout: Duration,
}

pub struct HttpMappingClient {
    client: Client,
    config: MappingClientConfig,
}

impl HttpMappingClient {
    pub fn new(config: MappingClientConfig) -> Result<Self, MappingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MappingError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/distancematrix/json",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

fn join_coordinates(coordinates: &[Coordinate]) -> String {
    coordinates
        .iter()
        .map(|c| format!("{},{}", c.latitude, c.longitude))
        .collect::<Vec<_>>()
        .join("|")
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<Measure>,
    duration: Option<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: f64,
}

fn classify_status(status: StatusCode, body: &str) -> MappingError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => MappingError::Quota(body.to_string()),
        s if s.is_server_error() => MappingError::Unavailable(format!("HTTP {}", s)),
        s => MappingError::Http(format!("HTTP {}: {}", s, body)),
    }
}

fn classify_transport(err: reqwest::Error, timeout: Duration) -> MappingError {
    if err.is_timeout() {
        MappingError::Timeout(timeout.as_millis() as u64)
    } else if err.is_connect() {
        MappingError::Unavailable(err.to_string())
    } else if err.is_decode() {
        MappingError::MalformedResponse(err.to_string())
    } else {
        MappingError::Http(err.to_string())
    }
}

/// Convert a parsed body into miles/minutes, rejecting partial answers
fn into_estimates(response: MatrixResponse) -> Result<Vec<Vec<RouteEstimate>>, MappingError> {
    match response.status.as_str() {
        "OK" => {}
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
            return Err(MappingError::Quota(
                response.error_message.unwrap_or(response.status),
            ))
        }
        "UNKNOWN_ERROR" => {
            return Err(MappingError::Unavailable(
                response.error_message.unwrap_or(response.status),
            ))
        }
        other => {
            return Err(MappingError::Http(format!(
                "{}: {}",
                other,
                response.error_message.unwrap_or_default()
            )))
        }
    }

    response
        .rows
        .into_iter()
        .map(|row| {
            row.elements
                .into_iter()
                .map(|element| match (element.status.as_str(), element.distance, element.duration) {
                    ("OK", Some(distance), Some(duration)) => Ok(RouteEstimate {
                        distance_miles: distance.value / METERS_PER_MILE,
                        travel_time_minutes: duration.value / 60.0,
                    }),
                    (status, _, _) => Err(MappingError::MalformedResponse(format!(
                        "element status {}",
                        status
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

#[async_trait]
impl MappingClient for HttpMappingClient {
    async fn route_matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<Vec<Vec<RouteEstimate>>, MappingError> {
        let mut query = vec![
            ("origins", join_coordinates(origins)),
            ("destinations", join_coordinates(destinations)),
            ("units", "imperial".to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            query.push(("key", key.clone()));
        }

        debug!(
            origins = origins.len(),
            destinations = destinations.len(),
            "Requesting distance matrix"
        );

        let response = self
            .client
            .get(self.endpoint())
            .query(&query)
            .send()
            .await
            .map_err(|e| classify_transport(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: MatrixResponse = response
            .json()
            .await
            .map_err(|e| MappingError::MalformedResponse(e.to_string()))?;
        into_estimates(body)
    }
}
