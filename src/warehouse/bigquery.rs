// Concrete WarehouseClient backed by the BigQuery REST jobs.query API.
//
// This is the one module that knows the source is BigQuery; everything
// above `warehouse::client::WarehouseClient` only sees the trait.
use crate::domain::{Row, RowBatch, RowValue};
use crate::error::{EtlError, Result};
use crate::warehouse::client::{with_retry, RetryPolicy, RowPageStream, WarehouseClient};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream;
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone)]
pub struct BigQueryClient {
    http: reqwest::Client,
    project_id: String,
    base_url: String,
    bearer_token: String,
    max_billed_bytes: u64,
    retry_policy: RetryPolicy,
}

impl BigQueryClient {
    pub fn new(
        project_id: String,
        bearer_token: String,
        max_billed_bytes: u64,
        query_timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(query_timeout)
                .build()
                .expect("reqwest client builder"),
            base_url: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            project_id,
            bearer_token,
            max_billed_bytes,
            retry_policy,
        }
    }

    /// Transient errors and timeouts are retried with exponential backoff;
    /// permanent errors and auth failures propagate on the first attempt.
    async fn run_query(&self, sql: &str, page_size: usize, page_token: Option<&str>) -> Result<QueryPage> {
        with_retry(&self.retry_policy, || self.run_query_once(sql, page_size, page_token)).await
    }

    async fn run_query_once(&self, sql: &str, page_size: usize, page_token: Option<&str>) -> Result<QueryPage> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let body = serde_json::json!({
            "query": sql,
            "useLegacySql": false,
            "maxResults": page_size,
            "pageToken": page_token,
            "maximumBytesBilled": self.max_billed_bytes.to_string(),
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(EtlError::WarehouseAuth(response.status().to_string()));
        }
        if response.status().is_server_error() {
            return Err(EtlError::TransientWarehouse(response.status().to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EtlError::PermanentWarehouse(format!("{status}: {text}")));
        }

        response
            .json::<QueryPage>()
            .await
            .map_err(|e| EtlError::PermanentWarehouse(e.to_string()))
    }
}

fn classify_transport_error(e: &reqwest::Error) -> EtlError {
    if e.is_timeout() {
        EtlError::WarehouseTimeout(Duration::from_secs(300))
    } else if e.is_connect() {
        EtlError::TransientWarehouse(e.to_string())
    } else {
        EtlError::PermanentWarehouse(e.to_string())
    }
}

#[async_trait::async_trait]
impl WarehouseClient for BigQueryClient {
    async fn stream(&self, sql: &str, page_size: usize) -> Result<RowPageStream> {
        let first = self.run_query(sql, page_size, None).await?;
        let batch = rows_from_page(&first);

        // Subsequent pages are fetched lazily as the consumer drains the
        // stream, never eagerly materializing the full result set.
        struct PagingState {
            client: BigQueryClient,
            sql: String,
            page_size: usize,
            next_token: Option<String>,
            exhausted: bool,
        }

        let state = PagingState {
            client: self.clone(),
            sql: sql.to_string(),
            page_size,
            next_token: first.page_token.clone(),
            exhausted: first.page_token.is_none(),
        };

        let remaining = stream::unfold(state, move |mut state| async move {
            if state.exhausted {
                return None;
            }
            let token = state.next_token.clone();
            match state.client.run_query(&state.sql, state.page_size, token.as_deref()).await {
                Ok(page) => {
                    state.next_token = page.page_token.clone();
                    state.exhausted = page.page_token.is_none();
                    Some((Ok(rows_from_page(&page)), state))
                }
                Err(e) => {
                    state.exhausted = true;
                    Some((Err(e), state))
                }
            }
        });

        let initial = stream::once(async move { Ok(batch) });
        Ok(Box::pin(initial.chain(remaining)))
    }

    async fn test_connection(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.run_query("SELECT 1", 10, None))
            .await
            .map_err(|_| EtlError::WarehouseTimeout(timeout))??;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    rows: Vec<BqRow>,
    #[serde(default)]
    schema: Option<BqSchema>,
    #[serde(rename = "pageToken", default)]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BqSchema {
    fields: Vec<BqField>,
}

#[derive(Debug, Deserialize)]
struct BqField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct BqRow {
    f: Vec<BqCell>,
}

#[derive(Debug, Deserialize)]
struct BqCell {
    v: Option<serde_json::Value>,
}

fn rows_from_page(page: &QueryPage) -> RowBatch {
    let Some(schema) = &page.schema else {
        return Vec::new();
    };

    page.rows
        .iter()
        .map(|row| {
            let mut out: Row = Row::new();
            for (field, cell) in schema.fields.iter().zip(row.f.iter()) {
                out.insert(field.name.clone(), coerce_cell(&field.field_type, &cell.v));
            }
            out
        })
        .collect()
}

fn coerce_cell(field_type: &str, value: &Option<serde_json::Value>) -> RowValue {
    let Some(value) = value else {
        return RowValue::Null;
    };
    if value.is_null() {
        return RowValue::Null;
    }
    let as_str = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());

    match field_type.to_uppercase().as_str() {
        "INTEGER" | "INT64" => as_str
            .parse::<i64>()
            .map(RowValue::Int)
            .unwrap_or(RowValue::Null),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => as_str
            .parse::<f64>()
            .map(RowValue::Float)
            .unwrap_or(RowValue::Null),
        "BOOLEAN" | "BOOL" => as_str
            .parse::<bool>()
            .map(RowValue::Bool)
            .unwrap_or(RowValue::Null),
        "DATE" => NaiveDate::parse_from_str(&as_str, "%Y-%m-%d")
            .map(RowValue::Date)
            .unwrap_or(RowValue::Null),
        "TIMESTAMP" | "DATETIME" => parse_bq_timestamp(&as_str)
            .map(RowValue::Timestamp)
            .unwrap_or(RowValue::Null),
        _ => RowValue::Text(as_str),
    }
}

/// BigQuery returns TIMESTAMP values as Unix epoch seconds (with fractional
/// part); normalize to UTC.
fn parse_bq_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch_seconds) = raw.parse::<f64>() {
        let secs = epoch_seconds.trunc() as i64;
        let nanos = ((epoch_seconds.fract()) * 1e9) as u32;
        return DateTime::from_timestamp(secs, nanos);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_integer_cell() {
        let v = coerce_cell("INTEGER", &Some(serde_json::json!("42")));
        assert_eq!(v, RowValue::Int(42));
    }

    #[test]
    fn coerces_null_cell() {
        let v = coerce_cell("STRING", &None);
        assert_eq!(v, RowValue::Null);
    }

    #[test]
    fn parses_epoch_timestamp() {
        let dt = parse_bq_timestamp("1700000000.5").unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }
}
