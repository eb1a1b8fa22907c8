/// InfluxDB v2 feed provider
use crate::{
    config::InfluxConfig,
    error::{DashboardError, DashboardResult},
    feeds::{FeedProvider, FeedResult, FeedTimestamp, FieldValue, Observation, SensorFeed, TimeRange},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reqwest::{header, Client, Url};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Columns the query engine adds that carry no sensor data
const METADATA_COLUMNS: [&str; 6] = ["", "result", "table", "_start", "_stop", "_measurement"];

/// Longest slice of an upstream error shown to users
const ERROR_DETAIL_CHARS: usize = 100;

/// Queries sensor feeds over the InfluxDB v2 HTTP API
#[derive(Clone)]
pub struct InfluxProvider {
    http_client: Client,
    query_url: Url,
    token: String,
    bucket: String,
}

impl InfluxProvider {
    pub fn new(config: &InfluxConfig) -> DashboardResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| DashboardError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let base = format!("{}/api/v2/query", config.url.trim_end_matches('/'));
        let query_url = Url::parse_with_params(&base, &[("org", config.org.as_str())])
            .map_err(|e| DashboardError::Validation(format!("Invalid InfluxDB URL: {}", e)))?;

        Ok(Self {
            http_client,
            query_url,
            token: config.token.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// Range, measurement filter, one column per field, oldest first
    fn feed_query(&self, feed: SensorFeed, range: TimeRange) -> String {
        format!(
            r#"from(bucket: "{bucket}")
  |> range(start: {range})
  |> filter(fn: (r) => r._measurement == "{measurement}")
  |> pivot(rowKey:["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> sort(columns: ["_time"], desc: false)"#,
            bucket = self.bucket,
            range = range.as_flux(),
            measurement = feed.measurement(),
        )
    }

    async fn run_query(&self, flux: &str) -> DashboardResult<String> {
        let body = json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": ["datatype"],
            },
        });

        let response = self
            .http_client
            .post(self.query_url.clone())
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .header(header::ACCEPT, "application/csv")
            .json(&body)
            .send()
            .await
            .map_err(|e| DashboardError::Provider(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DashboardError::Provider(e.to_string()))?;

        if !status.is_success() {
            return Err(DashboardError::Provider(format!("{}: {}", status, text.trim())));
        }
        Ok(text)
    }
}

#[async_trait]
impl FeedProvider for InfluxProvider {
    async fn fetch(&self, feed: SensorFeed, range: TimeRange) -> FeedResult {
        let measurement = feed.measurement();
        debug!("Querying {} over {}", measurement, range);

        match self.run_query(&self.feed_query(feed, range)).await {
            Ok(csv) => {
                let records = parse_annotated_csv(&csv);
                if records.is_empty() {
                    FeedResult::failed(feed, format!("No data available for {}", measurement))
                } else {
                    FeedResult::ok(feed, records)
                }
            }
            Err(e) => {
                let detail = match e {
                    DashboardError::Provider(detail) => detail,
                    other => other.to_string(),
                };
                warn!("Query for {} failed: {}", measurement, detail);
                let short: String = detail.chars().take(ERROR_DETAIL_CHARS).collect();
                FeedResult::failed(
                    feed,
                    format!("Database query error for {}: {}...", measurement, short),
                )
            }
        }
    }

    async fn ping(&self) -> DashboardResult<()> {
        let flux = format!(
            r#"from(bucket: "{}")
  |> range(start: -5m)
  |> limit(n: 1)"#,
            self.bucket
        );
        self.run_query(&flux).await.map(|_| ())
    }
}

/// Parse an annotated CSV query response into observations
///
/// The response may hold several tables, each preceded by its own
/// annotation and header rows. Rows come back sorted by time and numeric
/// gaps are filled forward, then with zero.
pub(crate) fn parse_annotated_csv(body: &str) -> Vec<Observation> {
    let mut records = Vec::new();
    let mut datatypes: Vec<String> = Vec::new();
    let mut header: Option<Vec<String>> = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            datatypes.clear();
            header = None;
            continue;
        }

        let cells = split_csv_line(line);
        if line.starts_with('#') {
            if cells.first().map(String::as_str) == Some("#datatype") {
                datatypes = cells;
            }
            header = None;
            continue;
        }

        let Some(columns) = header.as_ref() else {
            header = Some(cells);
            continue;
        };

        // Repeated header row between tables without a blank line
        if cells == *columns {
            continue;
        }

        let mut observation = Observation::new(None);
        for (index, (column, raw)) in columns.iter().zip(cells.iter()).enumerate() {
            if METADATA_COLUMNS.contains(&column.as_str()) {
                continue;
            }
            if column == "_time" {
                observation.time = parse_timestamp(raw);
                continue;
            }
            if raw.is_empty() {
                continue;
            }
            let datatype = datatypes.get(index).map(String::as_str).unwrap_or("");
            observation
                .values
                .insert(column.clone(), parse_value(raw, datatype));
        }
        records.push(observation);
    }

    records.sort_by_key(|r| r.time.map(|t| t.to_utc()));
    fill_numeric_gaps(&mut records);
    records
}

fn parse_timestamp(raw: &str) -> Option<FeedTimestamp> {
    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Some(FeedTimestamp::Aware(aware));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(FeedTimestamp::Naive)
}

fn parse_value(raw: &str, datatype: &str) -> FieldValue {
    match datatype {
        "double" | "long" | "unsignedLong" => raw
            .parse::<f64>()
            .map(FieldValue::Number)
            .unwrap_or_else(|_| FieldValue::Text(raw.to_string())),
        "boolean" => FieldValue::Bool(raw == "true"),
        "string" => FieldValue::Text(raw.to_string()),
        _ => {
            if let Ok(n) = raw.parse::<f64>() {
                FieldValue::Number(n)
            } else if let Ok(b) = raw.parse::<bool>() {
                FieldValue::Bool(b)
            } else {
                FieldValue::Text(raw.to_string())
            }
        }
    }
}

/// Carry the last numeric value forward into rows missing it; zero before the first
fn fill_numeric_gaps(records: &mut [Observation]) {
    let numeric_fields: Vec<String> = {
        let mut fields: Vec<String> = records
            .iter()
            .flat_map(|r| r.values.iter())
            .filter(|(_, v)| matches!(v, FieldValue::Number(_)))
            .map(|(k, _)| k.clone())
            .collect();
        fields.sort();
        fields.dedup();
        fields
    };

    let mut last: HashMap<&str, f64> = HashMap::new();
    for record in records.iter_mut() {
        for field in &numeric_fields {
            match record.values.get(field).and_then(FieldValue::as_f64) {
                Some(value) => {
                    last.insert(field.as_str(), value);
                }
                None if !record.values.contains_key(field) => {
                    let value = last.get(field.as_str()).copied().unwrap_or(0.0);
                    record.values.insert(field.clone(), FieldValue::Number(value));
                }
                None => {}
            }
        }
    }
}

/// Split one CSV line, honouring double-quoted cells
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,string,double,double,string\r
,result,table,_start,_stop,_time,_measurement,humidity,temperature,device\r
,_result,0,2024-05-01T00:00:00Z,2024-05-02T00:00:00Z,2024-05-01T10:05:00Z,environment,55.5,24.1,\"dht11, lab\"\r
,_result,0,2024-05-01T00:00:00Z,2024-05-02T00:00:00Z,2024-05-01T10:00:00Z,environment,,23.9,dht11\r
,_result,0,2024-05-01T00:00:00Z,2024-05-02T00:00:00Z,2024-05-01T10:10:00Z,environment,,24.3,dht11\r
\r
";

    fn config(url: &str) -> InfluxConfig {
        InfluxConfig {
            url: url.to_string(),
            token: "token".to_string(),
            org: "Campus Org".to_string(),
            bucket: "sensor-data".to_string(),
            timeout: 1,
            cache_ttl: 0,
        }
    }

    #[test]
    fn test_parse_annotated_csv() {
        let records = parse_annotated_csv(SAMPLE);
        assert_eq!(records.len(), 3);

        // Sorted ascending
        let first = &records[0];
        assert_eq!(
            first.time.unwrap().to_utc().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
        assert_eq!(first.values["temperature"], FieldValue::Number(23.9));
        assert!(!first.values.contains_key("_measurement"));
        assert!(!first.values.contains_key("result"));

        assert_eq!(
            records[1].values["device"],
            FieldValue::Text("dht11, lab".to_string())
        );
    }

    #[test]
    fn test_numeric_gaps_are_filled() {
        let records = parse_annotated_csv(SAMPLE);
        // No humidity before 10:05, carried forward after it
        assert_eq!(records[0].values["humidity"], FieldValue::Number(0.0));
        assert_eq!(records[1].values["humidity"], FieldValue::Number(55.5));
        assert_eq!(records[2].values["humidity"], FieldValue::Number(55.5));
    }

    #[test]
    fn test_multiple_tables() {
        let body = "#datatype,string,long,dateTime:RFC3339,boolean\n\
,result,table,_time,door_open\n\
,_result,0,2024-05-01T10:00:00Z,true\n\
\n\
#datatype,string,long,dateTime:RFC3339,string\n\
,result,table,_time,card_id\n\
,_result,1,2024-05-01T09:00:00Z,A1B2\n";
        let records = parse_annotated_csv(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].values["card_id"], FieldValue::Text("A1B2".to_string()));
        assert_eq!(records[1].values["door_open"], FieldValue::Bool(true));
    }

    #[test]
    fn test_empty_response() {
        assert!(parse_annotated_csv("").is_empty());
        assert!(parse_annotated_csv("\r\n").is_empty());
    }

    #[test]
    fn test_query_shape() {
        let provider = InfluxProvider::new(&config("http://localhost:8086/")).unwrap();
        let flux = provider.feed_query(SensorFeed::Classroom, TimeRange::Last6Hours);
        assert!(flux.contains(r#"from(bucket: "sensor-data")"#));
        assert!(flux.contains("range(start: -6h)"));
        assert!(flux.contains(r#"r._measurement == "classroom""#));
        assert!(flux.contains("desc: false"));
        assert_eq!(
            provider.query_url.as_str(),
            "http://localhost:8086/api/v2/query?org=Campus+Org"
        );
    }

    #[tokio::test]
    async fn test_unreachable_database_is_feed_error() {
        // Port 9 (discard) is closed on test hosts
        let provider = InfluxProvider::new(&config("http://127.0.0.1:9")).unwrap();
        let result = provider.fetch(SensorFeed::Environment, TimeRange::LastHour).await;

        assert!(result.records.is_empty());
        let error = result.error.unwrap();
        assert!(error.starts_with("Database query error for environment: "));
        assert!(error.ends_with("..."));
        assert!(provider.ping().await.is_err());
    }
}
