//! Submission of finished match records to the result store.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};

use crate::{client::error::PersistenceError, dto::record::MatchRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination of final match records.
pub trait ResultSink: Send + Sync {
    /// Submit the record; the store merges it with any record already kept for the match.
    fn persist(&self, record: MatchRecord) -> BoxFuture<'static, Result<(), PersistenceError>>;
}

/// Result sink posting to `POST {base}/api/saveMatch`.
#[derive(Clone)]
pub struct HttpResultSink {
    client: Client,
    endpoint: Arc<str>,
}

impl HttpResultSink {
    /// Build a sink for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, PersistenceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(PersistenceError::Client)?;
        let endpoint = format!("{}/api/saveMatch", base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint: Arc::from(endpoint),
        })
    }

    /// Full URL records are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ResultSink for HttpResultSink {
    fn persist(&self, record: MatchRecord) -> BoxFuture<'static, Result<(), PersistenceError>> {
        let sink = self.clone();
        Box::pin(async move {
            let response = sink
                .client
                .post(sink.endpoint.as_ref())
                .json(&record)
                .send()
                .await
                .map_err(PersistenceError::Request)?;

            match response.status() {
                status if status.is_success() => {
                    info!(match_id = %record.match_id, "match record submitted");
                    Ok(())
                }
                StatusCode::CONFLICT => Err(PersistenceError::Conflict {
                    match_id: record.match_id,
                }),
                status => {
                    warn!(match_id = %record.match_id, %status, "result store refused the record");
                    Err(PersistenceError::Status { status })
                }
            }
        })
    }
}
