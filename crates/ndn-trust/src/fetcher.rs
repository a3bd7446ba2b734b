//! Certificate retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use ndn_packet::{Data, Interest};
use tracing::{debug, instrument, warn};

use crate::error::{ValidationError, ValidationErrorCode};
use crate::storage::IdentityStorage;

/// What the network answered to one Interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Data(Data),
    Nack,
    Timeout,
}

/// The transport: sends an Interest and reports exactly one outcome.
#[async_trait]
pub trait Face: Send + Sync {
    async fn express_interest(&self, interest: Interest) -> FetchOutcome;
}

/// Retrieves the certificate a KeyLocator points at.
#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    async fn fetch(&self, interest: Interest) -> Result<Data, ValidationError>;
}

fn cannot_fetch(interest: &Interest) -> ValidationError {
    ValidationError::new(
        ValidationErrorCode::CannotRetrieveCertificate,
        format!("Cannot fetch cert: {}", interest.name),
    )
}

/// Fetches through a [`Face`], retrying with a fresh nonce after a Nack or
/// timeout.
#[derive(Clone)]
pub struct NetworkFetcher {
    face: Arc<dyn Face>,
    retries: u32,
}

impl std::fmt::Debug for NetworkFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkFetcher")
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl NetworkFetcher {
    /// At most `retries + 1` Interests are sent per fetch.
    #[must_use]
    pub fn new(face: Arc<dyn Face>, retries: u32) -> Self {
        Self { face, retries }
    }
}

#[async_trait]
impl CertificateFetcher for NetworkFetcher {
    #[instrument(skip(self, interest), fields(name = %interest.name))]
    async fn fetch(&self, mut interest: Interest) -> Result<Data, ValidationError> {
        let mut attempt = 0;
        loop {
            debug!(attempt, "expressing certificate Interest");
            // The Face owns timeouts, but a Face that never answers must not
            // stall validation.
            let outcome = tokio::time::timeout(
                interest.lifetime,
                self.face.express_interest(interest.clone()),
            )
            .await
            .unwrap_or(FetchOutcome::Timeout);

            let failure = match outcome {
                FetchOutcome::Data(data) => return Ok(data),
                FetchOutcome::Nack => "nack",
                FetchOutcome::Timeout => "timeout",
            };

            if attempt >= self.retries {
                warn!(attempts = attempt + 1, "giving up on certificate");
                return Err(cannot_fetch(&interest));
            }
            attempt += 1;
            warn!(reason = failure, attempt, "retrying certificate Interest");
            interest.refresh_nonce();
        }
    }
}

/// Never fetches; only trust anchors and cached certificates can be used.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl CertificateFetcher for OfflineFetcher {
    async fn fetch(&self, interest: Interest) -> Result<Data, ValidationError> {
        debug!(name = %interest.name, "offline, not fetching certificate");
        Err(cannot_fetch(&interest))
    }
}

/// Serves certificates from local identity storage.
#[derive(Clone)]
pub struct StorageFetcher {
    storage: Arc<dyn IdentityStorage>,
}

impl std::fmt::Debug for StorageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFetcher").finish_non_exhaustive()
    }
}

impl StorageFetcher {
    #[must_use]
    pub fn new(storage: Arc<dyn IdentityStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl CertificateFetcher for StorageFetcher {
    async fn fetch(&self, interest: Interest) -> Result<Data, ValidationError> {
        match self.storage.get_certificate(&interest.name) {
            Ok(cert) => Ok(cert.into_data()),
            Err(e) => {
                debug!(name = %interest.name, error = %e, "certificate not in storage");
                Err(cannot_fetch(&interest))
            }
        }
    }
}
