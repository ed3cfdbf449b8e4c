//! One-time license issuance
//!
//! The serial-number annotation is the only guard: when present no call is
//! made. When absent the issuer is resolved, the authority is called once and
//! the serial is persisted on the LicensedServer before anything else runs.

use keel_store::{Api, ObjectStore, StoreError};
use keel_types::{LicenseIssuer, LicensedServer, ObjectKey, Resource, SerialNumber};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::{ControllerError, Result};
use crate::license::LicenseAuthority;

/// Attempts at persisting a freshly issued serial before giving up
const PERSIST_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// Annotation was already present; nothing was called
    AlreadyIssued(SerialNumber),
    /// Authority was called and the serial persisted
    Issued(SerialNumber),
}

impl IssuanceOutcome {
    pub fn serial(&self) -> &SerialNumber {
        match self {
            IssuanceOutcome::AlreadyIssued(s) | IssuanceOutcome::Issued(s) => s,
        }
    }
}

/// Ensures every LicensedServer carries a serial number
#[derive(Clone)]
pub struct LicenseIssuance {
    issuers: Api<LicenseIssuer>,
    servers: Api<LicensedServer>,
    authority: Arc<dyn LicenseAuthority>,
}

impl LicenseIssuance {
    pub fn new(store: Arc<dyn ObjectStore>, authority: Arc<dyn LicenseAuthority>) -> Self {
        Self {
            issuers: Api::new(Arc::clone(&store)),
            servers: Api::new(store),
            authority,
        }
    }

    /// Issue and persist a serial if `server` has none. On return `server`
    /// reflects the stored object.
    #[instrument(skip(self, server), fields(key = %server.key()))]
    pub async fn ensure_serial(&self, server: &mut LicensedServer) -> Result<IssuanceOutcome> {
        if let Some(serial) = server.serial_number() {
            return Ok(IssuanceOutcome::AlreadyIssued(serial));
        }

        let issuer_key = ObjectKey::new(
            server.metadata.namespace.clone(),
            server.spec.license.issuer.clone(),
        );
        let issuer = self.issuers.get(&issuer_key).await?.ok_or_else(|| {
            ControllerError::dependency_not_ready(format!("LicenseIssuer {issuer_key}"))
        })?;

        let serial = self
            .authority
            .create_license(&issuer.spec.auth, &server.spec.license.features)
            .await?;
        info!(issuer = %issuer_key, "License issued");

        let (stored, outcome) = self.persist(server, serial).await?;
        *server = stored;
        Ok(outcome)
    }

    /// Write the annotation, re-fetching on conflict so the issued serial is
    /// not lost to an unrelated concurrent write. A serial found on the
    /// re-fetched object wins over the one just issued.
    async fn persist(
        &self,
        server: &LicensedServer,
        serial: SerialNumber,
    ) -> Result<(LicensedServer, IssuanceOutcome)> {
        let key = server.key();
        let mut current = server.clone();

        for attempt in 1..=PERSIST_ATTEMPTS {
            if let Some(existing) = current.serial_number() {
                warn!(key = %key, existing = %existing, discarded = %serial, "Serial already present, keeping stored value");
                return Ok((current, IssuanceOutcome::AlreadyIssued(existing)));
            }

            current.set_serial_number(&serial);
            let result = self.servers.update(&current).await;
            match result {
                Ok(updated) => return Ok((updated, IssuanceOutcome::Issued(serial))),
                Err(StoreError::Conflict { .. }) if attempt < PERSIST_ATTEMPTS => {
                    warn!(key = %key, attempt, "Conflict persisting serial, re-fetching");
                    current = self.servers.get(&key).await?.ok_or_else(|| {
                        ControllerError::Internal(format!("{key} vanished while persisting serial"))
                    })?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ControllerError::Internal(format!(
            "could not persist serial for {key}"
        )))
    }
}
