//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use ledgerd_core::{
    CreditAccount, CreditEvent, CreditReservation, GenerationService, ReservationId,
    ReservationStatus, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::write::LedgerWrite;
use crate::Store;

/// `RocksDB`-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cf_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn scan_accounts<F>(&self, mut keep: F) -> Result<Vec<CreditAccount>>
    where
        F: FnMut(&CreditAccount) -> bool,
    {
        let cf = self.cf(cf::ACCOUNTS)?;
        let mut accounts = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let account: CreditAccount = Self::deserialize(&value)?;
            if keep(&account) {
                accounts.push(account);
            }
        }

        Ok(accounts)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Accounts
    // =========================================================================

    fn put_account(&self, account: &CreditAccount) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.user_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>> {
        self.get_cf_value(cf::ACCOUNTS, &keys::account_key(user_id))
    }

    fn list_accounts_with_reserved(&self) -> Result<Vec<CreditAccount>> {
        self.scan_accounts(|account| account.reserved_credits > 0)
    }

    fn list_accounts_with_active_subscription(&self) -> Result<Vec<CreditAccount>> {
        self.scan_accounts(CreditAccount::has_active_subscription)
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    fn get_reservation(&self, id: &ReservationId) -> Result<Option<CreditReservation>> {
        self.get_cf_value(cf::RESERVATIONS, &keys::reservation_key(id))
    }

    fn get_reservation_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CreditReservation>> {
        let cf = self.cf(cf::EXTERNAL_IDS)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf, keys::external_id_key(external_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let id = String::from_utf8(id_bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.get_reservation(&ReservationId::new(id))
    }

    fn list_open_reservations(
        &self,
        user_id: &UserId,
        service: Option<GenerationService>,
    ) -> Result<Vec<CreditReservation>> {
        let cf_by_user = self.cf(cf::RESERVATIONS_BY_USER)?;
        let prefix = keys::user_reservations_prefix(user_id);

        let mut reservations = Vec::new();

        // Forward iteration over the big-endian millis index yields oldest
        // first.
        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            let id = keys::extract_reservation_id_from_user_key(&key);
            let Some(reservation) = self.get_reservation(&id)? else {
                continue;
            };

            if reservation.status != ReservationStatus::Reserved {
                continue;
            }
            if let Some(service) = service {
                if reservation.service != service {
                    continue;
                }
            }

            reservations.push(reservation);
        }

        Ok(reservations)
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn get_event(&self, idempotency_key: &str) -> Result<Option<CreditEvent>> {
        self.get_cf_value(cf::EVENTS, &keys::event_key(idempotency_key))
    }

    fn list_events_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditEvent>> {
        let cf_by_user = self.cf(cf::EVENTS_BY_USER)?;
        let prefix = keys::user_events_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULIDs sort oldest first; collect then reverse for newest first.
        let mut event_keys: Vec<String> = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let idempotency_key = String::from_utf8(value.to_vec())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            event_keys.push(idempotency_key);
        }
        event_keys.reverse();

        let mut events = Vec::new();
        for idempotency_key in event_keys.into_iter().skip(offset) {
            if events.len() >= limit {
                break;
            }
            if let Some(event) = self.get_event(&idempotency_key)? {
                events.push(event);
            }
        }

        Ok(events)
    }

    // =========================================================================
    // Compound commit
    // =========================================================================

    fn commit(&self, write: LedgerWrite) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_reservations = self.cf(cf::RESERVATIONS)?;
        let cf_res_by_user = self.cf(cf::RESERVATIONS_BY_USER)?;
        let cf_events = self.cf(cf::EVENTS)?;
        let cf_events_by_user = self.cf(cf::EVENTS_BY_USER)?;
        let cf_external = self.cf(cf::EXTERNAL_IDS)?;

        // Uniqueness guards, re-checked inside the write path so a losing
        // racer gets a typed error instead of clobbering the winner.
        for event in &write.events {
            if self.get_event(&event.idempotency_key)?.is_some() {
                return Err(StoreError::DuplicateEvent {
                    key: event.idempotency_key.clone(),
                });
            }
        }

        if let Some(reservation_write) = &write.reservation {
            let id = &reservation_write.reservation.reservation_id;
            let stored = self.get_reservation(id)?;
            if reservation_write.new && stored.is_some() {
                return Err(StoreError::ReservationExists {
                    id: id.to_string(),
                });
            }
            // An update that raced a finalize would rewrite a settled row
            // with the pre-settlement snapshot it loaded.
            if !reservation_write.new
                && stored.is_some_and(|r| r.status != ReservationStatus::Reserved)
            {
                return Err(StoreError::ReservationClosed {
                    id: id.to_string(),
                });
            }
        }

        if let Some(external_id) = &write.external_id {
            let reservation = write
                .reservation
                .as_ref()
                .map(|w| &w.reservation)
                .ok_or_else(|| {
                    StoreError::Database("external id bind without a reservation write".into())
                })?;

            let existing = self
                .db
                .get_cf(&cf_external, keys::external_id_key(external_id))
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if let Some(bound) = existing {
                if bound != reservation.reservation_id.as_str().as_bytes() {
                    return Err(StoreError::ExternalIdConflict {
                        external_id: external_id.clone(),
                    });
                }
            }
        }

        let mut batch = WriteBatch::default();

        if let Some(account) = &write.account {
            let account_value = Self::serialize(account)?;
            batch.put_cf(&cf_accounts, keys::account_key(&account.user_id), &account_value);
        }

        if let Some(reservation_write) = &write.reservation {
            let reservation = &reservation_write.reservation;
            let value = Self::serialize(reservation)?;
            batch.put_cf(
                &cf_reservations,
                keys::reservation_key(&reservation.reservation_id),
                &value,
            );
            if reservation_write.new {
                batch.put_cf(&cf_res_by_user, keys::user_reservation_key_for(reservation), []);
            }
            if let Some(external_id) = &write.external_id {
                batch.put_cf(
                    &cf_external,
                    keys::external_id_key(external_id),
                    reservation.reservation_id.as_str().as_bytes(),
                );
            }
        }

        for event in &write.events {
            let value = Self::serialize(event)?;
            batch.put_cf(&cf_events, keys::event_key(&event.idempotency_key), &value);
            batch.put_cf(
                &cf_events_by_user,
                keys::user_event_key(&event.user_id, &event.id),
                event.idempotency_key.as_bytes(),
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
