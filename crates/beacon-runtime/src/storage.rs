use tracing::{debug, warn};

use beacon_types::{KeepPolicy, MetaMap, ModuleTarget, StorageEntry, StorageScope};

use crate::error::{Error, Result};
use crate::session::Session;

/// Name of the persisted module-cursor entry (user-scoped).
const MODULE_CURSOR_ENTRY: &str = "module_cursor";

/// Storage policy engine: key-value persistence with keep-latest vs
/// append-history semantics. Writes are local-first and always succeed
/// locally; the remote copy is best-effort while a session exists.
impl Session {
    /// Write an entry under the given policy.
    ///
    /// Scope `User` additionally requires a signed-in identity for the
    /// remote write; without one only the local write happens.
    pub async fn set_entry(
        &self,
        name: &str,
        data: MetaMap,
        scope: StorageScope,
        policy: KeepPolicy,
    ) -> Result<()> {
        let now = self.clock.now();
        {
            let store = self.store.lock().await;
            store.put_entry(scope, name, policy, &data, now.millis)?;
        }

        if !self.is_authenticated().await {
            return Ok(());
        }
        if scope == StorageScope::User && self.user_id.read().await.is_none() {
            debug!(name, "No user identity, skipping remote storage write");
            return Ok(());
        }

        let entry = StorageEntry::new(&self.clock, name, policy, data)
            .with_origin(scope.as_str());
        match self
            .transport
            .post(&[entry], beacon_transport::PostMode::Batch)
            .await
        {
            Ok(beacon_transport::PostOutcome::Delivered) => {}
            Ok(beacon_transport::PostOutcome::Reauthenticated) => {
                debug!(name, "Remote storage write deferred by re-authentication");
            }
            Err(err) => {
                warn!(name, error = %err, "Remote storage write failed");
            }
        }
        Ok(())
    }

    /// Read an entry: local store first, network fallback afterwards.
    ///
    /// Scope `User` without an identity still reads remotely on a
    /// read-only best-effort basis (the result is not cached).
    pub async fn get_entry(&self, name: &str, scope: StorageScope) -> Result<Vec<MetaMap>> {
        let local = {
            let store = self.store.lock().await;
            store.get_entries(scope, name)?
        };
        if !local.is_empty() {
            return Ok(local);
        }

        if self.is_authenticated().await {
            let read_only = scope == StorageScope::User && self.user_id.read().await.is_none();
            match self
                .transport
                .get::<StorageEntry>(vec![
                    ("name".to_string(), name.to_string()),
                    ("scope".to_string(), scope.as_str().to_string()),
                ])
                .await
            {
                Ok(entries) if !entries.is_empty() => {
                    let payloads: Vec<MetaMap> = entries
                        .iter()
                        .map(|entry| entry.container.payload().clone())
                        .collect();
                    if !read_only {
                        let store = self.store.lock().await;
                        for entry in &entries {
                            store.put_entry(
                                scope,
                                name,
                                entry.keep_policy,
                                entry.container.payload(),
                                entry.base.precise_timestamp,
                            )?;
                        }
                    }
                    return Ok(payloads);
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(name, error = %err, "Remote storage read failed");
                }
            }
        }

        Err(Error::NotFound(name.to_string()))
    }

    /// Remove one entry locally, best-effort remotely.
    pub async fn remove_entry(&self, name: &str, scope: StorageScope) -> Result<()> {
        {
            let store = self.store.lock().await;
            store.remove_entry(scope, name)?;
        }
        self.remote_delete(vec![
            ("name".to_string(), name.to_string()),
            ("scope".to_string(), scope.as_str().to_string()),
        ])
        .await;
        Ok(())
    }

    /// Remove every entry of a scope locally, best-effort remotely.
    pub async fn remove_all(&self, scope: StorageScope) -> Result<()> {
        {
            let store = self.store.lock().await;
            store.remove_all(scope)?;
        }
        self.remote_delete(vec![("scope".to_string(), scope.as_str().to_string())])
            .await;
        Ok(())
    }

    async fn remote_delete(&self, query: Vec<(String, String)>) {
        if !self.is_authenticated().await {
            return;
        }
        if let Err(err) = self.transport.delete::<StorageEntry>(query).await {
            warn!(error = %err, "Remote storage delete failed");
        }
    }

    // --- module sequencing ---

    /// Module at the cursor, advancing and persisting the new position.
    pub async fn next_module(&self) -> Option<ModuleTarget> {
        let (next, cursor) = {
            let mut modules = self.modules.lock().await;
            let next = modules.next();
            (next, modules.cursor())
        };
        if next.is_some() {
            self.persist_module_cursor(cursor).await;
        }
        next
    }

    /// Module at the cursor without advancing.
    pub async fn peek_module(&self) -> Option<ModuleTarget> {
        self.modules.lock().await.peek().cloned()
    }

    /// Rewind the module cursor and clear its persisted copy.
    pub async fn clear_modules(&self) -> Result<()> {
        self.modules.lock().await.clear();
        self.remove_entry(MODULE_CURSOR_ENTRY, StorageScope::User)
            .await
    }

    async fn persist_module_cursor(&self, cursor: usize) {
        let mut payload = MetaMap::new();
        payload.set("position", cursor.to_string());
        if let Err(err) = self
            .set_entry(
                MODULE_CURSOR_ENTRY,
                payload,
                StorageScope::User,
                KeepPolicy::KeepLatest,
            )
            .await
        {
            warn!(error = %err, "Failed to persist module cursor");
        }
    }

    /// Restore the persisted cursor position from the local store.
    pub(crate) async fn restore_module_cursor(&self) {
        let local = {
            let store = self.store.lock().await;
            store.get_entries(StorageScope::User, MODULE_CURSOR_ENTRY)
        };
        let Ok(entries) = local else {
            return;
        };
        let position = entries
            .last()
            .and_then(|payload| payload.get("position"))
            .and_then(|text| text.parse::<usize>().ok());
        if let Some(position) = position {
            self.modules.lock().await.set_cursor(position);
        }
    }
}
