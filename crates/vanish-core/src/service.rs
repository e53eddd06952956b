//! Drop service
//!
//! Orchestrates creation, retrieval, password verification, download and
//! deletion over the storage traits. Synchronous and free of I/O of its own:
//! the server crate puts it behind HTTP and a sweeper task, tests drive it
//! directly.
//!
//! # Retrieval order
//!
//! A fetch runs the gates in a fixed order: token, existence, expiry,
//! password. Content is delivered before the scan counter moves, so a failed
//! delivery never consumes a scan.
//!
//! # Deadlines
//!
//! A service bound to a [`Deadline`] with [`DropService::under`] claims it
//! before its first write. Once the caller has abandoned the request every
//! operation fails with `StorageError::Timeout` before its first write.

use vanish_crypto::{
    Envelope, KeyMaterial, SealRandomness, TAG_SIZE, decrypt_envelope, encrypt_envelope,
};

use crate::{
    broker::{AccessGrant, TokenBroker},
    config::ServiceConfig,
    deadline::Deadline,
    env::{Environment, duration_millis},
    error::DropError,
    expiry::{Access, ExpiryEngine, SweepReport, expiry_reason},
    gate::PasswordGate,
    model::{
        Counter, DeliveredContent, Delivery, DropId, DropRecord, DropStatus, ExpiryPolicy,
        FetchOutcome, FetchRequest, NewContent, NewDrop, NewFile, ObjectBody, ObjectPointer,
        OwnerId, Payload, PlainContent, Protection, SealedContent, SessionId, StoredObject,
        TokenValue,
    },
    storage::{DropStore, ObjectStore, Retrying},
};

/// A blob waiting to be written to object storage.
struct Upload {
    key: String,
    bytes: Vec<u8>,
}

/// The drop service.
///
/// Cheap to clone: clones share the same backends.
#[derive(Clone)]
pub struct DropService<E, S, O> {
    env: E,
    store: Retrying<S>,
    objects: Retrying<O>,
    broker: TokenBroker<E, Retrying<S>>,
    gate: PasswordGate<E, Retrying<S>>,
    engine: ExpiryEngine<Retrying<S>, Retrying<O>>,
    config: ServiceConfig,
    deadline: Option<Deadline>,
}

impl<E: Environment, S: DropStore, O: ObjectStore> DropService<E, S, O> {
    /// Service over the given environment and backends.
    pub fn new(env: E, store: S, objects: O, config: ServiceConfig) -> Self {
        let store = Retrying::new(store, config.storage_attempts);
        let objects = Retrying::new(objects, config.storage_attempts);

        Self {
            broker: TokenBroker::new(env.clone(), store.clone(), config.token_ttl),
            gate: PasswordGate::new(
                env.clone(),
                store.clone(),
                config.password,
                config.clearance_ttl,
            ),
            engine: ExpiryEngine::new(store.clone(), objects.clone()),
            env,
            store,
            objects,
            config,
            deadline: None,
        }
    }

    /// Clone of this service whose writes are gated on `deadline`.
    pub fn under(&self, deadline: Deadline) -> Self {
        Self { deadline: Some(deadline), ..self.clone() }
    }

    /// Active configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Environment the service reads time and randomness from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Create a drop and return its id.
    ///
    /// Standard content is sealed here under a fresh retained key. Secure
    /// content arrives sealed and is stored untouched.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: zero ceiling, deadline not in the future, empty
    ///   content, secure content without its id, malformed sealed bytes
    /// - `AlreadyExists`: the requested id is taken
    pub fn create_drop(&self, request: NewDrop) -> Result<DropId, DropError> {
        let now_ms = self.env.wall_clock_millis();
        validate_policy(&request, now_ms)?;

        let id = match (&request.content, request.id) {
            (_, Some(id)) => id,
            (NewContent::Standard(_), None) => DropId::random(&self.env),
            (NewContent::Secure(_), None) => {
                return Err(DropError::invalid("secure content must name the drop id it is bound to"));
            },
        };
        if self.store.load_drop(id)?.is_some() {
            return Err(DropError::AlreadyExists);
        }

        let password_hash = request.password.as_deref().map(|p| self.gate.hash(p)).transpose()?;

        let (payload, protection, uploads) = match request.content {
            NewContent::Standard(content) => self.seal_standard(id, content)?,
            NewContent::Secure(content) => accept_sealed(id, content)?,
        };
        let keys: Vec<String> = uploads.iter().map(|u| u.key.clone()).collect();
        self.commit()?;
        self.put_objects(uploads)?;

        let record = DropRecord {
            id,
            owner: request.owner,
            payload,
            protection,
            expiry: request.expiry,
            max_scans: request.max_scans,
            max_downloads: request.max_downloads,
            scan_count: 0,
            download_count: 0,
            password_hash,
            created_at_ms: now_ms,
            expired_at_ms: None,
        };

        match self.store.insert_drop(&record) {
            Ok(true) => {},
            Ok(false) => {
                self.discard_objects(&keys);
                return Err(DropError::AlreadyExists);
            },
            Err(err) => {
                self.discard_objects(&keys);
                return Err(err.into());
            },
        }

        tracing::info!(
            drop_id = %id,
            kind = ?record.kind(),
            secure = record.is_secure(),
            password = record.is_password_protected(),
            expiry = ?record.expiry,
            "drop created"
        );
        Ok(id)
    }

    /// Mint a token for `drop_id`, or confirm that `presented` is still live.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such drop
    pub fn request_access(
        &self,
        drop_id: DropId,
        presented: Option<&TokenValue>,
    ) -> Result<AccessGrant, DropError> {
        self.load(drop_id)?;
        self.commit()?;
        self.broker.request_access(drop_id, presented)
    }

    /// Retrieve a drop.
    ///
    /// Without a token, mints one and returns it instead of content. With a
    /// token, redeems it, enforces expiry and the password gate, delivers and
    /// then counts the scan.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such drop
    /// - `AccessDenied`: token absent from storage, foreign or expired
    /// - `Expired`: drop expired; it has been purged
    /// - `PasswordRequired`: password set and the session is not cleared
    /// - `DecryptionFailed`: stored content no longer opens
    pub fn fetch_drop(&self, request: FetchRequest) -> Result<FetchOutcome, DropError> {
        let drop_id = request.drop_id;

        let Some(token) = request.token else {
            self.load(drop_id)?;
            self.commit()?;
            let minted = self.broker.mint(drop_id)?;
            return Ok(FetchOutcome::TokenIssued {
                token: minted.token,
                expires_at_ms: minted.expires_at_ms,
            });
        };

        self.commit()?;
        self.broker.redeem(drop_id, &token)?;

        let record = self.load(drop_id)?;
        let now_ms = self.env.wall_clock_millis();
        self.engine.check(&record, now_ms, Access::Scan)?;
        self.gate.ensure_cleared(&record, request.session)?;

        let content = self.deliver(&record, now_ms)?;

        let mut status = record.status();
        if let Some(scan_count) = self.store.increment_counter(drop_id, Counter::Scans)? {
            status.scan_count = scan_count;
        }

        tracing::info!(%drop_id, scan_count = status.scan_count, "drop delivered");
        Ok(FetchOutcome::Delivered(Delivery { status, content }))
    }

    /// Check a password and, on success, clear `session` for this drop.
    ///
    /// Returns `true` for drops without a password.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such drop
    /// - `Expired`: drop expired; it has been purged
    pub fn verify_password(
        &self,
        drop_id: DropId,
        password: &str,
        session: SessionId,
    ) -> Result<bool, DropError> {
        let record = self.load(drop_id)?;
        self.engine.check(&record, self.env.wall_clock_millis(), Access::Inspect)?;
        self.commit()?;
        self.gate.verify(&record, password, session)
    }

    /// Issue temporary URLs for every file of a drop and count the download.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such drop
    /// - `Expired`: drop expired; it has been purged
    /// - `PasswordRequired`: password set and the session is not cleared
    /// - `InvalidRequest`: the drop has no files
    pub fn download(
        &self,
        drop_id: DropId,
        session: Option<SessionId>,
    ) -> Result<Vec<ObjectPointer>, DropError> {
        let record = self.load(drop_id)?;
        let now_ms = self.env.wall_clock_millis();
        self.engine.check(&record, now_ms, Access::Download)?;
        self.gate.ensure_cleared(&record, session)?;

        if record.objects().is_empty() {
            return Err(DropError::invalid("drop has no files to download"));
        }
        let pointers = self.pointers(&record, now_ms)?;

        self.commit()?;
        let download_count = self.store.increment_counter(drop_id, Counter::Downloads)?;
        tracing::info!(%drop_id, ?download_count, files = pointers.len(), "download issued");
        Ok(pointers)
    }

    /// Delete a drop with full cascade. Deleting a missing drop succeeds.
    pub fn delete_drop(&self, drop_id: DropId) -> Result<(), DropError> {
        if let Some(record) = self.store.load_drop(drop_id)? {
            self.commit()?;
            self.engine.remove(&record)?;
        }
        Ok(())
    }

    /// Metadata and counters, with no side effects.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such drop
    /// - `Expired`: drop is expired (left for the next access or the sweep)
    pub fn check_drop(&self, drop_id: DropId) -> Result<DropStatus, DropError> {
        let record = self.load(drop_id)?;
        if expiry_reason(&record, self.env.wall_clock_millis(), Access::Inspect).is_some() {
            return Err(DropError::Expired);
        }
        Ok(record.status())
    }

    /// Ids of every stored drop.
    pub fn list_drops(&self) -> Result<Vec<DropId>, DropError> {
        Ok(self.store.list_drops()?)
    }

    /// Status of every live drop created by `owner`.
    pub fn drops_owned_by(&self, owner: &OwnerId) -> Result<Vec<DropStatus>, DropError> {
        let now_ms = self.env.wall_clock_millis();
        let mut owned = Vec::new();
        for id in self.store.list_drops()? {
            let Some(record) = self.store.load_drop(id)? else {
                continue;
            };
            if record.owner.as_ref() == Some(owner)
                && expiry_reason(&record, now_ms, Access::Inspect).is_none()
            {
                owned.push(record.status());
            }
        }
        owned.sort_by_key(|s| s.created_at_ms);
        Ok(owned)
    }

    /// Serve the bytes behind a temporary URL.
    ///
    /// Standard drops are decrypted with the retained key; secure drops are
    /// returned sealed. No counter moves.
    ///
    /// # Errors
    ///
    /// - `AccessDenied`: bad signature, past deadline or foreign key shape
    /// - `NotFound`: the drop or blob is gone
    /// - `Expired`: drop expired; it has been purged
    pub fn open_pointer(
        &self,
        key: &str,
        expires_at_ms: u64,
        signature: &str,
    ) -> Result<ObjectBody, DropError> {
        let now_ms = self.env.wall_clock_millis();
        if now_ms >= expires_at_ms {
            tracing::warn!("expired object pointer presented");
            return Err(DropError::AccessDenied);
        }
        if !self.objects.verify_temporary_url(key, expires_at_ms, signature) {
            tracing::warn!("object pointer signature rejected");
            return Err(DropError::AccessDenied);
        }
        let (drop_id, index) = DropId::parse_object_key(key).ok_or(DropError::AccessDenied)?;

        let record = self.load(drop_id)?;
        self.engine.check(&record, now_ms, Access::Retrieve)?;

        let object = record
            .objects()
            .get(index)
            .filter(|o| o.storage_key == key)
            .ok_or(DropError::NotFound)?;
        let bytes = self.objects.get(key)?.ok_or(DropError::NotFound)?;

        let (bytes, sealed) = match &record.protection {
            Protection::Standard { key: master } => {
                let envelope = Envelope::from_bytes(&bytes)?;
                (decrypt_envelope(&envelope, master, &drop_id.file_content_id(index))?, false)
            },
            Protection::Secure => (bytes, true),
        };

        Ok(ObjectBody {
            name: object.original_name.clone(),
            mime_type: object.mime_type.clone(),
            bytes,
            sealed,
        })
    }

    /// Run one sweep pass now.
    pub fn sweep(&self) -> Result<SweepReport, DropError> {
        let report = self.engine.sweep(self.env.wall_clock_millis())?;
        if report.drops_purged + report.tokens_removed + report.clearances_removed > 0 {
            tracing::info!(
                purged = report.drops_purged,
                tokens = report.tokens_removed,
                clearances = report.clearances_removed,
                failures = report.purge_failures + report.cleanup_failures,
                "sweep reclaimed expired records"
            );
        }
        Ok(report)
    }

    /// Claim the deadline, if any, before a write.
    fn commit(&self) -> Result<(), DropError> {
        if let Some(deadline) = &self.deadline {
            deadline.commit()?;
        }
        Ok(())
    }

    fn load(&self, drop_id: DropId) -> Result<DropRecord, DropError> {
        self.store.load_drop(drop_id)?.ok_or(DropError::NotFound)
    }

    fn randomness(&self) -> SealRandomness {
        SealRandomness { iv: self.env.random_array(), salt: self.env.random_array() }
    }

    fn seal_standard(
        &self,
        id: DropId,
        content: PlainContent,
    ) -> Result<(Payload, Protection, Vec<Upload>), DropError> {
        let master = KeyMaterial::from_bytes(self.env.random_array());
        let seal =
            |bytes: &[u8], content_id: &str| encrypt_envelope(bytes, &master, content_id, self.randomness());

        let mut uploads = Vec::new();
        let mut seal_files = |files: Vec<NewFile>| -> Vec<StoredObject> {
            files
                .into_iter()
                .enumerate()
                .map(|(index, file)| {
                    let key = id.object_key(index);
                    let sealed = seal(&file.bytes, &id.file_content_id(index));
                    uploads.push(Upload { key: key.clone(), bytes: sealed.to_bytes() });
                    StoredObject {
                        storage_key: key,
                        original_name: file.name,
                        mime_type: file.mime_type,
                        size: file.bytes.len() as u64,
                    }
                })
                .collect()
        };

        let payload = match content {
            PlainContent::File(file) => {
                let mut objects = seal_files(vec![file]);
                match objects.pop() {
                    Some(object) => Payload::File { object },
                    None => return Err(DropError::invalid("file drop needs a file")),
                }
            },
            PlainContent::Bundle(files) => {
                if files.is_empty() {
                    return Err(DropError::invalid("bundle needs at least one file"));
                }
                Payload::Bundle { objects: seal_files(files) }
            },
            PlainContent::Text(text) => {
                Payload::Text { body: seal(text.as_bytes(), &id.text_content_id()) }
            },
            PlainContent::Url(links) => {
                if links.is_empty() || links.iter().any(String::is_empty) {
                    return Err(DropError::invalid("url drop needs non-empty links"));
                }
                let links = links
                    .iter()
                    .enumerate()
                    .map(|(index, link)| seal(link.as_bytes(), &id.link_content_id(index)))
                    .collect();
                Payload::Url { links }
            },
        };

        Ok((payload, Protection::Standard { key: master }, uploads))
    }

    fn deliver(&self, record: &DropRecord, now_ms: u64) -> Result<DeliveredContent, DropError> {
        let id = record.id;
        match (&record.protection, &record.payload) {
            (Protection::Standard { key }, Payload::Text { body }) => {
                let plain = decrypt_envelope(body, key, &id.text_content_id())?;
                Ok(DeliveredContent::Text(utf8(plain)?))
            },
            (Protection::Standard { key }, Payload::Url { links }) => {
                let links = links
                    .iter()
                    .enumerate()
                    .map(|(index, link)| -> Result<String, DropError> {
                        utf8(decrypt_envelope(link, key, &id.link_content_id(index))?)
                    })
                    .collect::<Result<_, _>>()?;
                Ok(DeliveredContent::Url(links))
            },
            (Protection::Standard { .. }, Payload::File { .. } | Payload::Bundle { .. }) => {
                Ok(DeliveredContent::Files(self.pointers(record, now_ms)?))
            },
            (Protection::Secure, Payload::Text { body }) => {
                Ok(DeliveredContent::SealedText(body.clone()))
            },
            (Protection::Secure, Payload::Url { links }) => {
                Ok(DeliveredContent::SealedUrl(links.clone()))
            },
            (Protection::Secure, Payload::File { .. } | Payload::Bundle { .. }) => {
                Ok(DeliveredContent::SealedFiles(self.pointers(record, now_ms)?))
            },
        }
    }

    fn pointers(&self, record: &DropRecord, now_ms: u64) -> Result<Vec<ObjectPointer>, DropError> {
        let expires_at_ms = now_ms.saturating_add(duration_millis(self.config.pointer_ttl));
        record
            .objects()
            .iter()
            .map(|object| -> Result<ObjectPointer, DropError> {
                Ok(ObjectPointer {
                    name: object.original_name.clone(),
                    mime_type: object.mime_type.clone(),
                    size: object.size,
                    url: self.objects.create_temporary_url(&object.storage_key, expires_at_ms)?,
                    expires_at_ms,
                })
            })
            .collect()
    }

    fn put_objects(&self, uploads: Vec<Upload>) -> Result<(), DropError> {
        let mut written = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if let Err(err) = self.objects.put(&upload.key, &upload.bytes) {
                self.discard_objects(&written);
                return Err(err.into());
            }
            written.push(upload.key);
        }
        Ok(())
    }

    fn discard_objects(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        if let Err(err) = self.objects.delete(keys) {
            tracing::warn!(error = %err, orphans = keys.len(), "failed to discard uploaded objects");
        }
    }
}

fn validate_policy(request: &NewDrop, now_ms: u64) -> Result<(), DropError> {
    if request.max_scans == Some(0) || request.max_downloads == Some(0) {
        return Err(DropError::invalid("scan and download ceilings must be at least one"));
    }
    if let ExpiryPolicy::At { expires_at_ms } = request.expiry {
        if expires_at_ms <= now_ms {
            return Err(DropError::invalid("expiry deadline must be in the future"));
        }
    }
    Ok(())
}

fn accept_sealed(
    id: DropId,
    content: SealedContent,
) -> Result<(Payload, Protection, Vec<Upload>), DropError> {
    let mut uploads = Vec::new();
    let mut accept_files = |files: Vec<NewFile>| -> Result<Vec<StoredObject>, DropError> {
        files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let envelope = Envelope::from_bytes(&file.bytes)
                    .map_err(|_| DropError::invalid("sealed file is not an envelope"))?;
                let key = id.object_key(index);
                uploads.push(Upload { key: key.clone(), bytes: file.bytes });
                Ok(StoredObject {
                    storage_key: key,
                    original_name: file.name,
                    mime_type: file.mime_type,
                    size: envelope.plaintext_len() as u64,
                })
            })
            .collect()
    };

    let payload = match content {
        SealedContent::File(file) => {
            let mut objects = accept_files(vec![file])?;
            match objects.pop() {
                Some(object) => Payload::File { object },
                None => return Err(DropError::invalid("file drop needs a file")),
            }
        },
        SealedContent::Bundle(files) => {
            if files.is_empty() {
                return Err(DropError::invalid("bundle needs at least one file"));
            }
            Payload::Bundle { objects: accept_files(files)? }
        },
        SealedContent::Text(body) => {
            check_sealed(&body)?;
            Payload::Text { body }
        },
        SealedContent::Url(links) => {
            if links.is_empty() {
                return Err(DropError::invalid("url drop needs at least one link"));
            }
            links.iter().try_for_each(check_sealed)?;
            Payload::Url { links }
        },
    };

    Ok((payload, Protection::Secure, uploads))
}

fn check_sealed(envelope: &Envelope) -> Result<(), DropError> {
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(DropError::invalid("sealed content is shorter than its tag"));
    }
    Ok(())
}

fn utf8(bytes: Vec<u8>) -> Result<String, DropError> {
    String::from_utf8(bytes).map_err(|_| DropError::DecryptionFailed)
}
