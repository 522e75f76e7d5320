//! Persistent storage using RocksDB.
//!
//! The document is split into one `meta` record and one `member:{id}`
//! record per member, so a toggle rewrites a single member rather than the
//! whole tribe.

use crate::document::{apply_member_defaults, DocumentMeta, TribeDocument, SCHEMA_VERSION};
use crate::error::{Error, Result};
use rocksdb::{Options, WriteBatch, DB};
use std::collections::BTreeMap;
use std::path::Path;
use totem_core::{Member, MemberId};

const META_KEY: &[u8] = b"meta:document";
const MEMBER_PREFIX: &[u8] = b"member:";

/// Storage backend for the tribe document.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    // --- Document metadata ---

    /// Store the document metadata.
    pub fn put_meta(&self, meta: &DocumentMeta) -> Result<()> {
        let value = serde_json::to_vec(meta)?;
        self.db.put(META_KEY, value)?;
        Ok(())
    }

    /// Get the document metadata, if any was ever written.
    pub fn get_meta(&self) -> Result<Option<DocumentMeta>> {
        match self.db.get(META_KEY)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    // --- Members ---

    /// Store a member.
    pub fn put_member(&self, member: &Member) -> Result<()> {
        let value = serde_json::to_vec(member)?;
        self.db.put(member_key(&member.id), value)?;
        Ok(())
    }

    /// Store a member together with the metadata that now references it.
    pub fn write_member(&self, member: &Member, meta: &DocumentMeta) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(member_key(&member.id), serde_json::to_vec(member)?);
        batch.put(META_KEY, serde_json::to_vec(meta)?);
        self.db.write(batch)?;
        Ok(())
    }

    /// Delete a member together with the metadata that no longer references it.
    pub fn remove_member(&self, id: &str, meta: &DocumentMeta) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.delete(member_key(id));
        batch.put(META_KEY, serde_json::to_vec(meta)?);
        self.db.write(batch)?;
        Ok(())
    }

    /// List all members.
    pub fn list_members(&self) -> Result<Vec<Member>> {
        let mut members = Vec::new();

        let iter = self.db.prefix_iterator(MEMBER_PREFIX);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(MEMBER_PREFIX) {
                let member: Member = serde_json::from_slice(&value)?;
                members.push(member);
            } else {
                break;
            }
        }

        Ok(members)
    }

    // --- Whole document ---

    /// Replace the stored document: metadata plus the exact member set.
    pub fn save_document(&self, doc: &TribeDocument) -> Result<()> {
        let mut batch = WriteBatch::default();

        for stale in self.member_ids()? {
            if !doc.members.contains_key(&stale) {
                batch.delete(member_key(&stale));
            }
        }
        for member in doc.members.values() {
            batch.put(member_key(&member.id), serde_json::to_vec(member)?);
        }
        batch.put(META_KEY, serde_json::to_vec(&doc.meta())?);

        self.db.write(batch)?;
        Ok(())
    }

    /// Load the stored document, migrating older layouts.
    ///
    /// Returns an empty, disconnected document when nothing was stored.
    pub fn load_document(&self, default_timezone: Option<&str>) -> Result<TribeDocument> {
        let Some(meta) = self.get_meta()? else {
            return Ok(TribeDocument::default());
        };

        let mut members: BTreeMap<MemberId, Member> = self
            .list_members()?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let meta = self.migrate(meta, &mut members, default_timezone)?;

        // A dangling identity is dropped rather than resurrected as an empty member.
        let local_user_id = meta
            .local_user_id
            .filter(|id| members.contains_key(id));

        Ok(TribeDocument {
            tribe_url: meta.tribe_url,
            members,
            local_user_id,
            last_synced: meta.last_synced,
            ..TribeDocument::default()
        })
    }

    /// Bring a stored document up to [`SCHEMA_VERSION`].
    fn migrate(
        &self,
        mut meta: DocumentMeta,
        members: &mut BTreeMap<MemberId, Member>,
        default_timezone: Option<&str>,
    ) -> Result<DocumentMeta> {
        if meta.schema_version > SCHEMA_VERSION {
            return Err(Error::Storage(format!(
                "document schema {} is newer than supported {}",
                meta.schema_version, SCHEMA_VERSION
            )));
        }

        if meta.schema_version < 2 {
            // v1 members predate settings; serde has already defaulted the
            // offset, the timezone comes from configuration.
            for member in members.values_mut() {
                apply_member_defaults(member, default_timezone);
                self.put_member(member)?;
            }
            tracing::info!(
                "Migrated tribe document from schema {} to {}",
                meta.schema_version,
                SCHEMA_VERSION
            );
            meta.schema_version = SCHEMA_VERSION;
            self.put_meta(&meta)?;
        }

        Ok(meta)
    }

    fn member_ids(&self) -> Result<Vec<MemberId>> {
        let mut ids = Vec::new();

        let iter = self.db.prefix_iterator(MEMBER_PREFIX);
        for item in iter {
            let (key, _) = item?;
            if key.starts_with(MEMBER_PREFIX) {
                let key_str = String::from_utf8_lossy(&key);
                if let Some(id) = key_str.strip_prefix("member:") {
                    ids.push(id.to_string());
                }
            } else {
                break;
            }
        }

        Ok(ids)
    }
}

fn member_key(id: &str) -> Vec<u8> {
    format!("member:{}", id).into_bytes()
}
