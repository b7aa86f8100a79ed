//! The per-key operation handlers.
//!
//! [`apply`] selects the handler for the configured operation and runs it
//! against one key. Handlers report their result as an [`OpOutcome`] instead
//! of panicking or propagating through the pass: an `Err` from here is caught
//! at the per-key boundary by the runner, logged, and never aborts the scan.

use crate::config::{Operation, SweepConfig};
use crate::store::{KeyType, Store, StoreError, Ttl};

/// What a handler did with one key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpOutcome {
    /// The operation took effect on the destination (or moved the key).
    Applied,
    /// The handler decided the key needs nothing, with the reason why.
    Skipped(String),
}

impl OpOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

/// Run the configured operation against one key.
pub async fn apply<S, D>(
    key: &str,
    src: &mut S,
    dst: &mut D,
    config: &SweepConfig,
) -> Result<OpOutcome, StoreError>
where
    S: Store + ?Sized,
    D: Store + ?Sized,
{
    match config.op {
        Operation::Migrate => migrate(key, src, dst).await,
        Operation::Persist => persist(key, src, dst).await,
        Operation::Expire => {
            let ttl = config
                .expire_ttl
                .ok_or_else(|| StoreError::Other("expire ttl not configured".to_string()))?;
            expire(key, src, dst, ttl).await
        }
        Operation::Del => del(key, dst, &config.except_prefixes).await,
        Operation::Move => move_key(key, src, config.dst.db).await,
    }
}

/// Copy a key's full value from source to destination using the
/// type-appropriate bulk-write primitive.
async fn migrate<S, D>(key: &str, src: &mut S, dst: &mut D) -> Result<OpOutcome, StoreError>
where
    S: Store + ?Sized,
    D: Store + ?Sized,
{
    let key_type = src.key_type(key).await?;
    migrate_value(key, &key_type, src, dst)
        .await
        .map_err(|source| StoreError::ForType {
            key_type: key_type.to_string(),
            source: Box::new(source),
        })
}

async fn migrate_value<S, D>(
    key: &str,
    key_type: &KeyType,
    src: &mut S,
    dst: &mut D,
) -> Result<OpOutcome, StoreError>
where
    S: Store + ?Sized,
    D: Store + ?Sized,
{
    match key_type {
        KeyType::String => match src.get(key).await? {
            Some(value) => {
                dst.set(key, &value).await?;
                Ok(OpOutcome::Applied)
            }
            None => Ok(OpOutcome::skipped("vanished before read")),
        },
        KeyType::Hash => {
            let entries = src.hash_entries(key).await?;
            if entries.is_empty() {
                return Ok(OpOutcome::skipped("vanished before read"));
            }
            dst.hash_set_all(key, &entries).await?;
            Ok(OpOutcome::Applied)
        }
        KeyType::List => {
            let items = src.list_range(key).await?;
            if items.is_empty() {
                return Ok(OpOutcome::skipped("vanished before read"));
            }
            // Whole-range prepend: the destination receives the list in
            // reverse order, and a repeated pass prepends the range again.
            dst.list_prepend(key, &items).await?;
            Ok(OpOutcome::Applied)
        }
        KeyType::Set => {
            let members = src.set_members(key).await?;
            if members.is_empty() {
                return Ok(OpOutcome::skipped("vanished before read"));
            }
            dst.set_add_all(key, &members).await?;
            Ok(OpOutcome::Applied)
        }
        KeyType::ZSet => {
            let entries = src.sorted_set_entries(key).await?;
            if entries.is_empty() {
                return Ok(OpOutcome::skipped("vanished before read"));
            }
            for (member, score) in &entries {
                dst.sorted_set_add(key, member, *score).await?;
            }
            Ok(OpOutcome::Applied)
        }
        KeyType::Other(name) => Ok(OpOutcome::skipped(format!("unsupported type {}", name))),
    }
}

/// Clear the destination TTL of a key that has no expiration in the source.
async fn persist<S, D>(key: &str, src: &mut S, dst: &mut D) -> Result<OpOutcome, StoreError>
where
    S: Store + ?Sized,
    D: Store + ?Sized,
{
    match src.ttl(key).await? {
        Ttl::Persistent => {
            dst.persist(key).await?;
            Ok(OpOutcome::Applied)
        }
        Ttl::Expires(_) => Ok(OpOutcome::skipped("source key has a ttl")),
        Ttl::Missing => Ok(OpOutcome::skipped("vanished before ttl read")),
    }
}

/// Set the destination TTL of a key that has no expiration in the source.
async fn expire<S, D>(
    key: &str,
    src: &mut S,
    dst: &mut D,
    ttl_secs: u64,
) -> Result<OpOutcome, StoreError>
where
    S: Store + ?Sized,
    D: Store + ?Sized,
{
    match src.ttl(key).await? {
        Ttl::Persistent => {
            if dst.expire(key, ttl_secs).await? {
                Ok(OpOutcome::Applied)
            } else {
                Ok(OpOutcome::skipped("missing in destination"))
            }
        }
        Ttl::Expires(_) => Ok(OpOutcome::skipped("source key has a ttl")),
        Ttl::Missing => Ok(OpOutcome::skipped("vanished before ttl read")),
    }
}

/// Delete a key from the destination unless its name starts with one of the
/// preserved prefixes.
async fn del<D>(key: &str, dst: &mut D, keep: &[String]) -> Result<OpOutcome, StoreError>
where
    D: Store + ?Sized,
{
    if let Some(prefix) = keep.iter().find(|p| key.starts_with(p.as_str())) {
        return Ok(OpOutcome::skipped(format!("preserved by prefix {}", prefix)));
    }
    dst.delete(key).await?;
    Ok(OpOutcome::Applied)
}

/// Relocate a key to the destination logical database over the source
/// connection. A refused move (the key already left, or the name exists in
/// the target database) is a skip, not an error.
async fn move_key<S>(key: &str, src: &mut S, dst_db: u32) -> Result<OpOutcome, StoreError>
where
    S: Store + ?Sized,
{
    if src.move_to_db(key, dst_db).await? {
        Ok(OpOutcome::Applied)
    } else {
        Ok(OpOutcome::skipped("refused by store"))
    }
}
