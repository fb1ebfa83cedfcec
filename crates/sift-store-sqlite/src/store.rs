//! [`SqliteStore`] — the SQLite implementation of [`CorpusStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use sift_core::{
  evidence::EvidenceItem, oracle::VerificationResult, store::CorpusStore,
};

use crate::{
  Error, Result,
  encode::{
    RawEvidence, RawProvenance, RawVerification, encode_actor_list,
    encode_actor_set, encode_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sift corpus store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CorpusStore impl ────────────────────────────────────────────────────────

impl CorpusStore for SqliteStore {
  type Error = Error;

  // ── Evidence ──────────────────────────────────────────────────────────────

  fn insert_evidence(
    &self,
    item: &EvidenceItem,
  ) -> impl Future<Output = Result<()>> + Send + '_ {
    let id_str          = item.id.as_str().to_owned();
    let kind_str        = item.source_kind.as_str().to_owned();
    let occurred_str    = item.occurred_at.known().map(encode_dt);
    let actors_str      = encode_actor_set(&item.actors);
    let declared_str    = encode_actor_list(&item.declared_actors);
    let raw_text        = item.raw_text.clone();
    let ingest_seq      = item.ingest_seq as i64;
    let provenance: Vec<(String, String, String, String)> = item
      .provenance
      .iter()
      .map(|p| {
        (
          p.adapter.clone(),
          p.origin.clone(),
          p.digest.clone(),
          encode_dt(p.ingested_at),
        )
      })
      .collect();

    async move {
      let actors_str   = actors_str?;
      let declared_str = declared_str?;
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          tx.execute(
            "INSERT OR REPLACE INTO evidence (
               evidence_id, source_kind, occurred_at, actors,
               declared_actors, raw_text, ingest_seq
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
              id_str,
              kind_str,
              occurred_str,
              actors_str,
              declared_str,
              raw_text,
              ingest_seq,
            ],
          )?;
          // A merge may have extended the chain; rewrite it in full.
          tx.execute(
            "DELETE FROM provenance WHERE evidence_id = ?1",
            rusqlite::params![id_str],
          )?;
          for (position, (adapter, origin, digest, ingested_at)) in
            provenance.iter().enumerate()
          {
            tx.execute(
              "INSERT INTO provenance (
                 evidence_id, position, adapter, origin, digest, ingested_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
              rusqlite::params![
                id_str,
                position as i64,
                adapter,
                origin,
                digest,
                ingested_at,
              ],
            )?;
          }
          tx.commit()?;
          Ok(())
        })
        .await?;
      Ok(())
    }
  }

  async fn load_evidence(&self) -> Result<Vec<EvidenceItem>> {
    let rows: Vec<(RawEvidence, Vec<RawProvenance>)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT evidence_id, source_kind, occurred_at, actors,
                  declared_actors, raw_text, ingest_seq
           FROM evidence
           ORDER BY ingest_seq",
        )?;
        let raws = stmt
          .query_map([], |row| {
            Ok(RawEvidence {
              evidence_id:     row.get(0)?,
              source_kind:     row.get(1)?,
              occurred_at:     row.get(2)?,
              actors:          row.get(3)?,
              declared_actors: row.get(4)?,
              raw_text:        row.get(5)?,
              ingest_seq:      row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut prov_stmt = conn.prepare(
          "SELECT adapter, origin, digest, ingested_at
           FROM provenance
           WHERE evidence_id = ?1
           ORDER BY position",
        )?;
        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
          let chain = prov_stmt
            .query_map(rusqlite::params![raw.evidence_id], |row| {
              Ok(RawProvenance {
                adapter:     row.get(0)?,
                origin:      row.get(1)?,
                digest:      row.get(2)?,
                ingested_at: row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          out.push((raw, chain));
        }
        Ok(out)
      })
      .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (raw, chain) in rows {
      let provenance = chain
        .into_iter()
        .map(RawProvenance::into_provenance)
        .collect::<Result<Vec<_>>>()?;
      let item = raw.into_item(provenance)?;
      // Tainted rows fail the load; a digest mismatch is never skipped over.
      item.verify_integrity()?;
      items.push(item);
    }
    Ok(items)
  }

  // ── Verification cache ────────────────────────────────────────────────────

  fn put_verification(
    &self,
    claim_key: &str,
    result: &VerificationResult,
  ) -> impl Future<Output = Result<()>> + Send + '_ {
    let key       = claim_key.to_owned();
    let state_str = result.state.as_str().to_owned();
    let delta     = result.confidence_delta;
    let reference = result.source_reference.clone();
    let at_str    = encode_dt(result.verified_at);

    async move {
      self
        .conn
        .call(move |conn| {
          conn.execute(
            "INSERT OR REPLACE INTO verification_cache (
               claim_key, state, confidence_delta, source_reference, verified_at
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![key, state_str, delta, reference, at_str],
          )?;
          Ok(())
        })
        .await?;
      Ok(())
    }
  }

  fn get_verification(
    &self,
    claim_key: &str,
  ) -> impl Future<Output = Result<Option<VerificationResult>>> + Send + '_ {
    let key = claim_key.to_owned();

    async move {
      let raw: Option<RawVerification> = self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT claim_key, state, confidence_delta, source_reference,
                        verified_at
                 FROM verification_cache
                 WHERE claim_key = ?1",
                rusqlite::params![key],
                |row| {
                  Ok(RawVerification {
                    claim_key:        row.get(0)?,
                    state:            row.get(1)?,
                    confidence_delta: row.get(2)?,
                    source_reference: row.get(3)?,
                    verified_at:      row.get(4)?,
                  })
                },
              )
              .optional()?,
          )
        })
        .await?;

      raw
        .map(|r| r.into_entry().map(|(_, result)| result))
        .transpose()
    }
  }

  async fn load_verifications(
    &self,
  ) -> Result<Vec<(String, VerificationResult)>> {
    let raws: Vec<RawVerification> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT claim_key, state, confidence_delta, source_reference,
                  verified_at
           FROM verification_cache",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawVerification {
              claim_key:        row.get(0)?,
              state:            row.get(1)?,
              confidence_delta: row.get(2)?,
              source_reference: row.get(3)?,
              verified_at:      row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVerification::into_entry).collect()
  }

  async fn prune_verifications(
    &self,
    cutoff: chrono::DateTime<chrono::Utc>,
  ) -> Result<usize> {
    let cutoff_str = encode_dt(cutoff);

    let pruned = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM verification_cache WHERE verified_at < ?1",
          rusqlite::params![cutoff_str],
        )?)
      })
      .await?;
    Ok(pruned)
  }
}
