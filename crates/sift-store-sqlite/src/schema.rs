//! SQL schema for the Sift SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Evidence is append-only; a re-insert of an existing fingerprint replaces
-- the row wholesale (same id means same evidence by construction).
CREATE TABLE IF NOT EXISTS evidence (
    evidence_id     TEXT PRIMARY KEY, -- SHA-256 content fingerprint, hex
    source_kind     TEXT NOT NULL,    -- 'message' | 'document' | ...
    occurred_at     TEXT,             -- ISO 8601 UTC; NULL means unknown
    actors          TEXT NOT NULL,    -- JSON array, normalised and sorted
    declared_actors TEXT NOT NULL,    -- JSON array, adapter order
    raw_text        TEXT NOT NULL,    -- canonicalised payload
    ingest_seq      INTEGER NOT NULL
);

-- Chain of custody, one row per link, ordered by position. Digests are
-- computed at ingestion and never rewritten.
CREATE TABLE IF NOT EXISTS provenance (
    evidence_id TEXT    NOT NULL REFERENCES evidence(evidence_id),
    position    INTEGER NOT NULL,
    adapter     TEXT    NOT NULL,
    origin      TEXT    NOT NULL,
    digest      TEXT    NOT NULL,
    ingested_at TEXT    NOT NULL,
    PRIMARY KEY (evidence_id, position)
);

-- Verification results persisted across runs; keyed by the canonical
-- claim triple. TTL enforcement happens in the caller.
CREATE TABLE IF NOT EXISTS verification_cache (
    claim_key        TEXT PRIMARY KEY,
    state            TEXT NOT NULL,   -- terminal VerificationState
    confidence_delta REAL NOT NULL,
    source_reference TEXT,
    verified_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS evidence_seq_idx   ON evidence(ingest_seq);
CREATE INDEX IF NOT EXISTS cache_verified_idx ON verification_cache(verified_at);

PRAGMA user_version = 1;
";
