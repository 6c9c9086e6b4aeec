//! SQL schema for the Nocage Hub SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Projection of identities issued by the external auth service.
-- referral_code is written at most once per row; UNIQUE is the final
-- arbiter of code uniqueness (multiple NULLs are allowed).
CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT,
    name          TEXT,
    image         TEXT,
    referral_code TEXT UNIQUE,
    created_at    TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at    TEXT NOT NULL
);

PRAGMA user_version = 1;
";
