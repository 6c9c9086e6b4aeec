//! [`SqliteStore`] — the SQLite implementation of [`UserStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use nocage_core::{
  referral::ReferralCode,
  store::{AssignOutcome, UserStore},
  user::{UserIdentity, UserRecord},
};

use crate::{
  Error, Result,
  encode::{RawUser, USER_COLUMNS, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A user store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What happened inside the assignment transaction.
enum RawAssign {
  MissingUser,
  Existing(String),
  Assigned,
  Conflict,
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
  )
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

  /// Fetch a single user by an arbitrary column.
  async fn find_by(&self, column: &'static str, value: String) -> Result<Option<UserRecord>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
              rusqlite::params![value],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_record).transpose()
  }
}

// ─── UserStore impl ──────────────────────────────────────────────────────────

impl UserStore for SqliteStore {
  type Error = Error;

  async fn upsert_user(&self, identity: UserIdentity) -> Result<UserRecord> {
    let now = encode_dt(Utc::now());

    let raw: RawUser = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, name, image, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)
           ON CONFLICT (user_id) DO UPDATE SET
             email      = excluded.email,
             name       = excluded.name,
             image      = excluded.image,
             updated_at = excluded.updated_at",
          rusqlite::params![
            identity.id,
            identity.email,
            identity.name,
            identity.image,
            now,
          ],
        )?;

        Ok(conn.query_row(
          &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
          rusqlite::params![identity.id],
          RawUser::from_row,
        )?)
      })
      .await?;

    raw.into_record()
  }

  async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
    self.find_by("user_id", user_id.to_owned()).await
  }

  async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>> {
    self.find_by("referral_code", code.to_owned()).await
  }

  async fn referral_code_exists(&self, code: &str) -> Result<bool> {
    let code = code.to_owned();
    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM users WHERE referral_code = ?1)",
          rusqlite::params![code],
          |row| row.get::<_, bool>(0),
        )?)
      })
      .await?;
    Ok(exists)
  }

  async fn assign_referral_code(
    &self,
    user_id: &str,
    code:    &ReferralCode,
  ) -> Result<AssignOutcome> {
    let user_id_str = user_id.to_owned();
    let code_str    = code.as_str().to_owned();
    let now         = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<Option<String>> = tx
          .query_row(
            "SELECT referral_code FROM users WHERE user_id = ?1",
            rusqlite::params![user_id_str],
            |row| row.get(0),
          )
          .optional()?;

        let outcome = match current {
          None => RawAssign::MissingUser,
          Some(Some(existing)) => RawAssign::Existing(existing),
          Some(None) => {
            let updated = tx.execute(
              "UPDATE users SET referral_code = ?2, updated_at = ?3
               WHERE user_id = ?1 AND referral_code IS NULL",
              rusqlite::params![user_id_str, code_str, now],
            );
            match updated {
              Ok(_) => RawAssign::Assigned,
              Err(e) if is_unique_violation(&e) => RawAssign::Conflict,
              Err(e) => return Err(e.into()),
            }
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    match raw {
      RawAssign::MissingUser => Err(Error::UserNotFound(user_id.to_owned())),
      RawAssign::Existing(existing) => {
        Ok(AssignOutcome::AlreadyAssigned(ReferralCode::from_stored(existing)))
      }
      RawAssign::Assigned => Ok(AssignOutcome::Assigned(code.clone())),
      RawAssign::Conflict => Err(Error::CodeConflict(code.as_str().to_owned())),
    }
  }
}
