//! Conversions between domain types and the plain-text SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings.

use chrono::{DateTime, Utc};
use nocage_core::{
  referral::ReferralCode,
  user::{UserIdentity, UserRecord},
};

use crate::{Error, Result};

/// Column list matching [`RawUser::from_row`].
pub const USER_COLUMNS: &str =
  "user_id, email, name, image, referral_code, created_at";

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// A `users` row as read straight out of SQLite.
pub struct RawUser {
  pub user_id:       String,
  pub email:         Option<String>,
  pub name:          Option<String>,
  pub image:         Option<String>,
  pub referral_code: Option<String>,
  pub created_at:    String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      email:         row.get(1)?,
      name:          row.get(2)?,
      image:         row.get(3)?,
      referral_code: row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<UserRecord> {
    Ok(UserRecord {
      identity:      UserIdentity {
        id:    self.user_id,
        email: self.email,
        name:  self.name,
        image: self.image,
      },
      referral_code: self.referral_code.map(ReferralCode::from_stored),
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
