//! Referral code generation and uniqueness resolution.
//!
//! A code is `NC` + the base-36 timestamp + the tail of the user id, upper
//! cased and cut to [`REFERRAL_CODE_LEN`] characters. Uniqueness is checked
//! against the store in a bounded loop; the store's own UNIQUE constraint is
//! what finally guarantees it.

use std::{
  fmt,
  sync::atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  store::{StoreError as _, UserStore},
  user::UserIdentity,
};

/// Literal prefix of every referral code.
pub const REFERRAL_TAG: &str = "NC";
/// Maximum length of a referral code, in characters.
pub const REFERRAL_CODE_LEN: usize = 12;
/// Attempts made before giving up with [`Error::GenerationExhausted`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Number of trailing user-id characters mixed into a code.
const USER_SUFFIX_LEN: usize = 4;

// ─── Code ────────────────────────────────────────────────────────────────────

/// A short shareable code, unique across users once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralCode(String);

impl ReferralCode {
  /// Wrap a code read back from storage.
  pub fn from_stored(code: String) -> Self { Self(code) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for ReferralCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Millisecond timestamp source for code generation.
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> u64;
}

/// Wall clock that never returns the same value twice.
///
/// Calls landing in the same millisecond are pushed forward by one, so
/// back-to-back candidates for one user always differ.
#[derive(Debug, Default)]
pub struct SystemClock {
  last: AtomicU64,
}

impl SystemClock {
  pub fn new() -> Self { Self::default() }
}

impl Clock for SystemClock {
  fn now_millis(&self) -> u64 {
    let wall = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let mut prev = self.last.load(Ordering::Relaxed);
    loop {
      let next = wall.max(prev + 1);
      match self
        .last
        .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
      {
        Ok(_) => return next,
        Err(actual) => prev = actual,
      }
    }
  }
}

// ─── Generation ──────────────────────────────────────────────────────────────

fn to_base36(mut n: u64) -> String {
  const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  if n == 0 {
    return "0".to_owned();
  }
  let mut out = Vec::with_capacity(13);
  while n > 0 {
    out.push(DIGITS[(n % 36) as usize]);
    n /= 36;
  }
  out.reverse();
  String::from_utf8(out).unwrap_or_default()
}

fn validate_user_id(user_id: &str) -> Result<&str> {
  let trimmed = user_id.trim();
  if trimmed.is_empty() {
    return Err(Error::EmptyUserId);
  }
  Ok(trimmed)
}

/// Produce one candidate code for `user_id` at the clock's current time.
pub fn generate_code<C>(user_id: &str, clock: &C) -> Result<ReferralCode>
where
  C: Clock + ?Sized,
{
  let user_id = validate_user_id(user_id)?;

  let chars: Vec<char> = user_id.chars().collect();
  let suffix: String = chars[chars.len().saturating_sub(USER_SUFFIX_LEN)..]
    .iter()
    .collect();

  let raw = format!("{REFERRAL_TAG}{}{suffix}", to_base36(clock.now_millis()))
    .to_uppercase();
  Ok(ReferralCode(raw.chars().take(REFERRAL_CODE_LEN).collect()))
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Search for a free code within `budget` attempts.
///
/// Returns the code and the number of attempts spent, or `None` if every
/// candidate was taken.
async fn resolve_within<S, C>(
  store: &S,
  clock: &C,
  user_id: &str,
  budget: u32,
) -> Result<Option<(ReferralCode, u32)>>
where
  S: UserStore,
  C: Clock + ?Sized,
{
  for attempt in 1..=budget {
    let candidate = generate_code(user_id, clock)?;
    let taken = store
      .referral_code_exists(candidate.as_str())
      .await
      .map_err(Error::store)?;
    if !taken {
      return Ok(Some((candidate, attempt)));
    }
  }
  Ok(None)
}

/// Generate a code no existing user holds, checking the store once per
/// attempt and giving up after `max_attempts`.
///
/// Nothing is reserved: the result is only free at the moment of the check.
pub async fn resolve_unique_code<S, C>(
  store: &S,
  clock: &C,
  user_id: &str,
  max_attempts: u32,
) -> Result<ReferralCode>
where
  S: UserStore,
  C: Clock + ?Sized,
{
  validate_user_id(user_id)?;
  match resolve_within(store, clock, user_id, max_attempts).await? {
    Some((code, _)) => Ok(code),
    None => Err(Error::GenerationExhausted { attempts: max_attempts }),
  }
}

/// Return the user's referral code, creating and persisting one if needed.
///
/// The user record is upserted from `identity` first. A code lost to a
/// concurrent writer at persist time costs one attempt and the search
/// continues; if the concurrent writer was this same user, their stored code
/// wins.
pub async fn issue_referral_code<S, C>(
  store: &S,
  clock: &C,
  identity: &UserIdentity,
  max_attempts: u32,
) -> Result<ReferralCode>
where
  S: UserStore,
  C: Clock + ?Sized,
{
  let user_id = validate_user_id(&identity.id)?;

  // The record is keyed by the same trimmed id the assignment uses.
  let identity = UserIdentity { id: user_id.to_owned(), ..identity.clone() };
  let record = store
    .upsert_user(identity)
    .await
    .map_err(Error::store)?;
  if let Some(code) = record.referral_code {
    return Ok(code);
  }

  let mut remaining = max_attempts;
  while remaining > 0 {
    let Some((candidate, spent)) =
      resolve_within(store, clock, user_id, remaining).await?
    else {
      break;
    };
    remaining -= spent;

    match store.assign_referral_code(user_id, &candidate).await {
      Ok(outcome) => return Ok(outcome.into_code()),
      Err(e) if e.is_code_conflict() => continue,
      Err(e) => return Err(Error::store(e)),
    }
  }

  Err(Error::GenerationExhausted { attempts: max_attempts })
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{
      Mutex,
      atomic::{AtomicU32, Ordering},
    },
  };

  use chrono::Utc;

  use super::*;
  use crate::{store::AssignOutcome, user::UserRecord};

  /// Clock stepping forward by a fixed amount on each call.
  struct StepClock {
    next: AtomicU64,
    step: u64,
  }

  impl StepClock {
    fn starting_at(start: u64) -> Self {
      Self { next: AtomicU64::new(start), step: 1 }
    }
  }

  impl Clock for StepClock {
    fn now_millis(&self) -> u64 { self.next.fetch_add(self.step, Ordering::SeqCst) }
  }

  #[derive(Debug, thiserror::Error)]
  enum FakeError {
    #[error("code conflict")]
    Conflict,
    #[error("user missing")]
    Missing,
  }

  impl crate::store::StoreError for FakeError {
    fn is_code_conflict(&self) -> bool { matches!(self, Self::Conflict) }
  }

  /// In-memory store that reports the first `taken_checks` existence checks
  /// as collisions and refuses the first `conflicting_writes` assignments.
  /// With `raced_code` set, a concurrent issuance is simulated: the code lands
  /// on the record between the upsert and the assignment.
  #[derive(Default)]
  struct FakeStore {
    users:              Mutex<HashMap<String, UserRecord>>,
    taken_checks:       u32,
    conflicting_writes: u32,
    raced_code:         Option<ReferralCode>,
    checks:             AtomicU32,
    writes:             AtomicU32,
  }

  impl FakeStore {
    fn colliding(taken_checks: u32) -> Self {
      Self { taken_checks, ..Self::default() }
    }

    fn checks(&self) -> u32 { self.checks.load(Ordering::SeqCst) }
  }

  impl UserStore for FakeStore {
    type Error = FakeError;

    async fn upsert_user(&self, identity: UserIdentity) -> Result<UserRecord, FakeError> {
      let mut users = self.users.lock().unwrap();
      let record = users.entry(identity.id.clone()).or_insert_with(|| UserRecord {
        identity:      identity.clone(),
        referral_code: None,
        created_at:    Utc::now(),
      });
      record.identity = identity;
      Ok(record.clone())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, FakeError> {
      Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn find_user_by_referral_code(
      &self,
      code: &str,
    ) -> Result<Option<UserRecord>, FakeError> {
      Ok(
        self
          .users
          .lock()
          .unwrap()
          .values()
          .find(|u| u.referral_code.as_ref().is_some_and(|c| c.as_str() == code))
          .cloned(),
      )
    }

    async fn referral_code_exists(&self, code: &str) -> Result<bool, FakeError> {
      let n = self.checks.fetch_add(1, Ordering::SeqCst);
      if n < self.taken_checks {
        return Ok(true);
      }
      Ok(self.find_user_by_referral_code(code).await?.is_some())
    }

    async fn assign_referral_code(
      &self,
      user_id: &str,
      code: &ReferralCode,
    ) -> Result<AssignOutcome, FakeError> {
      let n = self.writes.fetch_add(1, Ordering::SeqCst);
      if n < self.conflicting_writes {
        return Err(FakeError::Conflict);
      }
      let mut users = self.users.lock().unwrap();
      let record = users.get_mut(user_id).ok_or(FakeError::Missing)?;
      if record.referral_code.is_none() {
        record.referral_code = self.raced_code.clone();
      }
      match &record.referral_code {
        Some(existing) => Ok(AssignOutcome::AlreadyAssigned(existing.clone())),
        None => {
          record.referral_code = Some(code.clone());
          Ok(AssignOutcome::Assigned(code.clone()))
        }
      }
    }
  }

  // ── Generation ────────────────────────────────────────────────────────────

  #[test]
  fn base36_encoding() {
    assert_eq!(to_base36(0), "0");
    assert_eq!(to_base36(35), "z");
    assert_eq!(to_base36(36), "10");
    assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
  }

  #[test]
  fn code_has_tag_and_bounded_length() {
    let clock = SystemClock::new();
    for id in ["user_2abcXYZ9", "ab", "x", "a-very-long-identifier-indeed", "ünïcødé"] {
      let code = generate_code(id, &clock).unwrap();
      assert!(code.as_str().starts_with(REFERRAL_TAG), "{code}");
      assert!(code.as_str().chars().count() <= REFERRAL_CODE_LEN, "{code}");
    }
  }

  #[test]
  fn code_layout_with_fixed_clock() {
    // 35 ms -> "z"; short timestamps leave room for the whole user suffix.
    let clock = StepClock::starting_at(35);
    let code = generate_code("user_ab9x", &clock).unwrap();
    assert_eq!(code.as_str(), "NCZAB9X");

    let code = generate_code("q7", &clock).unwrap();
    assert_eq!(code.as_str(), "NC10Q7");
  }

  #[test]
  fn code_is_truncated_to_twelve_characters() {
    let clock = StepClock::starting_at(1_700_000_000_000);
    let code = generate_code("user_ab9x", &clock).unwrap();
    assert_eq!(code.as_str(), "NCLOYW3V28AB");
  }

  #[test]
  fn empty_user_id_is_rejected() {
    let clock = SystemClock::new();
    assert!(matches!(generate_code("", &clock), Err(Error::EmptyUserId)));
    assert!(matches!(generate_code("   ", &clock), Err(Error::EmptyUserId)));
  }

  #[test]
  fn distinct_timestamps_give_distinct_codes() {
    let clock = SystemClock::new();
    let codes: std::collections::HashSet<_> = (0..500)
      .map(|_| generate_code("user_2abcXYZ9", &clock).unwrap())
      .collect();
    assert_eq!(codes.len(), 500);
  }

  #[test]
  fn system_clock_is_strictly_increasing() {
    let clock = SystemClock::new();
    let mut prev = clock.now_millis();
    for _ in 0..1000 {
      let next = clock.now_millis();
      assert!(next > prev);
      prev = next;
    }
  }

  // ── Resolution ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn resolver_returns_first_free_candidate() {
    for taken in [0u32, 1, 3, 7] {
      let store = FakeStore::colliding(taken);
      let clock = StepClock::starting_at(1_000_000);
      let code = resolve_unique_code(&store, &clock, "user_1234", 10).await.unwrap();

      // The (taken + 1)th candidate was generated at start + taken.
      let expected = generate_code("user_1234", &StepClock::starting_at(1_000_000 + u64::from(taken)))
        .unwrap();
      assert_eq!(code, expected);
      assert_eq!(store.checks(), taken + 1);
    }
  }

  #[tokio::test]
  async fn resolver_gives_up_after_bound() {
    let store = FakeStore::colliding(u32::MAX);
    let clock = SystemClock::new();
    let err = resolve_unique_code(&store, &clock, "user_1234", DEFAULT_MAX_ATTEMPTS)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::GenerationExhausted { attempts: 10 }));
    assert!(err.is_retriable());
    assert_eq!(store.checks(), DEFAULT_MAX_ATTEMPTS);
  }

  #[tokio::test]
  async fn resolver_rejects_empty_user_without_touching_store() {
    let store = FakeStore::default();
    let err = resolve_unique_code(&store, &SystemClock::new(), "", 10).await.unwrap_err();
    assert!(matches!(err, Error::EmptyUserId));
    assert_eq!(store.checks(), 0);
  }

  // ── Issuance ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn issue_persists_once_and_reuses() {
    let store = FakeStore::default();
    let clock = SystemClock::new();
    let alice = UserIdentity::new("user_alice");

    let first = issue_referral_code(&store, &clock, &alice, 10).await.unwrap();
    let second = issue_referral_code(&store, &clock, &alice, 10).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);

    let stored = store.get_user("user_alice").await.unwrap().unwrap();
    assert_eq!(stored.referral_code, Some(first));
  }

  #[tokio::test]
  async fn issue_returns_code_stored_by_a_concurrent_request() {
    let winner = ReferralCode::from_stored("NCWINNER1234".into());
    let store = FakeStore { raced_code: Some(winner.clone()), ..FakeStore::default() };
    let clock = SystemClock::new();

    let code = issue_referral_code(&store, &clock, &UserIdentity::new("user_carol"), 10)
      .await
      .unwrap();
    assert_eq!(code, winner);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);

    let stored = store.get_user("user_carol").await.unwrap().unwrap();
    assert_eq!(stored.referral_code, Some(winner));
  }

  #[tokio::test]
  async fn issue_keys_padded_ids_by_their_trimmed_form() {
    let store = FakeStore::default();
    let clock = SystemClock::new();
    let code = issue_referral_code(&store, &clock, &UserIdentity::new("  user_pad "), 10)
      .await
      .unwrap();

    let stored = store.get_user("user_pad").await.unwrap().unwrap();
    assert_eq!(stored.identity.id, "user_pad");
    assert_eq!(stored.referral_code, Some(code));
  }

  #[tokio::test]
  async fn issue_retries_after_write_conflict() {
    let store = FakeStore { conflicting_writes: 2, ..FakeStore::default() };
    let clock = SystemClock::new();
    let code = issue_referral_code(&store, &clock, &UserIdentity::new("user_bob"), 10)
      .await
      .unwrap();
    assert!(code.as_str().starts_with(REFERRAL_TAG));
    assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    assert_eq!(store.checks(), 3);
  }

  #[tokio::test]
  async fn issue_conflicts_count_against_the_bound() {
    let store = FakeStore { conflicting_writes: u32::MAX, ..FakeStore::default() };
    let clock = SystemClock::new();
    let err = issue_referral_code(&store, &clock, &UserIdentity::new("user_bob"), 4)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::GenerationExhausted { attempts: 4 }));
    assert_eq!(store.writes.load(Ordering::SeqCst), 4);
  }
}
