// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account and credential repository.
//!
//! Accounts hold public profile data; credentials hold the password hash
//! and the encrypted one-time codes used for verification and password
//! reset. The two are written together during registration.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

use crate::auth::Role;

use super::super::database::{
    decode, get_row, next_id, scan_rows, update_row, DbError, DbResult, VotingDb, ACCOUNTS,
    CREDENTIALS, EMAIL_INDEX, USER_NAME_INDEX,
};

/// A registered user of any role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Account {
    pub id: u64,
    pub user_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub country: String,
    pub address: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_blocked: bool,
    /// Hash of the on-chain participant registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_name: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub country: String,
    pub address: String,
    pub role: Role,
}

/// Password-reset progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResetState {
    #[default]
    None,
    /// A code was emailed; holds its ciphertext.
    Pending { code: String },
    /// The emailed code was confirmed; a new password may be set once.
    Verified,
}

/// Secret material for an account. Never serialized to API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: u64,
    pub password_hash: String,
    /// Ciphertext of the outstanding email-verification code.
    pub verification_code: Option<String>,
    #[serde(default)]
    pub reset: ResetState,
}

/// Outcome of a registration write.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    /// `false` when an unverified account with the same email was overwritten.
    pub created: bool,
}

/// Normalize a user name or email for index lookups.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// Repository for accounts and their credentials.
pub struct AccountRepository<'a> {
    db: &'a VotingDb,
}

impl<'a> AccountRepository<'a> {
    pub fn new(db: &'a VotingDb) -> Self {
        Self { db }
    }

    /// Register a participant account together with its credentials.
    ///
    /// Runs in one write transaction:
    /// - a user name held by another account is rejected
    /// - a verified account with the same email is rejected
    /// - an unverified account with the same email is overwritten in place
    ///
    /// Nothing is written when a check fails.
    pub fn register(
        &self,
        new: &NewAccount,
        password_hash: &str,
        verification_code: &str,
    ) -> DbResult<Registration> {
        let user_key = normalize_key(&new.user_name);
        let email_key = normalize_key(&new.email);
        let now = Utc::now();

        let write_txn = self.db.inner().begin_write()?;
        let registration = {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let mut user_index = write_txn.open_table(USER_NAME_INDEX)?;
            let mut email_index = write_txn.open_table(EMAIL_INDEX)?;
            let mut credentials = write_txn.open_table(CREDENTIALS)?;

            let email_owner = email_index.get(email_key.as_str())?.map(|v| v.value());
            let user_owner = user_index.get(user_key.as_str())?.map(|v| v.value());

            if let Some(owner) = user_owner {
                if Some(owner) != email_owner {
                    return Err(DbError::Conflict("Username already exist".to_string()));
                }
            }

            let existing: Option<Account> = match email_owner {
                Some(id) => {
                    let bytes = accounts
                        .get(id)?
                        .ok_or_else(|| DbError::NotFound(format!("Account {id}")))?
                        .value()
                        .to_vec();
                    Some(decode(&bytes)?)
                }
                None => None,
            };

            if let Some(ref account) = existing {
                if account.is_verified {
                    return Err(DbError::Conflict("Email already exist".to_string()));
                }
                // Release the old user name when the re-registration changes it
                let old_key = normalize_key(&account.user_name);
                if old_key != user_key {
                    user_index.remove(old_key.as_str())?;
                }
            }

            let created = existing.is_none();
            let (id, created_at) = match existing {
                Some(account) => (account.id, account.created_at),
                None => (next_id(&write_txn, "accounts")?, now),
            };

            let account = Account {
                id,
                user_name: new.user_name.trim().to_string(),
                name: new.name.trim().to_string(),
                email: new.email.trim().to_string(),
                phone: new.phone.trim().to_string(),
                city: new.city.trim().to_string(),
                country: new.country.trim().to_string(),
                address: new.address.trim().to_string(),
                role: new.role,
                is_verified: false,
                is_blocked: false,
                chain_tx_hash: None,
                created_at,
                updated_at: now,
            };
            let creds = Credentials {
                user_id: id,
                password_hash: password_hash.to_string(),
                verification_code: Some(verification_code.to_string()),
                reset: ResetState::None,
            };

            accounts.insert(id, serde_json::to_vec(&account)?.as_slice())?;
            credentials.insert(id, serde_json::to_vec(&creds)?.as_slice())?;
            user_index.insert(user_key.as_str(), id)?;
            email_index.insert(email_key.as_str(), id)?;

            Registration { account, created }
        };
        write_txn.commit()?;
        Ok(registration)
    }

    /// Create the admin account if no account owns the seed email.
    ///
    /// Admin accounts are verified from the start.
    pub fn ensure_admin(
        &self,
        user_name: &str,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> DbResult<Account> {
        if let Some(existing) = self.find_by_email(email)? {
            if existing.role != Role::Admin {
                return Err(DbError::Conflict(format!(
                    "Seed admin email {email} belongs to a {} account",
                    existing.role
                )));
            }
            return Ok(existing);
        }

        let user_key = normalize_key(user_name);
        let email_key = normalize_key(email);
        let now = Utc::now();

        let write_txn = self.db.inner().begin_write()?;
        let account = {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let mut user_index = write_txn.open_table(USER_NAME_INDEX)?;
            let mut email_index = write_txn.open_table(EMAIL_INDEX)?;
            let mut credentials = write_txn.open_table(CREDENTIALS)?;

            if user_index.get(user_key.as_str())?.is_some() {
                return Err(DbError::Conflict("Username already exist".to_string()));
            }

            let id = next_id(&write_txn, "accounts")?;
            let account = Account {
                id,
                user_name: user_name.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                phone: String::new(),
                city: String::new(),
                country: String::new(),
                address: String::new(),
                role: Role::Admin,
                is_verified: true,
                is_blocked: false,
                chain_tx_hash: None,
                created_at: now,
                updated_at: now,
            };
            let creds = Credentials {
                user_id: id,
                password_hash: password_hash.to_string(),
                verification_code: None,
                reset: ResetState::None,
            };

            accounts.insert(id, serde_json::to_vec(&account)?.as_slice())?;
            credentials.insert(id, serde_json::to_vec(&creds)?.as_slice())?;
            user_index.insert(user_key.as_str(), id)?;
            email_index.insert(email_key.as_str(), id)?;
            account
        };
        write_txn.commit()?;
        Ok(account)
    }

    pub fn get(&self, id: u64) -> DbResult<Option<Account>> {
        get_row(self.db.inner(), ACCOUNTS, id)
    }

    pub fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        self.find_by_index(EMAIL_INDEX, &normalize_key(email))
    }

    pub fn find_by_user_name(&self, user_name: &str) -> DbResult<Option<Account>> {
        self.find_by_index(USER_NAME_INDEX, &normalize_key(user_name))
    }

    fn find_by_index(
        &self,
        index: redb::TableDefinition<'_, &'static str, u64>,
        key: &str,
    ) -> DbResult<Option<Account>> {
        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(index)?;
        let Some(id) = index.get(key)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let accounts = read_txn.open_table(ACCOUNTS)?;
        match accounts.get(id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn credentials(&self, user_id: u64) -> DbResult<Option<Credentials>> {
        get_row(self.db.inner(), CREDENTIALS, user_id)
    }

    /// All accounts of one role, in id order.
    pub fn list_by_role(&self, role: Role) -> DbResult<Vec<Account>> {
        let accounts: Vec<Account> = scan_rows(self.db.inner(), ACCOUNTS)?;
        Ok(accounts.into_iter().filter(|a| a.role == role).collect())
    }

    /// Count verified accounts of one role.
    pub fn count_verified(&self, role: Role) -> DbResult<usize> {
        Ok(self
            .list_by_role(role)?
            .iter()
            .filter(|a| a.is_verified)
            .count())
    }

    /// Mark the account verified and drop its verification code.
    pub fn mark_verified(&self, user_id: u64) -> DbResult<usize> {
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut accounts = write_txn.open_table(ACCOUNTS)?;
            let mut account: Account = match accounts.get(user_id)? {
                Some(row) => decode(row.value())?,
                None => return Ok(0),
            };
            account.is_verified = true;
            account.updated_at = Utc::now();
            accounts.insert(user_id, serde_json::to_vec(&account)?.as_slice())?;

            let mut credentials = write_txn.open_table(CREDENTIALS)?;
            let stored: Option<Credentials> = match credentials.get(user_id)? {
                Some(row) => Some(decode(row.value())?),
                None => None,
            };
            if let Some(mut creds) = stored {
                creds.verification_code = None;
                credentials.insert(user_id, serde_json::to_vec(&creds)?.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(1)
    }

    /// Record the participant-registration transaction hash.
    pub fn stamp_chain_hash(&self, user_id: u64, tx_hash: &str) -> DbResult<usize> {
        update_row::<Account, _>(self.db.inner(), ACCOUNTS, user_id, |a| {
            a.chain_tx_hash = Some(tx_hash.to_string());
            a.updated_at = Utc::now();
        })
    }

    pub fn set_blocked(&self, user_id: u64, blocked: bool) -> DbResult<usize> {
        update_row::<Account, _>(self.db.inner(), ACCOUNTS, user_id, |a| {
            a.is_blocked = blocked;
            a.updated_at = Utc::now();
        })
    }

    pub fn set_reset_state(&self, user_id: u64, reset: ResetState) -> DbResult<usize> {
        update_row::<Credentials, _>(self.db.inner(), CREDENTIALS, user_id, |c| {
            c.reset = reset;
        })
    }

    /// Replace the password hash and close the reset flow.
    pub fn update_password(&self, user_id: u64, password_hash: &str) -> DbResult<usize> {
        update_row::<Credentials, _>(self.db.inner(), CREDENTIALS, user_id, |c| {
            c.password_hash = password_hash.to_string();
            c.reset = ResetState::None;
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_db;

    pub(crate) fn voter(user_name: &str, email: &str) -> NewAccount {
        NewAccount {
            user_name: user_name.to_string(),
            name: "Test Voter".to_string(),
            email: email.to_string(),
            phone: "0300".to_string(),
            city: "Lahore".to_string(),
            country: "PK".to_string(),
            address: "Street 1".to_string(),
            role: Role::Voter,
        }
    }

    #[test]
    fn register_and_lookup() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);

        let reg = repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();
        assert!(reg.created);
        assert_eq!(reg.account.id, 1);
        assert!(!reg.account.is_verified);

        let by_email = repo.find_by_email("ALICE@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, 1);
        let by_name = repo.find_by_user_name(" Alice ").unwrap().unwrap();
        assert_eq!(by_name.email, "alice@example.com");

        let creds = repo.credentials(1).unwrap().unwrap();
        assert_eq!(creds.password_hash, "hash");
        assert_eq!(creds.verification_code.as_deref(), Some("code"));
    }

    #[test]
    fn duplicate_user_name_writes_nothing() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();

        let err = repo
            .register(&voter("alice", "other@example.com"), "hash2", "code2")
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m == "Username already exist"));

        assert!(repo.find_by_email("other@example.com").unwrap().is_none());
        assert!(repo.credentials(2).unwrap().is_none());
        assert_eq!(repo.credentials(1).unwrap().unwrap().password_hash, "hash");
    }

    #[test]
    fn unverified_email_is_overwritten() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();

        let reg = repo
            .register(&voter("alice2", "alice@example.com"), "hash2", "code2")
            .unwrap();
        assert!(!reg.created);
        assert_eq!(reg.account.id, 1);
        assert_eq!(reg.account.user_name, "alice2");

        // Old user name is released
        assert!(repo.find_by_user_name("alice").unwrap().is_none());
        assert_eq!(repo.credentials(1).unwrap().unwrap().password_hash, "hash2");
    }

    #[test]
    fn verified_email_is_rejected() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();
        assert_eq!(repo.mark_verified(1).unwrap(), 1);

        let err = repo
            .register(&voter("bob", "alice@example.com"), "hash", "code")
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m == "Email already exist"));
    }

    #[test]
    fn mark_verified_clears_code() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();

        assert_eq!(repo.mark_verified(1).unwrap(), 1);
        assert!(repo.get(1).unwrap().unwrap().is_verified);
        assert!(repo.credentials(1).unwrap().unwrap().verification_code.is_none());
        assert_eq!(repo.mark_verified(99).unwrap(), 0);
    }

    #[test]
    fn mark_verified_is_all_or_nothing() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();

        // Unreadable credentials row makes the second half fail
        let write_txn = db.inner().begin_write().unwrap();
        {
            let mut credentials = write_txn.open_table(CREDENTIALS).unwrap();
            credentials.insert(1, b"not json".as_slice()).unwrap();
        }
        write_txn.commit().unwrap();

        assert!(repo.mark_verified(1).is_err());
        assert!(!repo.get(1).unwrap().unwrap().is_verified);
    }

    #[test]
    fn reset_flow_state_transitions() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("alice", "alice@example.com"), "hash", "code").unwrap();

        repo.set_reset_state(1, ResetState::Pending { code: "c".into() }).unwrap();
        repo.set_reset_state(1, ResetState::Verified).unwrap();
        assert_eq!(repo.credentials(1).unwrap().unwrap().reset, ResetState::Verified);

        assert_eq!(repo.update_password(1, "new-hash").unwrap(), 1);
        let creds = repo.credentials(1).unwrap().unwrap();
        assert_eq!(creds.password_hash, "new-hash");
        assert_eq!(creds.reset, ResetState::None);
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        let one = repo.ensure_admin("admin", "Admin", "admin@example.com", "h").unwrap();
        let two = repo.ensure_admin("admin", "Admin", "admin@example.com", "h").unwrap();
        assert_eq!(one.id, two.id);
        assert!(one.is_verified);
        assert_eq!(repo.list_by_role(Role::Admin).unwrap().len(), 1);
    }

    #[test]
    fn counts_only_verified_accounts() {
        let (db, _dir) = temp_db();
        let repo = AccountRepository::new(&db);
        repo.register(&voter("a", "a@example.com"), "h", "c").unwrap();
        repo.register(&voter("b", "b@example.com"), "h", "c").unwrap();
        repo.mark_verified(2).unwrap();
        assert_eq!(repo.count_verified(Role::Voter).unwrap(), 1);
        assert_eq!(repo.count_verified(Role::Candidate).unwrap(), 0);
    }
}
