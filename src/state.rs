// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{sync::Arc, time::Duration};

use crate::auth::{JwtKeys, SecretBox};
use crate::blockchain::ChainGateway;
use crate::ledger::DualWrite;
use crate::mailer::Mailer;
use crate::storage::{UploadStore, VotingDb};

/// Shared handles injected into every handler.
///
/// Everything is built once in `main`; nothing here is mutable module state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<VotingDb>,
    pub chain: Arc<dyn ChainGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub secrets: Arc<SecretBox>,
    pub jwt: Arc<JwtKeys>,
    pub uploads: UploadStore,
    /// Account whose wallet signs admin-side contract calls.
    pub admin_id: u64,
    pub code_length: usize,
    pub reconcile_grace: Duration,
}

impl AppState {
    /// Dual-write executor over this state's store, chain and key box.
    pub fn ledger(&self) -> DualWrite<'_> {
        DualWrite::new(&self.db, self.chain.as_ref(), &self.secrets)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::{hash_password, Role};
    use crate::blockchain::{gateway::mock::MockChain, WalletProvider};
    use crate::mailer::mock::RecordingMailer;
    use crate::storage::{Account, AccountRepository, NewAccount};

    pub(crate) const TEST_PASSWORD: &str = "password123";

    /// Fully wired state over a temp database, a scripted chain and a
    /// recording mailer. The admin account exists and has a wallet.
    pub(crate) struct TestContext {
        pub state: AppState,
        pub chain: Arc<MockChain>,
        pub mailer: Arc<RecordingMailer>,
        _dir: tempfile::TempDir,
    }

    pub(crate) fn test_context() -> TestContext {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(VotingDb::open(&dir.path().join("test.redb")).unwrap());
        let secrets = Arc::new(SecretBox::new(&[7u8; 32]).unwrap());

        let admin = AccountRepository::new(&db)
            .ensure_admin(
                "admin",
                "Administrator",
                "admin@example.com",
                &hash_password(TEST_PASSWORD).unwrap(),
            )
            .unwrap();
        WalletProvider::new(&db, &secrets).get_or_create(admin.id).unwrap();

        let chain = Arc::new(MockChain::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState {
            db,
            chain: chain.clone(),
            mailer: mailer.clone(),
            secrets,
            jwt: Arc::new(JwtKeys::new(b"test-secret", Duration::from_secs(3600))),
            uploads: UploadStore::new(dir.path().join("public")),
            admin_id: admin.id,
            code_length: 6,
            reconcile_grace: Duration::from_secs(300),
        };

        TestContext {
            state,
            chain,
            mailer,
            _dir: dir,
        }
    }

    /// Insert a participant account. Verified seeds also get a wallet.
    pub(crate) fn seed_account(state: &AppState, user_name: &str, role: Role, verified: bool) -> Account {
        let accounts = AccountRepository::new(&state.db);
        let new = NewAccount {
            user_name: user_name.to_string(),
            name: format!("{user_name} name"),
            email: format!("{user_name}@example.com"),
            phone: "0300".to_string(),
            city: "Lahore".to_string(),
            country: "PK".to_string(),
            address: "Street 1".to_string(),
            role,
        };
        let code = state.secrets.encrypt_str("123456").unwrap();
        let reg = accounts
            .register(&new, &hash_password(TEST_PASSWORD).unwrap(), &code)
            .unwrap();
        if verified {
            accounts.mark_verified(reg.account.id).unwrap();
            WalletProvider::new(&state.db, &state.secrets)
                .get_or_create(reg.account.id)
                .unwrap();
        }
        accounts.get(reg.account.id).unwrap().unwrap()
    }

    pub(crate) fn token_for(state: &AppState, account: &Account) -> String {
        state.jwt.issue(account).unwrap()
    }

    pub(crate) fn admin_account(state: &AppState) -> Account {
        AccountRepository::new(&state.db)
            .get(state.admin_id)
            .unwrap()
            .unwrap()
    }
}
