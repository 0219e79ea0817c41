// src/ledger/mod.rs — Credit balance and append-only usage log
//
// The balance column is a cached projection; ledger_entries is the source of
// truth. A debit is split into reserve (provisional, atomic check-and-
// decrement) and commit/rollback so a request that dies before producing a
// report never charges the caller, while a concurrent request can never
// spend credit that is already provisionally committed.

use std::sync::{Arc, MutexGuard};

use chrono::{Duration, Utc};

use crate::infra::config::BillingConfig;
use crate::infra::errors::SurveyorError;
use crate::notify::Notifier;
use crate::store::{DebitAttempt, LedgerEntryRow, SharedStore, Store};

/// What a ledger entry records. Stored as its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Query,
    AdminAdjustment,
    Purchase,
    Refund,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Query => "query",
            ActionKind::AdminAdjustment => "admin_adjustment",
            ActionKind::Purchase => "purchase",
            ActionKind::Refund => "refund",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisional debit. Not Clone: exactly one of commit or rollback can
/// consume it.
#[derive(Debug)]
pub struct ReservationToken {
    token: String,
    account_id: String,
    amount: i64,
}

impl ReservationToken {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}

pub struct Ledger {
    store: SharedStore,
    policy: BillingConfig,
    notifier: Arc<dyn Notifier>,
}

impl Ledger {
    pub fn new(store: SharedStore, policy: BillingConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            policy,
            notifier,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>, SurveyorError> {
        self.store
            .lock()
            .map_err(|_| SurveyorError::Other(anyhow::anyhow!("store mutex poisoned")))
    }

    /// Atomically verify and provisionally debit `amount` from the account,
    /// creating it with the starting balance on first use. Unconfirmed
    /// reservations auto-expire after the configured TTL.
    pub async fn reserve(
        &self,
        account_id: &str,
        amount: i64,
    ) -> Result<ReservationToken, SurveyorError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.policy.reservation_ttl_seconds);
        let token = uuid::Uuid::new_v4().to_string();

        let attempt = {
            let store = self.store()?;
            // Lazy sweep so credit held by a dropped connection frees up
            // before the balance check.
            store.expire_reservations(&now.to_rfc3339())?;
            store.reserve(
                &token,
                account_id,
                amount,
                self.policy.starting_credits,
                &now.to_rfc3339(),
                &expires_at.to_rfc3339(),
            )?
        };

        match attempt {
            DebitAttempt::Reserved => Ok(ReservationToken {
                token,
                account_id: account_id.to_string(),
                amount,
            }),
            DebitAttempt::Insufficient { balance } => Err(SurveyorError::InsufficientCredit {
                balance,
                required: amount,
            }),
        }
    }

    /// Make the reservation permanent and append the consumption entry.
    pub async fn commit(
        &self,
        reservation: ReservationToken,
        action: ActionKind,
        detail: &str,
    ) -> Result<(), SurveyorError> {
        let now = Utc::now().to_rfc3339();
        let settled = self.store()?.commit_reservation(
            &reservation.token,
            action.as_str(),
            detail,
            &now,
        )?;

        let Some((account_id, _, balance_after)) = settled else {
            return Err(SurveyorError::UnknownReservation(reservation.token));
        };

        self.maybe_notify_low_balance(&account_id, balance_after);
        Ok(())
    }

    /// Revert the reservation without logging a consumption entry.
    pub async fn rollback(&self, reservation: ReservationToken) -> Result<(), SurveyorError> {
        let settled = self.store()?.rollback_reservation(&reservation.token)?;
        if settled.is_none() {
            return Err(SurveyorError::UnknownReservation(reservation.token));
        }
        tracing::debug!(
            account_id = %reservation.account_id,
            amount = reservation.amount,
            "Reservation rolled back"
        );
        Ok(())
    }

    /// Increment the balance and append a positive entry. Creates the
    /// account on first use; never fails for an unknown account.
    pub async fn grant(
        &self,
        account_id: &str,
        amount: i64,
        reason: &str,
        external_ref: Option<&str>,
    ) -> Result<i64, SurveyorError> {
        let action = if external_ref.is_some() {
            ActionKind::Purchase
        } else {
            ActionKind::AdminAdjustment
        };
        let balance = self.store()?.grant(
            account_id,
            amount,
            action.as_str(),
            reason,
            external_ref,
            self.policy.starting_credits,
            &Utc::now().to_rfc3339(),
        )?;
        Ok(balance)
    }

    /// Current balance; creates the account with the starting balance when
    /// absent.
    pub async fn balance(&self, account_id: &str) -> Result<i64, SurveyorError> {
        let store = self.store()?;
        store.ensure_account(
            account_id,
            self.policy.starting_credits,
            &Utc::now().to_rfc3339(),
        )?;
        let account = store
            .find_account(account_id)?
            .ok_or_else(|| SurveyorError::UnknownAccount(account_id.to_string()))?;
        Ok(account.credits)
    }

    /// Recent ledger activity plus the total committed query count.
    pub async fn usage(
        &self,
        account_id: &str,
        limit: u32,
    ) -> Result<(Vec<LedgerEntryRow>, i64), SurveyorError> {
        let store = self.store()?;
        let entries = store.ledger_entries(account_id, limit)?;
        let reports = store.count_entries_for_action(account_id, ActionKind::Query.as_str())?;
        Ok((entries, reports))
    }

    /// Revert reservations past their expiry. Also runs lazily inside
    /// reserve; the serve loop calls this on an interval as a backstop.
    pub fn sweep_expired(&self) -> Result<usize, SurveyorError> {
        let reverted = self.store()?.expire_reservations(&Utc::now().to_rfc3339())?;
        if reverted > 0 {
            tracing::info!(reverted, "Reverted stale reservations");
        }
        Ok(reverted)
    }

    pub fn query_cost(&self) -> i64 {
        self.policy.query_cost
    }

    fn maybe_notify_low_balance(&self, account_id: &str, balance: i64) {
        if balance >= self.policy.low_balance_threshold {
            return;
        }
        let notifier = self.notifier.clone();
        let account_id = account_id.to_string();
        tokio::spawn(async move {
            notifier.low_balance(&account_id, balance).await;
        });
    }
}
