// src/store/store.rs — SQLite operations
//
// Every compound mutation (reserve, settle, session supersede) runs inside a
// single transaction; the conditional UPDATE on accounts.credits is the
// commit point for concurrent reservations against one account.

use rusqlite::{params, Connection, OptionalExtension};

pub struct Store {
    conn: Connection,
}

/// Outcome of a reserve attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DebitAttempt {
    Reserved,
    Insufficient { balance: i64 },
}

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub account_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_digest: Option<String>,
    pub credits: i64,
    pub is_active: bool,
    pub created_at: String,
    pub last_activity: String,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub token: String,
    pub account_id: String,
    pub issued_at: String,
    pub expires_at: String,
    pub active: bool,
    pub ended_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerEntryRow {
    pub id: i64,
    pub account_id: String,
    pub delta: i64,
    pub action: String,
    pub detail: Option<String>,
    pub external_ref: Option<String>,
    pub created_at: String,
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        account_id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_digest: row.get(3)?,
        credits: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        last_activity: row.get(7)?,
    })
}

const ACCOUNT_COLUMNS: &str = "account_id, username, email, password_digest, credits, \
     is_active, created_at, last_activity";

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // -- Accounts --

    /// Create the account with the starting balance if it does not exist.
    /// The implicit creation grant is recorded as a ledger entry so the
    /// sum-of-deltas invariant holds from the account's first row.
    /// Returns whether a row was created.
    pub fn ensure_account(
        &self,
        account_id: &str,
        starting_credits: i64,
        now: &str,
    ) -> anyhow::Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let created = Self::ensure_account_in_tx(&tx, account_id, starting_credits, now)?;
        tx.commit()?;
        Ok(created)
    }

    fn ensure_account_in_tx(
        tx: &rusqlite::Transaction<'_>,
        account_id: &str,
        starting_credits: i64,
        now: &str,
    ) -> anyhow::Result<bool> {
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO accounts (account_id, credits, created_at, last_activity)
             VALUES (?1, ?2, ?3, ?3)",
            params![account_id, starting_credits, now],
        )?;
        if inserted > 0 {
            tx.execute(
                "INSERT INTO ledger_entries (account_id, delta, action, detail, created_at)
                 VALUES (?1, ?2, 'admin_adjustment', 'starting balance', ?3)",
                params![account_id, starting_credits, now],
            )?;
        }
        Ok(inserted > 0)
    }

    /// Create a registered account (username/email/password). The caller is
    /// responsible for uniqueness pre-checks that map to user-visible errors.
    pub fn insert_account(
        &self,
        account_id: &str,
        username: &str,
        email: &str,
        password_digest: &str,
        starting_credits: i64,
        now: &str,
    ) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO accounts
               (account_id, username, email, password_digest, credits, created_at, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                account_id,
                username,
                email,
                password_digest,
                starting_credits,
                now
            ],
        )?;
        tx.execute(
            "INSERT INTO ledger_entries (account_id, delta, action, detail, created_at)
             VALUES (?1, ?2, 'admin_adjustment', 'starting balance', ?3)",
            params![account_id, starting_credits, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn find_account(&self, account_id: &str) -> anyhow::Result<Option<AccountRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = ?1"),
                [account_id],
                account_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_account_by_login(&self, username_or_email: &str) -> anyhow::Result<Option<AccountRow>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1 OR email = ?1"
                ),
                [username_or_email],
                account_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn touch_account(&self, account_id: &str, now: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE accounts SET last_activity = ?1 WHERE account_id = ?2",
            params![now, account_id],
        )?;
        Ok(())
    }

    // -- Reservations --

    /// Atomically check and provisionally debit the account, creating it with
    /// the starting balance first if absent. The conditional UPDATE only
    /// succeeds when the balance covers the amount, so two concurrent
    /// reservations can never both spend the last credit.
    pub fn reserve(
        &self,
        token: &str,
        account_id: &str,
        amount: i64,
        starting_credits: i64,
        now: &str,
        expires_at: &str,
    ) -> anyhow::Result<DebitAttempt> {
        let tx = self.conn.unchecked_transaction()?;
        Self::ensure_account_in_tx(&tx, account_id, starting_credits, now)?;

        let debited = tx.execute(
            "UPDATE accounts SET credits = credits - ?1, last_activity = ?2
             WHERE account_id = ?3 AND credits >= ?1",
            params![amount, now, account_id],
        )?;

        if debited == 0 {
            let balance: i64 = tx.query_row(
                "SELECT credits FROM accounts WHERE account_id = ?1",
                [account_id],
                |r| r.get(0),
            )?;
            tx.commit()?;
            return Ok(DebitAttempt::Insufficient { balance });
        }

        tx.execute(
            "INSERT INTO reservations (token, account_id, amount, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![token, account_id, amount, now, expires_at],
        )?;
        tx.commit()?;
        Ok(DebitAttempt::Reserved)
    }

    /// Make a pending debit permanent: delete the reservation and append the
    /// consumption entry. Returns (account_id, amount, balance_after), or
    /// None when the reservation is unknown or already settled.
    pub fn commit_reservation(
        &self,
        token: &str,
        action: &str,
        detail: &str,
        now: &str,
    ) -> anyhow::Result<Option<(String, i64, i64)>> {
        let tx = self.conn.unchecked_transaction()?;

        let Some((account_id, amount)) = tx
            .query_row(
                "SELECT account_id, amount FROM reservations WHERE token = ?1",
                [token],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?
        else {
            return Ok(None);
        };

        tx.execute("DELETE FROM reservations WHERE token = ?1", [token])?;
        tx.execute(
            "INSERT INTO ledger_entries (account_id, delta, action, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![account_id, -amount, action, detail, now],
        )?;

        let balance_after: i64 = tx.query_row(
            "SELECT credits FROM accounts WHERE account_id = ?1",
            [&account_id],
            |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(Some((account_id, amount, balance_after)))
    }

    /// Revert a pending debit without logging a consumption entry.
    /// Returns (account_id, amount), or None when already settled.
    pub fn rollback_reservation(&self, token: &str) -> anyhow::Result<Option<(String, i64)>> {
        let tx = self.conn.unchecked_transaction()?;

        let Some((account_id, amount)) = tx
            .query_row(
                "SELECT account_id, amount FROM reservations WHERE token = ?1",
                [token],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?
        else {
            return Ok(None);
        };

        tx.execute("DELETE FROM reservations WHERE token = ?1", [token])?;
        tx.execute(
            "UPDATE accounts SET credits = credits + ?1 WHERE account_id = ?2",
            params![amount, account_id],
        )?;
        tx.commit()?;
        Ok(Some((account_id, amount)))
    }

    /// Revert every reservation whose expiry has passed. A caller that
    /// disconnected mid-request can therefore never leak credit.
    pub fn expire_reservations(&self, now: &str) -> anyhow::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE accounts SET credits = credits + (
                SELECT COALESCE(SUM(amount), 0) FROM reservations
                WHERE account_id = accounts.account_id AND expires_at <= ?1
             )
             WHERE account_id IN (
                SELECT account_id FROM reservations WHERE expires_at <= ?1
             )",
            [now],
        )?;
        let reverted = tx.execute("DELETE FROM reservations WHERE expires_at <= ?1", [now])?;
        tx.commit()?;
        Ok(reverted)
    }

    pub fn pending_reservations(&self, account_id: &str) -> anyhow::Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reservations WHERE account_id = ?1",
            [account_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // -- Ledger --

    /// Increment the balance and append a positive entry, creating the
    /// account first if absent.
    pub fn grant(
        &self,
        account_id: &str,
        amount: i64,
        action: &str,
        detail: &str,
        external_ref: Option<&str>,
        starting_credits: i64,
        now: &str,
    ) -> anyhow::Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        Self::ensure_account_in_tx(&tx, account_id, starting_credits, now)?;

        tx.execute(
            "UPDATE accounts SET credits = credits + ?1, last_activity = ?2
             WHERE account_id = ?3",
            params![amount, now, account_id],
        )?;
        tx.execute(
            "INSERT INTO ledger_entries (account_id, delta, action, detail, external_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![account_id, amount, action, detail, external_ref, now],
        )?;

        let balance: i64 = tx.query_row(
            "SELECT credits FROM accounts WHERE account_id = ?1",
            [account_id],
            |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(balance)
    }

    pub fn ledger_entries(&self, account_id: &str, limit: u32) -> anyhow::Result<Vec<LedgerEntryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, delta, action, detail, external_ref, created_at
             FROM ledger_entries WHERE account_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![account_id, limit], |row| {
                Ok(LedgerEntryRow {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    delta: row.get(2)?,
                    action: row.get(3)?,
                    detail: row.get(4)?,
                    external_ref: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn sum_ledger_deltas(&self, account_id: &str) -> anyhow::Result<i64> {
        let sum: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(delta), 0) FROM ledger_entries WHERE account_id = ?1",
            [account_id],
            |r| r.get(0),
        )?;
        Ok(sum)
    }

    pub fn count_entries_for_action(&self, account_id: &str, action: &str) -> anyhow::Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ledger_entries WHERE account_id = ?1 AND action = ?2",
            params![account_id, action],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // -- Sessions --

    /// Supersede any active sessions for the account, then insert the new
    /// one. Runs in one transaction so two concurrent logins can never both
    /// end up active.
    pub fn create_session(
        &self,
        token: &str,
        account_id: &str,
        issued_at: &str,
        expires_at: &str,
    ) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE sessions SET active = 0, ended_reason = 'superseded'
             WHERE account_id = ?1 AND active = 1",
            [account_id],
        )?;
        tx.execute(
            "INSERT INTO sessions (token, account_id, issued_at, expires_at, active)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![token, account_id, issued_at, expires_at],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn find_session(&self, token: &str) -> anyhow::Result<Option<SessionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT token, account_id, issued_at, expires_at, active, ended_reason
                 FROM sessions WHERE token = ?1",
                [token],
                |row| {
                    Ok(SessionRow {
                        token: row.get(0)?,
                        account_id: row.get(1)?,
                        issued_at: row.get(2)?,
                        expires_at: row.get(3)?,
                        active: row.get::<_, i64>(4)? != 0,
                        ended_reason: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Mark a session inactive. Idempotent; returns whether an active
    /// session was found.
    pub fn end_session(&self, token: &str, reason: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE sessions SET active = 0, ended_reason = ?1
             WHERE token = ?2 AND active = 1",
            params![reason, token],
        )?;
        Ok(changed > 0)
    }
}
