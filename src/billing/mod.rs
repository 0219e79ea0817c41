// src/billing/mod.rs — Credit purchases through the payment provider
//
// The orchestrator never touches payments; purchases run through here and
// land in the ledger as a grant carrying the external transaction id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::infra::errors::SurveyorError;
use crate::ledger::Ledger;

/// External payment gateway. Returns the gateway's transaction id.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn charge(
        &self,
        account_id: &str,
        amount_usd: f64,
        method: &str,
    ) -> Result<String, SurveyorError>;
}

/// Result of a completed purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    pub credits_added: i64,
    pub new_balance: i64,
    pub transaction_id: Option<String>,
}

pub struct Billing {
    ledger: Arc<Ledger>,
    provider: Option<Arc<dyn PaymentProvider>>,
    credit_unit_price_usd: f64,
}

impl Billing {
    pub fn new(
        ledger: Arc<Ledger>,
        provider: Option<Arc<dyn PaymentProvider>>,
        credit_unit_price_usd: f64,
    ) -> Self {
        Self {
            ledger,
            provider,
            credit_unit_price_usd,
        }
    }

    /// Charge the payment provider, then grant the credits. With no provider
    /// configured the credits are granted directly (unmetered deployments).
    pub async fn purchase_credits(
        &self,
        account_id: &str,
        credits: i64,
        method: &str,
    ) -> Result<PurchaseOutcome, SurveyorError> {
        let Some(provider) = &self.provider else {
            let new_balance = self
                .ledger
                .grant(account_id, credits, "credits added without payment processing", None)
                .await?;
            return Ok(PurchaseOutcome {
                credits_added: credits,
                new_balance,
                transaction_id: None,
            });
        };

        let amount_usd = credits as f64 * self.credit_unit_price_usd;
        let transaction_id = provider.charge(account_id, amount_usd, method).await?;

        let new_balance = self
            .ledger
            .grant(
                account_id,
                credits,
                &format!("Purchased {credits} credits"),
                Some(&transaction_id),
            )
            .await?;

        Ok(PurchaseOutcome {
            credits_added: credits,
            new_balance,
            transaction_id: Some(transaction_id),
        })
    }
}

/// HTTP payment gateway client.
pub struct HttpPaymentProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    user_id: &'a str,
    amount: f64,
    currency: &'static str,
    description: String,
    payment_method: &'a str,
}

impl HttpPaymentProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn charge(
        &self,
        account_id: &str,
        amount_usd: f64,
        method: &str,
    ) -> Result<String, SurveyorError> {
        let url = format!("{}/v1/transactions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChargeRequest {
                user_id: account_id,
                amount: amount_usd,
                currency: "USD",
                description: format!("Surveyor credit purchase for {account_id}"),
                payment_method: method,
            })
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| SurveyorError::Payment(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SurveyorError::Payment(format!("HTTP {status}: {body}")));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SurveyorError::Payment(format!("Failed to parse response: {e}")))?;

        data["transaction_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SurveyorError::Payment("Response missing transaction_id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::BillingConfig;
    use crate::notify::LogNotifier;

    fn test_ledger() -> Arc<Ledger> {
        let store = crate::store::in_memory().unwrap();
        Arc::new(Ledger::new(
            store,
            BillingConfig::default(),
            Arc::new(LogNotifier),
        ))
    }

    struct FixedProvider {
        txn_id: &'static str,
    }

    #[async_trait]
    impl PaymentProvider for FixedProvider {
        async fn charge(
            &self,
            _account_id: &str,
            _amount_usd: f64,
            _method: &str,
        ) -> Result<String, SurveyorError> {
            Ok(self.txn_id.to_string())
        }
    }

    struct DecliningProvider;

    #[async_trait]
    impl PaymentProvider for DecliningProvider {
        async fn charge(
            &self,
            _account_id: &str,
            _amount_usd: f64,
            _method: &str,
        ) -> Result<String, SurveyorError> {
            Err(SurveyorError::Payment("card declined".into()))
        }
    }

    #[tokio::test]
    async fn test_purchase_grants_credits_with_external_ref() {
        let ledger = test_ledger();
        let billing = Billing::new(
            ledger.clone(),
            Some(Arc::new(FixedProvider { txn_id: "txn-9" })),
            0.10,
        );

        let outcome = billing.purchase_credits("acct-1", 20, "card").await.unwrap();
        assert_eq!(outcome.credits_added, 20);
        assert_eq!(outcome.new_balance, 30); // 10 starting + 20 purchased
        assert_eq!(outcome.transaction_id.as_deref(), Some("txn-9"));

        let (entries, _) = ledger.usage("acct-1", 5).await.unwrap();
        assert_eq!(entries[0].external_ref.as_deref(), Some("txn-9"));
    }

    #[tokio::test]
    async fn test_declined_payment_grants_nothing() {
        let ledger = test_ledger();
        let billing = Billing::new(ledger.clone(), Some(Arc::new(DecliningProvider)), 0.10);

        let err = billing.purchase_credits("acct-1", 20, "card").await;
        assert!(matches!(err, Err(SurveyorError::Payment(_))));
        assert_eq!(ledger.balance("acct-1").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_purchase_without_provider_falls_back_to_direct_grant() {
        let ledger = test_ledger();
        let billing = Billing::new(ledger.clone(), None, 0.10);

        let outcome = billing.purchase_credits("acct-1", 5, "card").await.unwrap();
        assert_eq!(outcome.new_balance, 15);
        assert!(outcome.transaction_id.is_none());
    }
}
