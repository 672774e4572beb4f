use async_trait::async_trait;

/// Result of asking the payment collaborator to settle a listing fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Settled,
    Failed(String),
}

/// Confirms payment for a new listing before it is written.
#[async_trait]
pub trait PaymentGate: Send + Sync {
    async fn confirm(&self, token: Option<&str>) -> PaymentOutcome;
}

/// Gate used when listing fees are not charged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaivedPayments;

#[async_trait]
impl PaymentGate for WaivedPayments {
    async fn confirm(&self, _token: Option<&str>) -> PaymentOutcome {
        PaymentOutcome::Settled
    }
}
