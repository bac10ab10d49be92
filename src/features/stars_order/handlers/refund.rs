use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    features::stars_order::messages, fulfillment::PurchaseOutcome, marketplace::Marketplace,
};

/// What the failure path did for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// HTTP status of the failed purchase; 0 when no response was received.
    pub status: u16,
    pub buyer_notified: bool,
    pub refunded: bool,
    pub deactivated: usize,
}

/// What happens after a failed delivery: tell the buyer, optionally refund,
/// optionally pull every listing in a category so no new orders arrive.
#[derive(Debug, Clone)]
pub struct FailureRecovery {
    pub auto_refund: bool,
    pub auto_deactivate: bool,
    pub deactivate_category_id: u64,
    pub deactivate_delay: Duration,
}

impl FailureRecovery {
    /// Best effort throughout: every step runs even when an earlier one
    /// failed, and nothing here returns an error.
    pub async fn handle_failure(
        &self,
        market: &dyn Marketplace,
        chat_id: &str,
        order_id: &str,
        outcome: &PurchaseOutcome,
    ) -> RecoveryReport {
        warn!(
            order_id,
            status = outcome.status,
            reason = %outcome.message,
            auto_refund = self.auto_refund,
            "Purchase failed, recovering"
        );
        let mut report = RecoveryReport {
            status: outcome.status,
            buyer_notified: false,
            refunded: false,
            deactivated: 0,
        };

        let text = messages::failure(&outcome.message, self.auto_refund);
        match market.send_message(chat_id, &text).await {
            Ok(()) => report.buyer_notified = true,
            Err(err) => {
                error!(order_id, error = %err, "Failed to notify buyer about the failed order")
            }
        }

        if self.auto_refund {
            match market.refund(order_id).await {
                Ok(()) => {
                    info!(order_id, "Refund issued");
                    report.refunded = true;
                }
                Err(err) => error!(order_id, error = %err, "Refund failed"),
            }
        }

        if self.auto_deactivate {
            report.deactivated = self
                .deactivate_category(market, self.deactivate_category_id)
                .await;
        }
        report
    }

    /// Marks every active lot in `category_id` inactive, one at a time.
    /// Returns how many lots were switched off.
    pub async fn deactivate_category(&self, market: &dyn Marketplace, category_id: u64) -> usize {
        let lots = match market.list_lots_in_category(category_id).await {
            Ok(lots) => lots,
            Err(err) => {
                error!(category_id, error = %err, "Failed to list lots for deactivation");
                return 0;
            }
        };

        if lots.is_empty() {
            info!(category_id, "No lots to deactivate");
            return 0;
        }

        let mut deactivated = 0;
        for lot in lots {
            let mut fields = match market.get_lot_fields(lot.id).await {
                Ok(Some(fields)) => fields,
                Ok(None) => continue,
                Err(err) => {
                    error!(lot_id = lot.id, error = %err, "Failed to load lot for deactivation");
                    continue;
                }
            };
            if !fields.active {
                continue;
            }

            fields.active = false;
            if let Err(err) = market.save_lot(&fields).await {
                error!(lot_id = lot.id, error = %err, "Failed to deactivate lot");
                continue;
            }
            deactivated += 1;
            tokio::time::sleep(self.deactivate_delay).await;
        }

        warn!(category_id, deactivated, "Lots auto-deactivated");
        deactivated
    }
}
