pub mod dispatcher;
pub mod messages;
pub mod state;
pub mod validator;

pub mod domain {
    pub mod quantity;
}

pub mod handlers {
    pub mod message;
    pub mod order;
    pub mod refund;
}


use std::sync::Arc;

use crate::{fulfillment::FulfillmentClient, marketplace::Marketplace};

use self::{handlers::refund::FailureRecovery, validator::IdentifierValidator};

/// Collaborators the order handlers act through.
pub struct Services {
    pub market: Arc<dyn Marketplace>,
    pub validator: IdentifierValidator,
    pub fulfillment: FulfillmentClient,
    pub recovery: FailureRecovery,
    /// Only orders in this subcategory are handled.
    pub category_id: u64,
}
