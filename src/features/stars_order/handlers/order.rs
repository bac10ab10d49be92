use tracing::{info, warn};

use crate::{
    features::stars_order::{
        Services,
        domain::quantity::extract_quantity,
        messages,
        state::{Conversation, ConversationTable},
    },
    marketplace::MarketError,
};

/// Opens a conversation for a freshly paid order and asks the buyer for
/// their username. Orders outside the configured subcategory are ignored.
pub async fn handle_new_order(
    svc: &Services,
    table: &mut ConversationTable,
    order_id: &str,
) -> Result<(), MarketError> {
    let order = svc.market.get_order(order_id).await?;

    if order.subcategory_id != Some(svc.category_id) {
        info!(
            order_id,
            subcategory_id = ?order.subcategory_id,
            "Order outside the stars category, skipping"
        );
        return Ok(());
    }

    let quantity = extract_quantity(&order.title, &order.description);
    info!(
        order_id,
        buyer_id = order.buyer_id,
        quantity,
        title = %order.title,
        "New stars order"
    );

    let conversation = Conversation::new(order.id.clone(), order.chat_id.clone(), quantity);
    if let Some(previous) = table.open(order.buyer_id, conversation) {
        warn!(
            buyer_id = order.buyer_id,
            previous_order = %previous.order_id,
            order_id,
            "Buyer had an unfinished order, it is replaced by the new one"
        );
    }

    svc.market
        .send_message(&order.chat_id, &messages::order_prompt(quantity))
        .await
}
