use tracing::{error, info};

use crate::{
    features::stars_order::{
        Services, messages,
        state::{ConversationTable, Phase},
        validator::{Username, with_marker},
    },
    marketplace::{ChatMessage, MarketError},
};

/// Advances the buyer's conversation with one chat message.
///
/// Messages from buyers without an open conversation are ignored, as is
/// blank text. Replies go to the chat the message came from.
pub async fn handle_new_message(
    svc: &Services,
    table: &mut ConversationTable,
    message: &ChatMessage,
) -> Result<(), MarketError> {
    let text = message.text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let buyer_id = message.author_id;
    let Some(phase) = table.get(buyer_id).map(|conv| conv.phase.clone()) else {
        return Ok(());
    };

    if let Phase::AwaitConfirm { candidate } = &phase {
        if text == messages::CONFIRM_TOKEN {
            return deliver(svc, table, buyer_id, candidate).await;
        }
    }

    let username = match svc.validator.validate(&with_marker(text)).await {
        Ok(username) => username,
        Err(rejection) => {
            info!(buyer_id, input = text, %rejection, "Username rejected");
            return svc
                .market
                .send_message(&message.chat_id, &messages::rejection(&rejection))
                .await;
        }
    };

    let reply = match phase {
        Phase::AwaitIdentifier => messages::confirm_prompt(&username),
        Phase::AwaitConfirm { .. } => messages::candidate_updated(&username),
    };
    if let Some(conv) = table.get_mut(buyer_id) {
        conv.phase = Phase::AwaitConfirm {
            candidate: username,
        };
    }
    svc.market.send_message(&message.chat_id, &reply).await
}

/// Closes the conversation before any network call so a repeated `+`
/// cannot trigger a second purchase. Delivery notices go to the order's chat.
async fn deliver(
    svc: &Services,
    table: &mut ConversationTable,
    buyer_id: u64,
    username: &Username,
) -> Result<(), MarketError> {
    let Some(conv) = table.close(buyer_id) else {
        return Ok(());
    };
    let chat_id = conv.chat_id.as_str();

    if let Err(err) = svc
        .market
        .send_message(chat_id, &messages::sending(conv.quantity, username))
        .await
    {
        error!(order_id = %conv.order_id, error = %err, "Failed to send delivery notice");
    }

    let outcome = svc
        .fulfillment
        .purchase(username.as_str(), conv.quantity)
        .await;

    if outcome.success {
        info!(
            order_id = %conv.order_id,
            buyer_id,
            quantity = conv.quantity,
            username = %username,
            "Stars delivered"
        );
        if let Err(err) = svc
            .market
            .send_message(chat_id, &messages::delivered(conv.quantity, username))
            .await
        {
            error!(order_id = %conv.order_id, error = %err, "Failed to send delivery confirmation");
        }
    } else {
        let report = svc
            .recovery
            .handle_failure(svc.market.as_ref(), chat_id, &conv.order_id, &outcome)
            .await;
        info!(
            order_id = %conv.order_id,
            buyer_id,
            status = report.status,
            refunded = report.refunded,
            deactivated = report.deactivated,
            "Failed order recovered"
        );
    }
    Ok(())
}
