//! Buyer-facing chat texts.

use super::validator::{IdentifierRejection, Username};

/// The only text accepted as confirmation of the candidate username.
pub const CONFIRM_TOKEN: &str = "+";

pub fn order_prompt(quantity: u32) -> String {
    format!(
        "🎉 Спасибо за покупку!\n\n\
         К выдаче: {quantity} ⭐\n\n\
         Пришлите, пожалуйста, ваш Telegram-тег в формате @username.\n\
         Где его найти: Telegram → Профиль → Имя пользователя."
    )
}

pub fn rejection(reason: &IdentifierRejection) -> String {
    format!("❌ {reason}")
}

pub fn confirm_prompt(username: &Username) -> String {
    format!(
        "Вы указали: {username}. Если верно, отправьте `{CONFIRM_TOKEN}`. \
         Чтобы изменить, пришлите другой @username."
    )
}

pub fn candidate_updated(username: &Username) -> String {
    format!("Обновлено: {username}. Если верно, отправьте `{CONFIRM_TOKEN}`.")
}

pub fn sending(quantity: u32, username: &Username) -> String {
    format!("🚀 Отправляю {quantity} ⭐ пользователю {username}…")
}

pub fn delivered(quantity: u32, username: &Username) -> String {
    format!(
        "✅ Успешно отправлено {quantity} ⭐ пользователю {username}! Спасибо за заказ.\n\n\
         🙏 Если всё прошло хорошо, оставьте, пожалуйста, короткий отзыв: это очень помогает \
         другим покупателям."
    )
}

pub fn failure(reason: &str, auto_refund: bool) -> String {
    let refund_note = if auto_refund {
        "Деньги будут возвращены автоматически."
    } else {
        "⚠️ Автоматический возврат выключен. Свяжитесь с продавцом для возврата."
    };
    format!("❌ {reason}\n\n{refund_note}")
}
