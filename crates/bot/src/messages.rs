//! User-visible message rendering.
//!
//! Every string leaving the façade comes from here, so the tone stays
//! consistent and no internal error detail ever reaches the chat.

use parcelbot_core::Order;

pub const AUTH_PROMPT: &str =
    "Please send your order code or phone number first so I can find your order 📦";

pub const NO_ACTIVE_ORDERS: &str = "📦 No active orders yet. I checked everything!";

pub const TRACKING_NOT_ASSIGNED: &str =
    "📦 A tracking number has not been assigned yet — I will let you know as soon as it appears";

pub const SERVICE_UNAVAILABLE: &str =
    "Something went wrong on our side. Please try again in a minute 🙏";

const TRACKING_URL: &str = "https://www.cdek.ru/ru/tracking?order_id=";

fn order_number(order: &Order) -> &str {
    order.number.as_deref().unwrap_or("—")
}

fn order_status(order: &Order) -> &str {
    order.display_status().unwrap_or("Status not specified")
}

pub fn status(order: &Order) -> String {
    format!("📦 Order #{}\nStatus: {}", order_number(order), order_status(order))
}

pub fn tracking(order: &Order, tracking_number: &str) -> String {
    format!(
        "🎯 Order #{}\nYour tracking number: {tracking_number}\nFollow it: {TRACKING_URL}{tracking_number}",
        order_number(order)
    )
}

/// One page of the order listing. `page` is zero-based.
pub fn orders_page(orders: &[Order], page: usize, total_pages: usize) -> String {
    let mut lines = if total_pages > 1 {
        vec![format!("📋 Your orders (page {} of {total_pages}):", page + 1)]
    } else {
        vec!["📋 Your orders:".to_string()]
    };
    for order in orders {
        lines.push(format!("— #{} ({})", order_number(order), order_status(order)));
    }
    lines.join("\n")
}
