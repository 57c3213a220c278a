//! Low-inventory email rendering.

use shopkeep_common::types::PendingNotification;

use crate::email::EmailMessage;

/// Who notification emails are sent from.
#[derive(Debug, Clone)]
pub struct Sender {
    pub name: String,
    pub address: String,
}

/// Subject line for a low-inventory alert on `item_name`.
pub fn subject_for(item_name: &str) -> String {
    format!("Low Inventory Alert - {}", item_name)
}

/// Render the notification email for one pending queue entry.
pub fn render_low_inventory(pending: &PendingNotification, sender: &Sender) -> EmailMessage {
    let supplier = escape_html(&pending.supplier_name);
    let item = escape_html(&pending.item_name);

    let html_body = format!(
        concat!(
            "<html><body>",
            "<p>Hello {supplier},</p>",
            "<p>Our stock of <strong>{item}</strong> is running low. ",
            "Current quantity: <strong>{quantity}</strong>.</p>",
            "<p>Please arrange a restock at your earliest convenience.</p>",
            "<p>Thank you,<br>{sender}</p>",
            "</body></html>"
        ),
        supplier = supplier,
        item = item,
        quantity = pending.quantity,
        sender = escape_html(&sender.name),
    );

    EmailMessage {
        from_name: sender.name.clone(),
        from_address: sender.address.clone(),
        to: pending.supplier_email.clone(),
        subject: subject_for(&pending.item_name),
        html_body,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
