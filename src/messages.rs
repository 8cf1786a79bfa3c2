//! Outbound message payloads.
//!
//! Notification texts are templated per [`Notification`] variant; the wording
//! matches what account owners already receive from the operations team. Only
//! the template selection and the `days_left` figure are contractual.

use serde::{Deserialize, Serialize};

use crate::policy::Notification;

/// A plain text chat message, in the push API's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: String,
}

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            message_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Build the notification message for a due account.
pub fn notification_message(notification: &Notification, license: &str) -> TextMessage {
    let text = match notification {
        Notification::Expired => format!(
            "แจ้งเตือน: License ของคุณ ({license}) หมดอายุแล้ว กรุณาติดต่อเจ้าหน้าที่เพื่อขยายเวลาใช้งาน"
        ),
        Notification::Suspended => format!(
            "แจ้งเตือน: License ของคุณ ({license}) ถูกระงับการใช้งานชั่วคราว กรุณาติดต่อเจ้าหน้าที่"
        ),
        Notification::NearlyExpired { days_left } => format!(
            "แจ้งเตือน: License ของคุณ ({license}) จะหมดอายุในอีก {days_left} วัน กรุณาติดต่อเจ้าหน้าที่เพื่อต่ออายุก่อนหมดเวลาใช้งาน"
        ),
    };
    TextMessage::new(text)
}

/// Confirmation reply sent after an account is linked to a chat identity.
pub fn link_confirmation(account_number: &str) -> TextMessage {
    TextMessage::new(format!(
        "ผูกบัญชี {account_number} กับ LINE ของคุณเรียบร้อยแล้ว ✅ ระบบจะแจ้งเตือนเมื่อ License ใกล้หมดอายุครับ"
    ))
}
