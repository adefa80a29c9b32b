use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Structured content of a payment barcode (`K:PR|…`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentQrPayload {
    pub version: Option<String>,
    pub charset: Option<String>,
    pub recipient_account: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_address: Option<String>,
    pub amount: Option<Money>,
    /// ISO code as printed in the payload, e.g. `RSD`.
    pub currency: Option<String>,
    pub payer_name: Option<String>,
    pub purpose_code: Option<String>,
    pub purpose_description: Option<String>,
    pub reference: Option<String>,
}
