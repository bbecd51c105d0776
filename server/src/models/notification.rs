use serde::{de, Deserialize, Deserializer};
use sha2::{Digest, Sha512};

/// Status callback delivered by the payment gateway.
///
/// Only the fields the state machine consumes are kept; the rest of the
/// gateway metadata is dropped during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayNotification {
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(deserialize_with = "order_id_from_text_or_number")]
    pub order_id: i64,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default, deserialize_with = "optional_text_or_number")]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub signature_key: Option<String>,
}

impl GatewayNotification {
    /// Checks `signature_key` against
    /// `sha512(order_id + status_code + gross_amount + server_key)`.
    pub fn signature_matches(&self, server_key: &str) -> bool {
        let (Some(signature), Some(status_code), Some(gross_amount)) = (
            self.signature_key.as_deref(),
            self.status_code.as_deref(),
            self.gross_amount.as_deref(),
        ) else {
            return false;
        };

        let expected = signature_for(self.order_id, status_code, gross_amount, server_key);
        constant_time_eq(&expected, &signature.to_ascii_lowercase())
    }
}

pub fn signature_for(order_id: i64, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.to_string().as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Number(serde_json::Number),
    Text(String),
}

fn order_id_from_text_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("order_id {} is not an integer", n))),
        TextOrNumber::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("order_id '{}' is not an integer", s))),
    }
}

fn optional_text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(|value| match value {
        TextOrNumber::Number(n) => n.to_string(),
        TextOrNumber::Text(s) => s,
    }))
}
