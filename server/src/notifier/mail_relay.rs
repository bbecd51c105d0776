use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::NotifierConfig;
use crate::notifier::{CustomerNotifier, NotifyError, StatusNotice};

const SUBJECT: &str = "Status Transaction";

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

/// Hands customer e-mails to an HTTP mail relay.
pub struct MailRelayNotifier {
    client: Client,
    url: String,
    token: Option<String>,
    sender: String,
}

impl MailRelayNotifier {
    pub fn new(url: impl Into<String>, config: &NotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            token: config.relay_token.clone(),
            sender: config.sender.clone(),
        })
    }
}

fn render(notice: &StatusNotice, customer_name: &str) -> String {
    let trip = notice.trip_title.as_deref().unwrap_or("-");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head><meta charset="UTF-8" /><title>Status Transaction</title></head>
  <body>
    <h2>Product payment :</h2>
    <ul style="list-style-type:none;">
      <li>Name : {customer_name}</li>
      <li>Trip : {trip}</li>
      <li>Order : {order_id}</li>
      <li>Total payment: Rp.{total}</li>
      <li>Status : {label}</li>
    </ul>
    <p>Terima kasih</p>
  </body>
</html>"#,
        order_id = notice.transaction.id,
        total = notice.transaction.total,
        label = notice.label,
    )
}

#[async_trait]
impl CustomerNotifier for MailRelayNotifier {
    #[instrument(skip(self, notice), fields(order_id = notice.transaction.id))]
    async fn notify(&self, notice: &StatusNotice) -> Result<(), NotifyError> {
        let customer = notice
            .customer
            .as_ref()
            .ok_or(NotifyError::MissingRecipient(notice.transaction.id))?;

        let message = RelayMessage {
            from: &self.sender,
            to: &customer.email,
            subject: SUBJECT,
            html: render(notice, &customer.name),
        };

        let mut request = self.client.post(&self.url).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Transport(format!(
                "mail relay answered HTTP {}",
                response.status()
            )));
        }

        debug!("Customer notice handed to mail relay");
        Ok(())
    }
}
