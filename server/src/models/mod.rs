pub mod notification;
pub mod transaction;
pub mod trip;
pub mod user;

pub use notification::GatewayNotification;
pub use transaction::{
    CreateTransactionRequest, Transaction, TransactionDetails, TransactionDraft,
    TransactionResponse, TransactionStatus,
};
pub use trip::Trip;
pub use user::User;
