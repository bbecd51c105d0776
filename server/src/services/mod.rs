pub mod allocator;
pub mod notifications;
pub mod transactions;

pub use allocator::OrderIdAllocator;
pub use notifications::{NotificationOutcome, NotificationProcessor, Transition};
pub use transactions::TransactionService;
