pub mod balance;
pub mod event;
pub mod step;
pub mod token;
pub mod transaction;

pub use balance::{AggregateBalance, Divergence};
pub use event::{derive_subject, subject_key, StakeEvent, NO_APY, PLACEHOLDER_SYMBOL};
pub use step::{OrchestrationStep, StepKey, StepStatus};
pub use token::TokenInfo;
pub use transaction::{TransactionRequest, TxReceipt};
