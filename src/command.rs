use async_trait::async_trait;

use crate::{Aggregate, Result};

/// The `Command` trait defines a request to change the state of an aggregate.
///
/// A command inspects the current state of its aggregate and returns the event payloads that
/// describe the change. It does not touch storage: [`crate::Cqrs::execute`] assigns versions,
/// appends the events and applies them. A command that must refuse should return
/// [`crate::StoreError::CommandRejected`].
///
/// ## Example
///
/// ```rust,ignore
/// use mini_es_store::{Command, Result, StoreError};
///
/// struct Withdraw(u64);
///
/// #[async_trait]
/// impl Command for Withdraw {
///     type Aggregate = Account;
///
///     async fn handle(&self, account: &Account) -> Result<Vec<AccountEvent>> {
///         if account.balance < self.0 {
///             return Err(StoreError::rejected(account.id, "insufficient funds"));
///         }
///         Ok(vec![AccountEvent::Withdrawn { id: account.id, amount: self.0 }])
///     }
/// }
/// ```
#[async_trait]
pub trait Command: Send + Sync {
    /// The type of aggregate that this command handles.
    type Aggregate: Aggregate;

    /// Handles the command and returns the payloads of the events it produces.
    async fn handle(
        &self,
        aggregate: &Self::Aggregate,
    ) -> Result<Vec<<Self::Aggregate as Aggregate>::Event>>;
}
