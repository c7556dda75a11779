//! Account records and the two interchangeable stores behind them.

pub mod durable;
pub mod model;
pub mod selector;
pub mod store;
pub mod volatile;

pub use durable::DurableStore;
pub use model::{Account, AccountDraft, AccountId, AccountPatch, AccountView, Preferences, Role};
pub use selector::{ResolvedStore, StoreSelector};
pub use store::{Backend, StoreError, UserStore};
pub use volatile::VolatileStore;
