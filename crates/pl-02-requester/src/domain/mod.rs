//! Domain layer for the correlated requester.

pub mod kinds;
pub mod routing;
pub mod slot;
pub mod transform;

pub use kinds::{
    CountReactions, FetchHistory, HistoryPage, HistoryQuery, PinMessage, PinTarget, ReactionQuery,
    RequestKind, UnpinMessage,
};
pub use routing::{Delivery, RouteTable};
pub use slot::{Exchange, SlotState};
pub use transform::{order_history, reaction_rows};
