//! Shared types, error model, event model, collaborator traits and the
//! category-lock dispatch primitive used by every crate in the workspace.

pub mod error;
pub mod events;
pub mod locks;
pub mod models;
pub mod traits;

pub use error::{NurseryError, NurseryResult};
pub use events::{OutboundEvent, WatcherEvent};
pub use models::{
    new_swap_id, preimage_matches_hash, ChainStatus, ChainSwap, ChainSwapData, Currency,
    CurrencyType, FilterRegistry, OrderSide, ReverseStatus, ReverseSwap, Swap, SubmarineStatus,
    SwapId, SwapKind, SwapVersion,
};
