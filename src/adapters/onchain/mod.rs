//! On-chain AMM reserve adapter module
//!
//! Derives prices from Uniswap-V2-style pair reserves through read-only
//! JSON-RPC calls, with endpoint failover and an external API fallback.

pub mod adapter;
pub mod config;
pub mod reader;

pub use adapter::{EndpointRole, OnChainReserveFeed};
pub use config::OnChainFeedConfig;
pub use reader::{PairReader, PairSnapshot, RpcPairReader};
