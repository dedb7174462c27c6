//! Read-only access to a Uniswap-V2-style pair contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::Address;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

abigen!(
    UniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
    ]"#
);

/// Token ordering and reserves read from a pair in one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSnapshot {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: u128,
    pub reserve1: u128,
}

impl PairSnapshot {
    /// `(base reserve, quote reserve)` for the given base token.
    pub fn oriented(&self, base_token: Address) -> ExchangeResult<(u128, u128)> {
        if self.token0 == base_token {
            Ok((self.reserve0, self.reserve1))
        } else if self.token1 == base_token {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(ExchangeError::InvalidResponse(format!(
                "base token {:?} is neither token0 {:?} nor token1 {:?}",
                base_token, self.token0, self.token1
            )))
        }
    }
}

/// One endpoint able to read a pair.
#[async_trait]
pub trait PairReader: Send + Sync {
    /// Label used in logs and errors (usually the RPC URL)
    fn endpoint(&self) -> &str;

    async fn read_pair(&self) -> ExchangeResult<PairSnapshot>;
}

/// [`PairReader`] over an HTTP JSON-RPC endpoint.
pub struct RpcPairReader {
    url: String,
    contract: UniswapV2Pair<Provider<Http>>,
    timeout: Duration,
}

impl RpcPairReader {
    pub fn new(url: &str, pair: Address, timeout: Duration) -> ExchangeResult<Self> {
        let provider = Provider::<Http>::try_from(url).map_err(|e| {
            ExchangeError::ConnectionFailed(format!("invalid RPC url '{}': {}", url, e))
        })?;
        Ok(Self {
            url: url.to_string(),
            contract: UniswapV2Pair::new(pair, Arc::new(provider)),
            timeout,
        })
    }

    async fn bounded<T, F>(&self, call: &str, fut: F) -> ExchangeResult<T>
    where
        F: std::future::Future<Output = Result<T, ethers::contract::ContractError<Provider<Http>>>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ExchangeError::ContractCall {
                endpoint: self.url.clone(),
                reason: format!("{}: {}", call, e),
            }),
            Err(_) => Err(ExchangeError::NetworkTimeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl PairReader for RpcPairReader {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn read_pair(&self) -> ExchangeResult<PairSnapshot> {
        let token0 = self.bounded("token0", self.contract.token_0().call()).await?;
        let token1 = self.bounded("token1", self.contract.token_1().call()).await?;
        let (reserve0, reserve1, _ts) =
            self.bounded("getReserves", self.contract.get_reserves().call()).await?;

        Ok(PairSnapshot {
            token0,
            token1,
            reserve0,
            reserve1,
        })
    }
}
