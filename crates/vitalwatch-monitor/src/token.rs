//! Token handles: ERC-20, reserve-backed growth tokens, and lending tokens.
//!
//! Each handle reads its static metadata once on `connect` and exposes the
//! live figures as [`Amount`]s in the right token's decimals. Handles own
//! their sub-token handles.

use std::sync::Arc;

use alloy_primitives::Address;
use vitalwatch_core::Amount;
use vitalwatch_evm::DynSolValue;
use vitalwatch_rpc::RpcTransport;

use crate::contract::ContractCaller;
use crate::error::MonitorError;

/// A plain ERC-20.
#[derive(Clone)]
pub struct Erc20Token {
    caller: ContractCaller,
    name: String,
    symbol: String,
    decimals: u32,
}

impl Erc20Token {
    /// Read `name()`, `symbol()` and `decimals()` concurrently.
    pub async fn connect(
        transport: Arc<dyn RpcTransport>,
        address: Address,
    ) -> Result<Self, MonitorError> {
        let caller = ContractCaller::new(transport, address);
        let (name, symbol, decimals) = tokio::try_join!(
            caller.call_string("name()"),
            caller.call_string("symbol()"),
            caller.call_uint("decimals()", &[]),
        )?;
        let decimals = decimals
            .parse::<u8>()
            .map(u32::from)
            .map_err(|_| MonitorError::output("decimals()", format!("{decimals} is not a uint8")))?;

        tracing::debug!(%address, %symbol, decimals, "token connected");
        Ok(Self {
            caller,
            name,
            symbol,
            decimals,
        })
    }

    pub fn address(&self) -> Address {
        self.caller.address()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub async fn total_supply(&self) -> Result<Amount, MonitorError> {
        let units = self.caller.call_uint("totalSupply()", &[]).await?;
        Ok(Amount::from_units(&units, self.decimals)?)
    }

    pub async fn balance_of(&self, owner: Address) -> Result<Amount, MonitorError> {
        let units = self
            .caller
            .call_uint("balanceOf(address)", &[DynSolValue::Address(owner)])
            .await?;
        Ok(Amount::from_units(&units, self.decimals)?)
    }

    /// A handle for the token at an address this token's contract returns.
    async fn linked(&self, signature: &str) -> Result<Erc20Token, MonitorError> {
        let address = self.caller.call_address(signature).await?;
        Erc20Token::connect(self.caller.transport().clone(), address).await
    }
}

impl std::fmt::Debug for Erc20Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Erc20Token")
            .field("address", &self.address())
            .field("symbol", &self.symbol)
            .field("decimals", &self.decimals)
            .finish()
    }
}

/// A growth token: an ERC-20 minted against a reserve, with a stakes token.
#[derive(Debug, Clone)]
pub struct ReserveToken {
    token: Erc20Token,
    stakes_token: Erc20Token,
    reserve_token: Erc20Token,
}

impl ReserveToken {
    pub async fn connect(
        transport: Arc<dyn RpcTransport>,
        address: Address,
    ) -> Result<Self, MonitorError> {
        let token = Erc20Token::connect(transport, address).await?;
        let stakes_token = token.linked("stakesToken()").await?;
        let reserve_token = token.linked("reserveToken()").await?;
        Ok(Self {
            token,
            stakes_token,
            reserve_token,
        })
    }

    /// The token itself.
    pub fn token(&self) -> &Erc20Token {
        &self.token
    }

    pub fn stakes_token(&self) -> &Erc20Token {
        &self.stakes_token
    }

    pub fn reserve_token(&self) -> &Erc20Token {
        &self.reserve_token
    }

    /// In reserve-token decimals.
    pub async fn total_reserve(&self) -> Result<Amount, MonitorError> {
        let units = self.token.caller.call_uint("totalReserve()", &[]).await?;
        Ok(Amount::from_units(&units, self.reserve_token.decimals)?)
    }
}

/// A growth token whose reserve is lent out and borrowed against an
/// underlying asset.
#[derive(Debug, Clone)]
pub struct LendingToken {
    reserve: ReserveToken,
    underlying_token: Erc20Token,
}

impl LendingToken {
    pub async fn connect(
        transport: Arc<dyn RpcTransport>,
        address: Address,
    ) -> Result<Self, MonitorError> {
        let reserve = ReserveToken::connect(transport, address).await?;
        let underlying_token = reserve.token.linked("underlyingToken()").await?;
        Ok(Self {
            reserve,
            underlying_token,
        })
    }

    pub fn reserve(&self) -> &ReserveToken {
        &self.reserve
    }

    pub fn token(&self) -> &Erc20Token {
        &self.reserve.token
    }

    pub fn symbol(&self) -> &str {
        self.reserve.token.symbol()
    }

    pub fn underlying_token(&self) -> &Erc20Token {
        &self.underlying_token
    }

    /// In underlying-token decimals.
    pub async fn lending_reserve_underlying(&self) -> Result<Amount, MonitorError> {
        self.underlying_amount("lendingReserveUnderlying()").await
    }

    /// In underlying-token decimals.
    pub async fn borrowing_reserve_underlying(&self) -> Result<Amount, MonitorError> {
        self.underlying_amount("borrowingReserveUnderlying()").await
    }

    async fn underlying_amount(&self, signature: &str) -> Result<Amount, MonitorError> {
        let units = self.reserve.token.caller.call_uint(signature, &[]).await?;
        Ok(Amount::from_units(&units, self.underlying_token.decimals)?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::contract::testing::FakeChain;

    pub const GCDAI: Address = Address::repeat_byte(0xc0);
    pub const GDAI_STAKES: Address = Address::repeat_byte(0xc1);
    pub const CDAI: Address = Address::repeat_byte(0xc2);
    pub const DAI: Address = Address::repeat_byte(0xc3);

    /// A gcDAI-shaped deployment: 8-decimal cToken reserve, 18-decimal DAI.
    pub fn gcdai(chain: &FakeChain) {
        chain.erc20(GCDAI, "growth cDAI", "gcDAI", 8);
        chain.erc20(GDAI_STAKES, "Growth stakes", "stkGRO/gcDAI", 18);
        chain.erc20(CDAI, "Compound Dai", "cDAI", 8);
        chain.erc20(DAI, "Dai Stablecoin", "DAI", 18);
        chain.answer(GCDAI, "stakesToken()", DynSolValue::Address(GDAI_STAKES));
        chain.answer(GCDAI, "reserveToken()", DynSolValue::Address(CDAI));
        chain.answer(GCDAI, "underlyingToken()", DynSolValue::Address(DAI));
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::contract::testing::FakeChain;

    #[tokio::test]
    async fn erc20_metadata_and_amounts() {
        let chain = FakeChain::shared();
        chain.erc20(DAI, "Dai Stablecoin", "DAI", 18);
        chain.answer_uint(DAI, "totalSupply()", 1_500_000_000_000_000_000);
        chain.answer_uint(DAI, "balanceOf(address)", 250);

        let dai = Erc20Token::connect(chain, DAI).await.unwrap();
        assert_eq!(dai.name(), "Dai Stablecoin");
        assert_eq!(dai.symbol(), "DAI");
        assert_eq!(dai.decimals(), 18);
        assert_eq!(dai.total_supply().await.unwrap().coins(), "1.5");
        assert_eq!(
            dai.balance_of(Address::ZERO).await.unwrap().units(),
            "250"
        );
    }

    #[tokio::test]
    async fn reserve_in_reserve_token_decimals() {
        let chain = FakeChain::shared();
        gcdai(&chain);
        chain.answer_uint(GCDAI, "totalReserve()", 12_345_000_000);

        let gc = ReserveToken::connect(chain, GCDAI).await.unwrap();
        assert_eq!(gc.stakes_token().symbol(), "stkGRO/gcDAI");
        assert_eq!(gc.reserve_token().symbol(), "cDAI");
        assert_eq!(gc.total_reserve().await.unwrap().coins(), "123.45");
    }

    #[tokio::test]
    async fn lending_amounts_in_underlying_decimals() {
        let chain = FakeChain::shared();
        gcdai(&chain);
        chain.answer_uint(GCDAI, "lendingReserveUnderlying()", 2_000_000_000_000_000_000);
        chain.answer_uint(GCDAI, "borrowingReserveUnderlying()", 500_000_000_000_000_000);

        let gc = LendingToken::connect(chain, GCDAI).await.unwrap();
        assert_eq!(gc.symbol(), "gcDAI");
        assert_eq!(gc.underlying_token().symbol(), "DAI");
        assert_eq!(gc.lending_reserve_underlying().await.unwrap().coins(), "2");
        assert_eq!(gc.borrowing_reserve_underlying().await.unwrap().coins(), "0.5");
    }

    #[tokio::test]
    async fn decimals_beyond_uint8_fail_connect() {
        let chain = FakeChain::shared();
        chain.erc20(DAI, "Dai Stablecoin", "DAI", 18);
        chain.answer_uint(DAI, "decimals()", 4_000_000_000);

        let err = Erc20Token::connect(chain, DAI).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::UnexpectedOutput { ref method, .. } if method == "decimals()"
        ));
    }

    #[tokio::test]
    async fn missing_link_fails_connect() {
        let chain = FakeChain::shared();
        chain.erc20(GCDAI, "growth cDAI", "gcDAI", 8);
        assert!(LendingToken::connect(chain, GCDAI).await.is_err());
    }
}
