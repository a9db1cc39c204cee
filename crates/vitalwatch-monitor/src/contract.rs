//! Read-only contract calls over any [`RpcTransport`].

use std::sync::Arc;

use alloy_primitives::Address;
use serde_json::{json, Value};
use vitalwatch_core::types::DecodedValue;
use vitalwatch_evm::{
    call::{decode_output, encode_call},
    DynSolType, DynSolValue,
};
use vitalwatch_rpc::RpcTransport;

use crate::error::MonitorError;

/// `eth_call` against one contract at the latest block.
#[derive(Clone)]
pub struct ContractCaller {
    transport: Arc<dyn RpcTransport>,
    address: Address,
}

impl ContractCaller {
    pub fn new(transport: Arc<dyn RpcTransport>, address: Address) -> Self {
        Self { transport, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    /// Call `signature` with `args` and decode the output as `returns`.
    pub async fn call(
        &self,
        signature: &str,
        args: &[DynSolValue],
        returns: &[DynSolType],
    ) -> Result<Vec<DecodedValue>, MonitorError> {
        let calldata = encode_call(signature, args);
        let params = vec![
            json!({
                "to": self.address.to_string(),
                "data": format!("0x{}", hex::encode(&calldata)),
            }),
            json!("latest"),
        ];

        let result = self.transport.request("eth_call", params).await?;
        let output = match &result {
            Value::String(s) => hex::decode(s.strip_prefix("0x").unwrap_or(s))
                .map_err(|e| MonitorError::output(signature, format!("bad hex: {e}")))?,
            other => return Err(MonitorError::output(signature, format!("not a hex string: {other}"))),
        };

        tracing::trace!(contract = %self.address, method = signature, bytes = output.len(), "eth_call");
        Ok(decode_output(returns, &output)?)
    }

    async fn single(
        &self,
        signature: &str,
        args: &[DynSolValue],
        ty: DynSolType,
    ) -> Result<DecodedValue, MonitorError> {
        self.call(signature, args, &[ty])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MonitorError::output(signature, "no return value"))
    }

    /// A `uint256` result as a decimal digit string.
    pub async fn call_uint(
        &self,
        signature: &str,
        args: &[DynSolValue],
    ) -> Result<String, MonitorError> {
        match self.single(signature, args, DynSolType::Uint(256)).await? {
            DecodedValue::Uint(units) => Ok(units),
            other => Err(MonitorError::output(signature, format!("expected uint, got {other}"))),
        }
    }

    pub async fn call_address(&self, signature: &str) -> Result<Address, MonitorError> {
        let value = self.single(signature, &[], DynSolType::Address).await?;
        value
            .as_address()
            .ok_or_else(|| MonitorError::output(signature, format!("expected address, got {value}")))
    }

    pub async fn call_string(&self, signature: &str) -> Result<String, MonitorError> {
        match self.single(signature, &[], DynSolType::String).await? {
            DecodedValue::Str(s) => Ok(s),
            other => Err(MonitorError::output(signature, format!("expected string, got {other}"))),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeChain;
    use super::*;
    use vitalwatch_evm::fingerprint::selector;

    #[tokio::test]
    async fn call_string_and_uint() {
        let token = Address::repeat_byte(0x01);
        let chain = FakeChain::shared();
        chain.erc20(token, "Growth cDAI", "gcDAI", 8);

        let caller = ContractCaller::new(chain.clone(), token);
        assert_eq!(caller.call_string("symbol()").await.unwrap(), "gcDAI");
        assert_eq!(caller.call_uint("decimals()", &[]).await.unwrap(), "8");
        assert_eq!(
            chain.calls.lock().unwrap().as_slice(),
            &[(token, selector("symbol()")), (token, selector("decimals()"))]
        );
    }

    #[tokio::test]
    async fn call_address() {
        let token = Address::repeat_byte(0x01);
        let reserve = Address::repeat_byte(0x02);
        let chain = FakeChain::shared();
        chain.answer(token, "reserveToken()", DynSolValue::Address(reserve));

        let caller = ContractCaller::new(chain, token);
        assert_eq!(caller.call_address("reserveToken()").await.unwrap(), reserve);
    }

    #[tokio::test]
    async fn revert_is_a_transport_error() {
        let caller = ContractCaller::new(FakeChain::shared(), Address::ZERO);
        assert!(matches!(
            caller.call_string("name()").await,
            Err(MonitorError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn wrong_type_fails_to_decode() {
        let token = Address::repeat_byte(0x01);
        let chain = FakeChain::shared();
        chain.answer_uint(token, "name()", 7);

        let caller = ContractCaller::new(chain, token);
        // A single word cannot be a string's offset+length pair.
        assert!(caller.call_string("name()").await.is_err());
    }
}
