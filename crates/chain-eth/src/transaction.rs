//! JSON-RPC transaction payloads.
//!
//! Signing happens inside the wallet; these types only describe what is sent
//! to `eth_sendTransaction` / `eth_call` and what comes back from
//! `eth_getTransactionReceipt`.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::address::parse_address;
use crate::error::EthError;
use crate::units::to_quantity;

/// A transaction handed to the wallet for signing and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender address (0x-prefixed).
    pub from: String,
    /// Recipient or contract address (0x-prefixed).
    pub to: String,
    /// Value in wei as a hex quantity.
    pub value: String,
    /// Calldata as 0x-prefixed hex; absent for plain transfers.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<String>,
}

impl TransactionRequest {
    /// A plain native-currency transfer of `value_wei`.
    pub fn native(from: &str, to: &str, value_wei: U256) -> Result<Self, EthError> {
        parse_address(from)?;
        parse_address(to)?;

        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            value: to_quantity(value_wei),
            data: None,
        })
    }

    /// A zero-value call into `contract` carrying `calldata`.
    pub fn contract_call(from: &str, contract: &str, calldata: &[u8]) -> Result<Self, EthError> {
        parse_address(from)?;
        parse_address(contract)?;

        Ok(Self {
            from: from.to_string(),
            to: contract.to_string(),
            value: to_quantity(U256::ZERO),
            data: Some(format!("0x{}", hex::encode(calldata))),
        })
    }
}

/// A read-only `eth_call` against a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    pub to: String,
    pub data: String,
}

impl CallRequest {
    pub fn new(contract: &str, calldata: &[u8]) -> Self {
        Self {
            to: contract.to_string(),
            data: format!("0x{}", hex::encode(calldata)),
        }
    }
}

/// Receipt of a mined transaction as returned by `eth_getTransactionReceipt`.
///
/// Only the presence of a receipt is needed to consider a transaction mined;
/// the remaining fields are kept for display and logging. Providers differ on
/// which optional fields they include, so most are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub cumulative_gas_used: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub effective_gas_price: Option<String>,
    #[serde(default)]
    pub blob_gas_used: Option<String>,
    #[serde(default)]
    pub blob_gas_price: Option<String>,
    #[serde(default)]
    pub logs: Vec<serde_json::Value>,
    #[serde(default)]
    pub logs_bloom: Option<String>,
    /// `"0x1"` on success, `"0x0"` on revert (post-Byzantium).
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// `false` only when the receipt explicitly reports a revert.
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FROM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const TO: &str = "0x000000000000000000000000000000000000dEaD";

    #[test]
    fn native_request_serializes_without_data() {
        let tx = TransactionRequest::native(FROM, TO, U256::from(10u64)).unwrap();
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value, json!({ "from": FROM, "to": TO, "value": "0xa" }));
    }

    #[test]
    fn native_request_rejects_bad_recipient() {
        assert!(TransactionRequest::native(FROM, "0x1234", U256::from(1u64)).is_err());
    }

    #[test]
    fn contract_call_carries_hex_calldata() {
        let tx = TransactionRequest::contract_call(FROM, TO, &[0xa9, 0x05, 0x9c, 0xbb]).unwrap();
        assert_eq!(tx.value, "0x0");
        assert_eq!(tx.data.as_deref(), Some("0xa9059cbb"));
    }

    #[test]
    fn call_request_shape() {
        let call = CallRequest::new(TO, &[0x31, 0x3c, 0xe5, 0x67]);
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value, json!({ "to": TO, "data": "0x313ce567" }));
    }

    #[test]
    fn receipt_deserializes_provider_payload() {
        let payload = json!({
            "blockHash": "0x01",
            "blockNumber": "0x10",
            "contractAddress": null,
            "cumulativeGasUsed": "0x5208",
            "from": FROM,
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "logs": [{ "address": TO }],
            "logsBloom": "0x00",
            "status": "0x1",
            "to": TO,
            "transactionHash": "0xabc",
            "transactionIndex": "0x0"
        });
        let receipt: TransactionReceipt = serde_json::from_value(payload).unwrap();
        assert_eq!(receipt.transaction_hash, "0xabc");
        assert_eq!(receipt.logs.len(), 1);
        assert!(receipt.contract_address.is_none());
        assert!(receipt.succeeded());
    }

    #[test]
    fn receipt_reports_revert() {
        let receipt: TransactionReceipt =
            serde_json::from_value(json!({ "transactionHash": "0xabc", "status": "0x0" })).unwrap();
        assert!(!receipt.succeeded());
    }

    #[test]
    fn receipt_without_status_counts_as_success() {
        let receipt: TransactionReceipt =
            serde_json::from_value(json!({ "transactionHash": "0xabc" })).unwrap();
        assert!(receipt.succeeded());
    }
}
