//! JSON-RPC client for the signing bridge.
//!
//! Every request is a JSON object carrying an `action`, the configured
//! contract address, and action-specific parameters. Responses carry either
//! a `result` or an `error` (string or `{ "message": ... }`).
//!
//! Read calls use the `call` / `call_batch` actions with ABI function names.
//! Writes use `send_transaction`; confirmations are polled through
//! `transaction_receipt`, which yields `null` until the transaction is mined.
//! uint256 identifiers are returned as JSON numbers, amounts as decimal
//! strings.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use market_types::{
    Address, Feedback, FeedbackFlags, FeedbackId, Product, ProductId, RewardPoolStatus, TxHash,
    Wei,
};

use crate::call::{ContractCall, Receipt};
use crate::contract::ContractGateway;
use crate::error::GatewayError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// HTTP client for a signing bridge fronting the marketplace contract.
#[derive(Clone)]
pub struct JsonRpcGateway {
    http: reqwest::Client,
    endpoint: String,
    contract: Address,
    poll_interval: Duration,
}

impl JsonRpcGateway {
    /// Create a client targeting `endpoint` (e.g. `http://127.0.0.1:8545/bridge`).
    pub fn new(endpoint: impl Into<String>, contract: Address) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            contract,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// How often to poll for a receipt while waiting for confirmation.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Send a request and return the `result` field.
    async fn rpc_call(&self, action: &str, params: Value) -> Result<Value, GatewayError> {
        let mut body = params;
        let obj = body
            .as_object_mut()
            .ok_or_else(|| GatewayError::Rpc("params must be a JSON object".into()))?;
        obj.insert("action".to_string(), json!(action));
        obj.insert("contract".to_string(), json!(self.contract.to_string()));

        tracing::trace!(action, endpoint = %self.endpoint, "gateway request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Rpc(format!(
                "bridge returned HTTP {}",
                response.status()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("invalid JSON response: {e}")))?;

        if let Some(message) = error_message(&json) {
            return Err(GatewayError::from_rpc_message(&message));
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn call_view<T: DeserializeOwned>(
        &self,
        function: &str,
        args: Value,
    ) -> Result<T, GatewayError> {
        let result = self
            .rpc_call("call", json!({ "function": function, "args": args }))
            .await?;
        decode(function, result)
    }

    async fn call_batch(&self, calls: Vec<(&str, Value)>) -> Result<Vec<Value>, GatewayError> {
        let expected = calls.len();
        let calls: Vec<Value> = calls
            .into_iter()
            .map(|(function, args)| json!({ "function": function, "args": args }))
            .collect();
        let result = self.rpc_call("call_batch", json!({ "calls": calls })).await?;
        let values: Vec<Value> = decode("call_batch", result)?;
        if values.len() != expected {
            return Err(GatewayError::Decode(format!(
                "call_batch returned {} results for {expected} calls",
                values.len()
            )));
        }
        Ok(values)
    }
}

#[async_trait]
impl ContractGateway for JsonRpcGateway {
    async fn all_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.call_view("getAllProducts", json!([])).await
    }

    async fn products_paginated(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, GatewayError> {
        self.call_view(
            "getProductsPaginated",
            json!([offset.to_string(), limit.to_string()]),
        )
        .await
    }

    async fn product(&self, id: ProductId) -> Result<Product, GatewayError> {
        self.call_view("getProduct", json!([id.0.to_string()])).await
    }

    async fn user_products(&self, owner: &Address) -> Result<Vec<Product>, GatewayError> {
        self.call_view("getUserProducts", json!([owner.to_string()]))
            .await
    }

    async fn product_feedbacks(&self, id: ProductId) -> Result<Vec<Feedback>, GatewayError> {
        self.call_view("getProductFeedbacks", json!([id.0.to_string()]))
            .await
    }

    async fn pending_feedbacks(&self, owner: &Address) -> Result<Vec<Feedback>, GatewayError> {
        self.call_view("getPendingFeedbacks", json!([owner.to_string()]))
            .await
    }

    async fn pending_rewards(&self, account: &Address) -> Result<Wei, GatewayError> {
        self.call_view("getPendingRewards", json!([account.to_string()]))
            .await
    }

    async fn has_reviewed(
        &self,
        account: &Address,
        product: ProductId,
    ) -> Result<bool, GatewayError> {
        self.call_view(
            "hasReviewed",
            json!([account.to_string(), product.0.to_string()]),
        )
        .await
    }

    async fn feedback_flags(&self, id: FeedbackId) -> Result<FeedbackFlags, GatewayError> {
        let mut flags = self.feedback_flags_batch(&[id]).await?;
        flags
            .pop()
            .ok_or_else(|| GatewayError::Decode("empty feedback flag batch".into()))
    }

    async fn feedback_flags_batch(
        &self,
        ids: &[FeedbackId],
    ) -> Result<Vec<FeedbackFlags>, GatewayError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let calls = ids
            .iter()
            .flat_map(|id| {
                let arg = json!([id.0.to_string()]);
                [
                    ("feedbackApproved", arg.clone()),
                    ("feedbackRejected", arg.clone()),
                    ("feedbackRewarded", arg),
                ]
            })
            .collect();
        let values = self.call_batch(calls).await?;
        flags_from_batch(&values)
    }

    async fn product_creation_fee(&self) -> Result<Wei, GatewayError> {
        self.call_view("productCreationFee", json!([])).await
    }

    async fn reward_pool_status(&self) -> Result<RewardPoolStatus, GatewayError> {
        self.call_view("getRewardPoolStatus", json!([])).await
    }

    async fn submit(&self, from: &Address, call: &ContractCall) -> Result<TxHash, GatewayError> {
        let result = self
            .rpc_call(
                "send_transaction",
                json!({
                    "from": from.to_string(),
                    "function": call.function_name(),
                    "args": call.args(),
                    "value": call.value().raw().to_string(),
                }),
            )
            .await?;
        let hash = tx_hash_from_result(&result)?;
        tracing::debug!(function = call.function_name(), %hash, "transaction submitted");
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<Receipt, GatewayError> {
        loop {
            let result = self
                .rpc_call("transaction_receipt", json!({ "hash": tx.to_string() }))
                .await?;
            if let Some(receipt) = receipt_from_result(tx, result)? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value)
        .map_err(|e| GatewayError::Decode(format!("invalid {what} response: {e}")))
}

/// Extract the bridge's error message, if the response carries one.
fn error_message(response: &Value) -> Option<String> {
    let err = response.get("error")?;
    match err {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

/// `send_transaction` answers with either a bare hash or `{ "hash": ... }`.
fn tx_hash_from_result(result: &Value) -> Result<TxHash, GatewayError> {
    let raw = result
        .as_str()
        .or_else(|| result.get("hash").and_then(Value::as_str))
        .ok_or_else(|| GatewayError::Decode(format!("missing transaction hash in {result}")))?;
    TxHash::parse(raw).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    block_number: u64,
    status: bool,
}

/// `None` while pending; an error if the transaction reverted.
fn receipt_from_result(tx: &TxHash, result: Value) -> Result<Option<Receipt>, GatewayError> {
    if result.is_null() {
        return Ok(None);
    }
    let raw: RawReceipt = decode("transaction_receipt", result)?;
    if !raw.status {
        return Err(GatewayError::Reverted(format!(
            "transaction {tx} reverted in block {}",
            raw.block_number
        )));
    }
    Ok(Some(Receipt {
        tx_hash: *tx,
        block_number: raw.block_number,
    }))
}

/// Regroup a flat `[approved, rejected, rewarded, ...]` batch result.
fn flags_from_batch(values: &[Value]) -> Result<Vec<FeedbackFlags>, GatewayError> {
    if values.len() % 3 != 0 {
        return Err(GatewayError::Decode(format!(
            "expected predicate triples, got {} values",
            values.len()
        )));
    }
    let as_bool = |v: &Value| {
        v.as_bool()
            .ok_or_else(|| GatewayError::Decode(format!("expected boolean, got {v}")))
    };
    values
        .chunks(3)
        .map(|triple| {
            Ok(FeedbackFlags {
                approved: as_bool(&triple[0])?,
                rejected: as_bool(&triple[1])?,
                rewarded: as_bool(&triple[2])?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_shapes() {
        assert_eq!(error_message(&json!({ "error": "boom" })), Some("boom".into()));
        assert_eq!(
            error_message(&json!({ "error": { "code": 4001, "message": "User rejected" } })),
            Some("User rejected".into())
        );
        assert_eq!(error_message(&json!({ "error": null, "result": 1 })), None);
        assert_eq!(error_message(&json!({ "result": 1 })), None);
    }

    #[test]
    fn tx_hash_accepts_both_shapes() {
        let hash = TxHash::new([7; 32]);
        let bare = json!(hash.to_string());
        let wrapped = json!({ "hash": hash.to_string() });
        assert_eq!(tx_hash_from_result(&bare).unwrap(), hash);
        assert_eq!(tx_hash_from_result(&wrapped).unwrap(), hash);
        assert!(tx_hash_from_result(&json!({})).is_err());
    }

    #[test]
    fn receipt_pending_confirmed_reverted() {
        let tx = TxHash::new([1; 32]);
        assert_eq!(receipt_from_result(&tx, Value::Null).unwrap(), None);
        let ok = receipt_from_result(&tx, json!({ "blockNumber": 42, "status": true }))
            .unwrap()
            .unwrap();
        assert_eq!(ok.block_number, 42);
        assert!(matches!(
            receipt_from_result(&tx, json!({ "blockNumber": 43, "status": false })),
            Err(GatewayError::Reverted(_))
        ));
    }

    #[test]
    fn regroups_predicate_triples() {
        let values = vec![
            json!(true),
            json!(false),
            json!(true),
            json!(false),
            json!(true),
            json!(false),
        ];
        let flags = flags_from_batch(&values).unwrap();
        assert_eq!(flags.len(), 2);
        assert!(flags[0].approved && flags[0].rewarded && !flags[0].rejected);
        assert!(flags[1].rejected && !flags[1].approved);
        assert!(flags_from_batch(&values[..2]).is_err());
        assert!(flags_from_batch(&[json!(1), json!(true), json!(false)]).is_err());
    }
}
