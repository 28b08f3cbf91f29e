//! Solana JSON-RPC 2.0 codec and a `LedgerRpc` built on it.
//!
//! The HTTP client itself is injected through [`HttpTransport`], so this
//! module only deals with request and response bodies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use spl_wire::{address_to_bytes, Address, Signature};

use crate::cluster::ClientConfig;
use crate::ledger::{Commitment, LedgerAccount, LedgerError, LedgerRpc, RecentBlockhash};

/// POSTs a JSON body and returns the response body.
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    async fn post(&self, url: &str, body: &str) -> Result<String, String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiAccount {
    lamports: u64,
    owner: Address,
    /// `[payload, encoding]`
    data: (String, String),
    executable: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

/// Status of one signature from `getSignatureStatuses`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` once the block is rooted.
    pub confirmations: Option<u64>,
    pub err: Option<Value>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    pub fn commitment(&self) -> Commitment {
        match (self.confirmation_status, self.confirmations) {
            (Some(status), _) => status,
            (None, None) => Commitment::Finalized,
            (None, Some(_)) => Commitment::Processed,
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serialize a JSON-RPC 2.0 request.
pub fn request_body(id: u64, method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

/// Parse a JSON-RPC response into its `result`, mapping RPC errors.
///
/// Preflight failures carry the transaction error under `error.data.err`;
/// those become the same `LedgerError` a failed confirmation would.
pub fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, LedgerError> {
    let response: RpcResponse<T> = serde_json::from_str(body)
        .map_err(|e| LedgerError::Transport(format!("malformed RPC response: {e}")))?;

    if let Some(error) = response.error {
        if let Some(err) = error.data.as_ref().and_then(|d| d.get("err")) {
            if !err.is_null() {
                return Err(parse_transaction_error(err));
            }
        }
        return Err(LedgerError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    response
        .result
        .ok_or_else(|| LedgerError::Transport("RPC response has neither result nor error".into()))
}

/// Decode a ledger `TransactionError` value.
///
/// `{"InstructionError":[1,{"Custom":4}]}` is instruction 1 failing with
/// program error 4; plain strings such as `"BlockhashNotFound"` fail the
/// transaction as a whole.
pub fn parse_transaction_error(err: &Value) -> LedgerError {
    let instruction_error = err
        .get("InstructionError")
        .and_then(Value::as_array)
        .map(Vec::as_slice);

    if let Some([index, detail]) = instruction_error {
        if let Some(index) = index.as_u64().and_then(|i| u8::try_from(i).ok()) {
            let custom = detail
                .get("Custom")
                .and_then(Value::as_u64)
                .and_then(|c| u32::try_from(c).ok());
            let message = match (custom, detail.as_str()) {
                (Some(code), _) => format!("custom program error: {code:#x}"),
                (None, Some(name)) => name.to_string(),
                (None, None) => detail.to_string(),
            };
            return LedgerError::InstructionFailed {
                index,
                custom,
                message,
            };
        }
    }

    match err.as_str() {
        Some(name) => LedgerError::TransactionFailed(name.to_string()),
        None => LedgerError::TransactionFailed(err.to_string()),
    }
}

fn decode_account(account: UiAccount) -> Result<LedgerAccount, LedgerError> {
    let (payload, encoding) = account.data;
    if encoding != "base64" {
        return Err(LedgerError::Transport(format!(
            "unexpected account encoding '{encoding}'"
        )));
    }
    let data = STANDARD
        .decode(payload)
        .map_err(|e| LedgerError::Transport(format!("invalid base64 account data: {e}")))?;

    Ok(LedgerAccount {
        lamports: account.lamports,
        owner: account.owner,
        data,
        executable: account.executable,
    })
}

fn parse_signature(s: &str) -> Result<Signature, LedgerError> {
    s.parse()
        .map_err(|e| LedgerError::Transport(format!("invalid signature in response: {e}")))
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// `LedgerRpc` over a JSON-RPC endpoint.
pub struct JsonRpcLedger<T> {
    transport: T,
    url: String,
    poll_interval: Duration,
    // Simulation must see accounts confirmed at the client's level.
    preflight_commitment: Commitment,
    next_id: AtomicU64,
}

impl<T: HttpTransport> JsonRpcLedger<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            url: config.rpc_url().to_string(),
            poll_interval: config.confirm_poll_interval(),
            preflight_commitment: config.commitment,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("rpc {method} (id {id})");

        let body = request_body(id, method, params);
        let response = self
            .transport
            .post(&self.url, &body)
            .await
            .map_err(LedgerError::Transport)?;
        parse_response(&response)
    }

    pub async fn get_block_height(&self, commitment: Commitment) -> Result<u64, LedgerError> {
        self.call("getBlockHeight", json!([{ "commitment": commitment }]))
            .await
    }

    pub async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }
}

impl<T: HttpTransport> LedgerRpc for JsonRpcLedger<T> {
    async fn get_account(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<LedgerAccount>, LedgerError> {
        let response: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64", "commitment": commitment }]),
            )
            .await?;
        response.value.map(decode_account).transpose()
    }

    async fn get_balance(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<u64, LedgerError> {
        let response: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": commitment }]),
            )
            .await?;
        Ok(response.value)
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<RecentBlockhash, LedgerError> {
        let response: WithContext<UiBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment }]))
            .await?;
        let blockhash = address_to_bytes(&response.value.blockhash)
            .map_err(|e| LedgerError::Transport(format!("invalid blockhash: {e}")))?;

        Ok(RecentBlockhash {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError> {
        self.call("getMinimumBalanceForRentExemption", json!([data_len]))
            .await
    }

    async fn send_transaction(&self, wire: &[u8]) -> Result<Signature, LedgerError> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    STANDARD.encode(wire),
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.preflight_commitment,
                    }
                ]),
            )
            .await?;
        parse_signature(&signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &RecentBlockhash,
        commitment: Commitment,
    ) -> Result<(), LedgerError> {
        loop {
            if let Some(status) = self.get_signature_status(signature).await? {
                if let Some(err) = &status.err {
                    return Err(parse_transaction_error(err));
                }
                if status.commitment().satisfies(commitment) {
                    return Ok(());
                }
            }

            let height = self.get_block_height(commitment).await?;
            if height > blockhash.last_valid_block_height {
                return Err(LedgerError::BlockhashExpired);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        let signature: String = self
            .call("requestAirdrop", json!([address.to_string(), lamports]))
            .await?;
        parse_signature(&signature)
    }
}
