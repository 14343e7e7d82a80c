//! Tests for the wallet-side peer against a scripted provider.

mod common;

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use evm_wallet_relay::{
    blockchain::{chains::AddChainParams, Chain, ChainTarget, TransactionPayload},
    relay::{RelayError, RequestKind, SigningRequest, WalletAction, PROTOCOL_VERSION},
    wallet::{
        Approver, Decision, ProviderError, RequestPreview, WalletClient, WalletProvider,
        UNRECOGNIZED_CHAIN,
    },
};

use common::*;

const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

struct MockProvider {
    chain_id: Mutex<u64>,
    known_chains: Mutex<HashSet<u64>>,
    calls: Mutex<Vec<String>>,
    fail_with: Option<ProviderError>,
}

impl MockProvider {
    fn on(chain: Chain) -> Self {
        Self {
            chain_id: Mutex::new(chain.id()),
            known_chains: Mutex::new([Chain::Ethereum.id(), chain.id()].into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    fn failing(mut self, error: ProviderError) -> Self {
        self.fail_with = Some(error);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self, ok: &str) -> Result<String, ProviderError> {
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(ok.to_string()),
        }
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        self.record("eth_requestAccounts".into());
        Ok(vec![ACCOUNT.to_string()])
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.record(format!("switch:{}", chain_id));
        if !self.known_chains.lock().unwrap().contains(&chain_id) {
            return Err(ProviderError::new(UNRECOGNIZED_CHAIN, "Unrecognized chain ID"));
        }
        *self.chain_id.lock().unwrap() = chain_id;
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
        self.record(format!("add:{}", params.chain_id));
        let id = u64::from_str_radix(params.chain_id.trim_start_matches("0x"), 16)
            .map_err(|e| ProviderError::new(-32602, e.to_string()))?;
        self.known_chains.lock().unwrap().insert(id);
        Ok(())
    }

    async fn send_transaction(
        &self,
        from: &str,
        tx: &TransactionPayload,
    ) -> Result<String, ProviderError> {
        self.record(format!("send:{}->{}", from, tx.to));
        self.outcome("0xtxhash")
    }

    async fn personal_sign(&self, message: &str, account: &str) -> Result<String, ProviderError> {
        self.record(format!("personal_sign:{}:{}", account, message));
        self.outcome("0xsignature")
    }

    async fn sign_typed_data(
        &self,
        account: &str,
        _typed_data: &Value,
    ) -> Result<String, ProviderError> {
        self.record(format!("sign_typed_data:{}", account));
        self.outcome("0xtypedsig")
    }
}

struct FixedApprover(Decision);

impl FixedApprover {
    fn new(decision: Decision) -> Self {
        Self(decision)
    }
}

#[async_trait]
impl Approver for FixedApprover {
    async fn review(&self, preview: &RequestPreview) -> Decision {
        assert!(preview.summary().contains(preview.kind.as_str()));
        self.0
    }
}

fn request(kind: RequestKind, chain: &str, data: Value) -> SigningRequest {
    SigningRequest {
        version: PROTOCOL_VERSION,
        id: "req-1".to_string(),
        kind,
        chain: chain.to_string(),
        data,
    }
}

fn transfer(chain: &str) -> SigningRequest {
    request(
        RequestKind::SendTransaction,
        chain,
        json!({ "to": "0x000000000000000000000000000000000000dEaD", "value": "1000000000000000000" }),
    )
}

#[tokio::test]
async fn test_approved_transaction_returns_hash() {
    let mut client = WalletClient::new(
        MockProvider::on(Chain::Ethereum),
        FixedApprover::new(Decision::Approve),
    );

    let response = client.handle_request(&transfer("ethereum")).await;
    assert!(response.success);
    assert_eq!(response.id, "req-1");
    assert_eq!(response.result.as_deref(), Some("0xtxhash"));
    assert_eq!(client.account(), Some(ACCOUNT));

    // already on the requested chain: no switch
    assert!(!client.provider().calls().iter().any(|c| c.starts_with("switch")));
}

#[tokio::test]
async fn test_rejected_request_never_reaches_provider() {
    let mut client = WalletClient::new(
        MockProvider::on(Chain::Ethereum),
        FixedApprover::new(Decision::Reject),
    );

    let response = client.handle_request(&transfer("any")).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("User rejected transaction"));
    assert!(client.provider().calls().is_empty());

    let response = client
        .handle_request(&request(RequestKind::SignMessage, "any", json!({ "message": "hi" })))
        .await;
    assert_eq!(response.error.as_deref(), Some("User rejected signature request"));
}

#[tokio::test]
async fn test_switches_to_requested_chain() {
    let mut client = WalletClient::new(
        MockProvider::on(Chain::Ethereum),
        FixedApprover::new(Decision::Approve),
    );
    client
        .provider()
        .known_chains
        .lock()
        .unwrap()
        .insert(Chain::Base.id());

    let response = client.handle_request(&transfer("base")).await;
    assert!(response.success);
    assert_eq!(client.chain_id(), Some(Chain::Base.id()));

    let calls = client.provider().calls();
    assert!(calls.contains(&format!("switch:{}", Chain::Base.id())));
    assert!(!calls.iter().any(|c| c.starts_with("add")));
}

#[tokio::test]
async fn test_unknown_chain_is_added_then_switched() {
    let mut client = WalletClient::new(
        MockProvider::on(Chain::Ethereum),
        FixedApprover::new(Decision::Approve),
    );

    let response = client.handle_request(&transfer("optimism")).await;
    assert!(response.success, "{:?}", response.error);

    let id = Chain::Optimism.id();
    let calls = client.provider().calls();
    let switches: Vec<_> = calls.iter().filter(|c| **c == format!("switch:{}", id)).collect();
    assert_eq!(switches.len(), 2);
    assert!(calls.contains(&format!("add:{}", Chain::Optimism.hex_id())));
    assert_eq!(client.chain_id(), Some(id));
}

#[tokio::test]
async fn test_provider_errors_pass_through() {
    let mut client = WalletClient::new(
        MockProvider::on(Chain::Ethereum).failing(ProviderError::new(-32000, "insufficient funds")),
        FixedApprover::new(Decision::Approve),
    );
    let response = client.handle_request(&transfer("any")).await;
    assert_eq!(response.error.as_deref(), Some("insufficient funds"));

    // a rejection raised by the extension itself reads the same as our own
    let mut client = WalletClient::new(
        MockProvider::on(Chain::Ethereum).failing(ProviderError::user_rejected()),
        FixedApprover::new(Decision::Approve),
    );
    let typed = request(
        RequestKind::SignTypedData,
        "any",
        json!({ "typedData": { "domain": {}, "types": {}, "primaryType": "Mail", "message": {} } }),
    );
    let response = client.handle_request(&typed).await;
    assert_eq!(response.error.as_deref(), Some("User rejected signature request"));
}

#[tokio::test]
async fn test_bad_requests_fail_without_prompting() {
    let approver = FixedApprover::new(Decision::Approve);
    let mut client = WalletClient::new(MockProvider::on(Chain::Ethereum), approver);

    let response = client.handle_request(&transfer("dogechain")).await;
    assert!(!response.success);

    let mut future = transfer("any");
    future.version = PROTOCOL_VERSION + 1;
    let response = client.handle_request(&future).await;
    assert!(response.error.unwrap().contains("Unsupported protocol version"));

    let response = client
        .handle_request(&request(RequestKind::SendTransaction, "any", json!({ "to": "nope" })))
        .await;
    assert!(!response.success);

    assert!(client.provider().calls().is_empty());
}

#[tokio::test]
async fn test_wallet_client_answers_through_relay() {
    let server = test_server(test_settings(free_port()));
    server.start().await.unwrap();
    let url = server.ui_url().unwrap();

    let wallet = tokio::spawn(async move {
        let mut client = WalletClient::new(
            MockProvider::on(Chain::Ethereum),
            FixedApprover::new(Decision::Approve),
        );
        client.run(&url).await
    });

    let signature = server
        .send_transaction(WalletAction::new(
            RequestKind::SignMessage,
            ChainTarget::Any,
            json!({ "message": "hello relay" }),
        ))
        .await
        .unwrap();
    assert_eq!(signature, "0xsignature");

    let err = server
        .send_transaction(WalletAction::new(
            RequestKind::SendTransaction,
            ChainTarget::Any,
            json!({ "to": "not-an-address" }),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Wallet(_)));

    server.stop().await;
    let answered = wallet.await.unwrap().unwrap();
    assert_eq!(answered, 2);
    assert_eq!(server.port(), None);
}
