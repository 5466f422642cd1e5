//! End-to-end rotation runs against the in-memory ledger.

use alloy::primitives::{Address, TxHash, U256};
use role_key_rotation::account::{AccountKey, Keyring, Role, RolePolicies, RolePolicy};
use role_key_rotation::rotation::{ErrorKind, KeyRotation, Step};
use role_key_rotation::rpc::{ChainRpc, MemoryChain, RpcResult, TransactionReceipt};
use role_key_rotation::transaction::{Transaction, TxBuilder};
use role_key_rotation::wallet::KeyringContainer;

mod common;

use common::{fast_receipts, funded_chain, options, reference_policies, wallet_for, CHAIN_ID};

#[tokio::test]
async fn test_reference_rotation_end_to_end() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);

    let result = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap();

    assert_eq!(result.address, address);
    assert_eq!(result.key_counts, [2, 1, 3]);
    assert!(result.update_receipt.succeeded());
    assert!(result.probe_receipt.succeeded());
    assert_ne!(result.update_tx_hash, result.probe_tx_hash);

    // The chain holds exactly the key that was derived
    let onchain = chain.account_key(&address).unwrap();
    assert_eq!(onchain, result.account_key);
    assert_eq!(result.onchain_account_key, onchain);
    let AccountKey::RoleBased(roles) = &onchain else {
        panic!("expected a role-based key, got {:?}", onchain);
    };
    assert!(matches!(roles[0], AccountKey::WeightedMultiSig { threshold: 2, ref keys } if keys.len() == 2));
    assert!(matches!(roles[1], AccountKey::Public(_)));
    assert!(matches!(roles[2], AccountKey::WeightedMultiSig { threshold: 3, ref keys } if keys.len() == 3));

    // Probe moved one unit
    assert_eq!(chain.balance(&Address::repeat_byte(0xee)), U256::from(1));
    assert_eq!(chain.nonce(&address), 2);
}

#[tokio::test]
async fn test_result_json_hides_private_keys() {
    let (chain, signer) = funded_chain();
    let mut wallet = wallet_for(&signer);

    let result = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(signer.address(), [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("newKeyring").is_none());
    assert_eq!(json["accountKey"]["keyType"], 5);
    assert_eq!(json["updateReceipt"]["type"], "TxTypeAccountUpdate");

    let text = json.to_string();
    for signer in result.new_keyring.role_keys(Role::Transaction) {
        let private = alloy::primitives::hex::encode(signer.to_bytes());
        assert!(!text.contains(&private));
    }
}

#[tokio::test]
async fn test_wallet_switches_to_new_keyring() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);

    let result = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap();

    let installed = wallet.get(&address).unwrap();
    assert_eq!(installed.key_counts(), [2, 1, 3]);
    assert_eq!(installed.public_keys(), result.new_keyring.public_keys());

    // The old key no longer authorizes anything
    let mut transfer = TxBuilder::new(&chain, CHAIN_ID)
        .value_transfer(address, Address::repeat_byte(0xee), U256::from(1), 150_000)
        .await
        .unwrap();
    transfer.sign_with(&signer).unwrap();
    let err = chain.send_raw_transaction(&transfer).await.unwrap_err();
    assert!(err.to_string().contains("signature"));
}

#[tokio::test]
async fn test_new_keys_cannot_authorize_their_own_installation() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);
    let rotation = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts());

    let prepared = rotation.prepare(address, [2, 1, 3], &reference_policies()).unwrap();
    let mut update = TxBuilder::new(&chain, CHAIN_ID)
        .account_update(address, prepared.account(), 150_000)
        .await
        .unwrap();

    let mut rogue = KeyringContainer::new();
    rogue.add(prepared.keyring().clone()).unwrap();
    rogue.sign(&address, &mut update).unwrap();

    assert!(chain.send_raw_transaction(&update).await.is_err());
    assert_eq!(chain.account_key(&address), Some(AccountKey::Legacy));
    assert_eq!(chain.nonce(&address), 0);
}

#[tokio::test]
async fn test_unreachable_threshold_is_policy_violation() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);
    let policies = RolePolicies::new(
        RolePolicy::weighted(2, vec![1, 1]),
        RolePolicy::SingleSigner,
        RolePolicy::weighted(3, vec![1, 1]),
    );

    let err = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &policies, &options(150_000))
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::DeriveAccount);
    assert!(matches!(err.kind, ErrorKind::PolicyViolation(_)));
    assert!(err.to_string().contains("sum to 2, below threshold 3"));
    assert!(!err.is_irreversible());
    // nothing reached the chain
    assert_eq!(chain.nonce(&address), 0);
    assert_eq!(chain.block_number(), 0);
}

#[tokio::test]
async fn test_missing_receipt_times_out() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);
    chain.withhold_receipts(true);

    let err = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::ConfirmUpdate);
    assert!(matches!(err.kind, ErrorKind::ConfirmationTimeout { .. }));
    assert!(err.is_irreversible());
    // the update did land, but the wallet keeps the old keyring
    assert!(matches!(chain.account_key(&address), Some(AccountKey::RoleBased(_))));
    assert_eq!(wallet.get(&address).unwrap().key_counts(), [1, 1, 1]);
}

#[tokio::test]
async fn test_delayed_receipt_is_awaited() {
    let (chain, signer) = funded_chain();
    let mut wallet = wallet_for(&signer);
    chain.set_receipt_delay(3);

    let result = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(signer.address(), [2, 1, 3], &reference_policies(), &options(150_000))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_out_of_gas_update_reverts() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);

    // six public keys need 21000 + 6 * 15000
    let err = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(50_000))
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::ConfirmUpdate);
    let ErrorKind::TransactionReverted { receipt, .. } = &err.kind else {
        panic!("expected a reverted update, got {:?}", err.kind);
    };
    assert!(!receipt.succeeded());
    assert_eq!(chain.account_key(&address), Some(AccountKey::Legacy));
    assert_eq!(wallet.get(&address).unwrap().key_counts(), [1, 1, 1]);
}

#[tokio::test]
async fn test_failed_probe_needs_manual_intervention() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);
    let mut options = options(150_000);
    // more than the account holds
    options.probe.value = common::initial_balance() * U256::from(10);

    let err = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options)
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::Probe);
    let ErrorKind::ProbeFailed(inner) = &err.kind else {
        panic!("expected a probe failure, got {:?}", err.kind);
    };
    assert!(matches!(**inner, ErrorKind::Submission(_)));
    assert!(err.needs_manual_intervention());
    // rotation itself stands: chain and wallet both moved on
    assert!(matches!(chain.account_key(&address), Some(AccountKey::RoleBased(_))));
    assert_eq!(wallet.get(&address).unwrap().key_counts(), [2, 1, 3]);
}

#[tokio::test]
async fn test_rotating_twice_uses_the_current_keys() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);

    KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap();

    // The second update is signed by the account-update role of the first rotation
    let second = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(
            address,
            [1, 1, 1],
            &RolePolicies::default(),
            &options(150_000),
        )
        .await
        .unwrap();

    assert_eq!(chain.account_key(&address), Some(second.account_key));
    assert_eq!(wallet.get(&address).unwrap().key_counts(), [1, 1, 1]);
}

#[tokio::test]
async fn test_empty_role_keeps_existing_role_key() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let mut wallet = wallet_for(&signer);

    let first = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap();
    let AccountKey::RoleBased(first_roles) = &first.account_key else {
        panic!("expected a role-based key");
    };

    // No fee-payer keys: the role is sent as nil and the chain keeps the old one
    let policies = RolePolicies::new(
        RolePolicy::weighted(2, vec![1, 1]),
        RolePolicy::SingleSigner,
        RolePolicy::SingleSigner,
    );
    let second = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 0], &policies, &options(150_000))
        .await
        .unwrap();

    let Some(AccountKey::RoleBased(roles)) = chain.account_key(&address) else {
        panic!("expected a role-based key");
    };
    assert_eq!(roles[2], first_roles[2]);
    assert_ne!(roles[0], first_roles[0]);

    // The result reports what the node holds, not the nil placeholder
    let AccountKey::RoleBased(sent) = &second.account_key else {
        panic!("expected a role-based key");
    };
    assert_eq!(sent[2], AccountKey::Nil);
    let AccountKey::RoleBased(reported) = &second.onchain_account_key else {
        panic!("expected a role-based key");
    };
    assert_eq!(reported[2], first_roles[2]);
    let json = serde_json::to_value(&second).unwrap();
    assert_eq!(json["onchainAccountKey"]["key"][2]["keyType"], 4);
}

/// Delegates to a ledger but reports a stale account key.
struct StaleKeyChain(MemoryChain);

impl ChainRpc for StaleKeyChain {
    async fn chain_id(&self) -> RpcResult<u64> {
        self.0.chain_id().await
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        self.0.gas_price().await
    }

    async fn get_transaction_count(&self, address: Address) -> RpcResult<u64> {
        self.0.get_transaction_count(address).await
    }

    async fn send_raw_transaction(&self, tx: &Transaction) -> RpcResult<TxHash> {
        self.0.send_raw_transaction(tx).await
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> RpcResult<Option<TransactionReceipt>> {
        self.0.get_transaction_receipt(tx_hash).await
    }

    async fn get_account_key(&self, _address: Address) -> RpcResult<Option<AccountKey>> {
        Ok(Some(AccountKey::Legacy))
    }
}

#[tokio::test]
async fn test_stale_account_key_fails_verification() {
    let (chain, signer) = funded_chain();
    let address = signer.address();
    let chain = StaleKeyChain(chain);
    let mut wallet = wallet_for(&signer);

    let err = KeyRotation::new(&chain, &mut wallet, CHAIN_ID, fast_receipts())
        .rotate_to_role_based_keys(address, [2, 1, 3], &reference_policies(), &options(150_000))
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::VerifyAccountKey);
    let ErrorKind::Verification { actual, .. } = &err.kind else {
        panic!("expected a verification failure, got {:?}", err.kind);
    };
    assert_eq!(actual.as_deref(), Some(&AccountKey::Legacy));
    assert!(err.is_irreversible());
    // not installed locally
    let current: &Keyring = wallet.get(&address).unwrap();
    assert_eq!(current.key_counts(), [1, 1, 1]);
}
