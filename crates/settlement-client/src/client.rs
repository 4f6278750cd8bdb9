//! Alloy-backed settlement client.
//!
//! One [`SettlementClient`] serves both ports: [`SettlementReader`] over
//! plain view calls and log queries, and [`SettlementOperator`] over a
//! wallet-signed provider. Operator submissions share one wallet, so a
//! submit lock serializes them against nonce races regardless of how many
//! games are in flight.

use std::str::FromStr;
use std::time::Duration;

use alloy::contract;
use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::abi::ChainAssassin;
use crate::error::{Result, SettlementError};
use crate::events::ChainEvent;
use crate::traits::{
    GameSetup, OnchainGame, OnchainPhase, SettlementOperator, SettlementReader, ZoneShrinkSpec,
};

/// How long to wait for a submitted transaction to confirm.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Settlement contract client over an alloy HTTP provider.
#[derive(Debug)]
pub struct SettlementClient {
    provider: DynProvider,
    contract_address: Address,
    /// Serializes wallet-signed submissions (single operator key).
    submit_lock: Mutex<()>,
}

impl SettlementClient {
    /// Connect to the settlement contract.
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - HTTP RPC endpoint of the chain node
    /// * `contract_address` - Deployed settlement contract address (0x-hex)
    /// * `operator_key` - Operator private key (0x-hex) used to sign
    ///   operator transactions
    ///
    /// # Errors
    ///
    /// Returns an error if the URL, address, or key is invalid, or the
    /// endpoint is unreachable.
    pub async fn connect(
        rpc_url: &str,
        contract_address: &str,
        operator_key: &str,
    ) -> Result<Self> {
        let contract_address = Address::from_str(contract_address)
            .map_err(|e| SettlementError::InvalidConfig(format!("contract address: {e}")))?;
        let signer = PrivateKeySigner::from_str(operator_key)
            .map_err(|e| SettlementError::InvalidConfig(format!("operator key: {e}")))?;
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await
            .map_err(|e| SettlementError::Connection(e.to_string()))?
            .erased();

        debug!(%contract_address, rpc_url, "Connected to settlement contract");

        Ok(Self {
            provider,
            contract_address,
            submit_lock: Mutex::new(()),
        })
    }

    fn contract(&self) -> ChainAssassin::ChainAssassinInstance<DynProvider> {
        ChainAssassin::new(self.contract_address, self.provider.clone())
    }

    /// Wait for a submitted operator call to confirm.
    async fn confirm(
        &self,
        action: &'static str,
        sent: contract::Result<PendingTransactionBuilder<Ethereum>>,
    ) -> Result<TxHash> {
        let pending = sent.map_err(|e| SettlementError::Reverted(format!("{action}: {e}")))?;

        let hash = pending
            .with_timeout(Some(CONFIRMATION_TIMEOUT))
            .watch()
            .await
            .map_err(|_| SettlementError::ConfirmationTimeout)?;

        debug!(action, tx = %hash, "Operator transaction confirmed");
        Ok(hash)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// READER IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SettlementReader for SettlementClient {
    async fn latest_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| SettlementError::Rpc(e.to_string()))
    }

    async fn chain_time(&self) -> Result<DateTime<Utc>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| SettlementError::Rpc(e.to_string()))?
            .ok_or_else(|| SettlementError::Rpc("no latest block".into()))?;

        let secs = i64::try_from(block.header.timestamp)
            .map_err(|_| SettlementError::Decode("block timestamp out of range".into()))?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| SettlementError::Decode("invalid block timestamp".into()))
    }

    #[instrument(skip(self))]
    async fn fetch_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, ChainEvent)>> {
        let filter = Filter::new()
            .address(self.contract_address)
            .from_block(from_block)
            .to_block(to_block);

        let mut logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| SettlementError::Rpc(e.to_string()))?;

        // get_logs ordering is node-dependent; enforce block/log order here
        logs.sort_by_key(|log| (log.block_number.unwrap_or(0), log.log_index.unwrap_or(0)));

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if let Some(event) = ChainEvent::decode_log(log)? {
                events.push((log.block_number.unwrap_or(from_block), event));
            }
        }

        debug!(
            from_block,
            to_block,
            count = events.len(),
            "Fetched settlement events"
        );
        Ok(events)
    }

    async fn fetch_game(&self, game_id: u64) -> Result<OnchainGame> {
        let ret = self
            .contract()
            .getGame(U256::from(game_id))
            .call()
            .await
            .map_err(|e| SettlementError::Rpc(e.to_string()))?;

        Ok(OnchainGame {
            setup: GameSetup::from_abi(ret.config),
            phase: OnchainPhase::try_from(ret.phase)?,
            player_count: ret.playerCount,
            total_collected: ret.totalCollected,
        })
    }

    async fn fetch_zone_shrinks(&self, game_id: u64) -> Result<Vec<ZoneShrinkSpec>> {
        let ret = self
            .contract()
            .getZoneShrinks(U256::from(game_id))
            .call()
            .await
            .map_err(|e| SettlementError::Rpc(e.to_string()))?;

        Ok(ret
            .atSeconds
            .into_iter()
            .zip(ret.radiiMeters)
            .map(|(at_second, radius_meters)| ZoneShrinkSpec {
                at_second,
                radius_meters,
            })
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATOR IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SettlementOperator for SettlementClient {
    async fn start_game(&self, game_id: u64) -> Result<TxHash> {
        let _guard = self.submit_lock.lock().await;
        let contract = self.contract();
        let sent = contract.startGame(U256::from(game_id)).send().await;
        self.confirm("startGame", sent).await
    }

    async fn record_kill(&self, game_id: u64, hunter: u16, target: u16) -> Result<TxHash> {
        let _guard = self.submit_lock.lock().await;
        let contract = self.contract();
        let sent = contract
            .recordKill(U256::from(game_id), hunter, target)
            .send()
            .await;
        self.confirm("recordKill", sent).await
    }

    async fn eliminate_player(&self, game_id: u64, player: u16, reason: u8) -> Result<TxHash> {
        let _guard = self.submit_lock.lock().await;
        let contract = self.contract();
        let sent = contract
            .eliminatePlayer(U256::from(game_id), player, reason)
            .send()
            .await;
        self.confirm("eliminatePlayer", sent).await
    }

    async fn end_game(
        &self,
        game_id: u64,
        winner1: u16,
        winner2: u16,
        winner3: u16,
        top_killer: u16,
    ) -> Result<TxHash> {
        let _guard = self.submit_lock.lock().await;
        let contract = self.contract();
        let sent = contract
            .endGame(U256::from(game_id), winner1, winner2, winner3, top_killer)
            .send()
            .await;
        self.confirm("endGame", sent).await
    }

    async fn trigger_cancellation(&self, game_id: u64) -> Result<TxHash> {
        let _guard = self.submit_lock.lock().await;
        let contract = self.contract();
        let sent = contract.triggerCancellation(U256::from(game_id)).send().await;
        self.confirm("triggerCancellation", sent).await
    }

    async fn trigger_expiry(&self, game_id: u64) -> Result<TxHash> {
        let _guard = self.submit_lock.lock().await;
        let contract = self.contract();
        let sent = contract.triggerExpiry(U256::from(game_id)).send().await;
        self.confirm("triggerExpiry", sent).await
    }
}
