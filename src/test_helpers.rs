use crate::{
    address::Address,
    config::{
        ArenaConfig,
        Network,
    },
    encoder::CallPayload,
    error::{
        LedgerError,
        SubmissionError,
    },
    ledger::{
        Freshness,
        Ledger,
        QueryCall,
    },
    model::{
        GameRecord,
        SessionHandle,
    },
    tokens::TokenIdentifier,
    wallet::{
        SessionStatus,
        Wallet,
    },
};
use num_bigint::BigUint;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::Mutex,
};

pub fn contract_address() -> Address {
    let mut bytes = [0u8; 32];
    bytes[30] = 0x0a;
    bytes[31] = 0x01;
    Address::new(bytes)
}

/// A user address that lands in `shard`.
pub fn user_address(seed: u8, shard: u8) -> Address {
    let mut bytes = [seed.max(1); 32];
    bytes[31] = shard & 0b11;
    Address::new(bytes)
}

pub fn test_config() -> ArenaConfig {
    let mut config = ArenaConfig::for_network(Network::Devnet, contract_address());
    config.spin_secret = Some("test-secret".to_string());
    config
}

/// Packs games the way the contract's active-games view does.
pub fn game_blobs(games: &[GameRecord]) -> Vec<Vec<u8>> {
    games
        .iter()
        .flat_map(|game| {
            let key = BigUint::from(game.id).to_bytes_be();
            [key, game_payload(game)]
        })
        .collect()
}

pub fn game_payload(game: &GameRecord) -> Vec<u8> {
    let token = game.token.as_str().as_bytes();
    let amount = game.amount.to_bytes_be();
    let mut bytes = game.id.to_be_bytes().to_vec();
    bytes.push(game.side.selector());
    bytes.extend((token.len() as u32).to_be_bytes());
    bytes.extend(token);
    bytes.extend((amount.len() as u32).to_be_bytes());
    bytes.extend(amount);
    bytes.extend(game.creator.as_bytes());
    if let Some(rival) = &game.rival {
        bytes.push(1);
        bytes.extend(rival.as_bytes());
    }
    bytes
}

type Scripted = Result<Vec<Vec<u8>>, String>;

/// In-memory ledger. Each function answers from a script: responses are
/// consumed in order and the last one repeats.
#[derive(Default)]
pub struct FakeLedger {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    queries: Mutex<Vec<QueryCall>>,
    epoch: Mutex<u64>,
    cached_epoch: Mutex<Option<u64>>,
    balances: Mutex<HashMap<(Address, TokenIdentifier), BigUint>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, function: &str, responses: Vec<Vec<Vec<u8>>>) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.insert(
            function.to_string(),
            responses.into_iter().map(Ok).collect(),
        );
    }

    pub fn push_failure(&self, function: &str, message: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .entry(function.to_string())
            .or_default()
            .push_front(Err(message.to_string()));
    }

    pub fn set_active_games(&self, games: &[GameRecord]) {
        self.script("getActiveGames", vec![game_blobs(games)]);
    }

    pub fn set_epoch(&self, epoch: u64) {
        *self.epoch.lock().unwrap() = epoch;
    }

    pub fn set_balance(&self, address: Address, token: TokenIdentifier, amount: BigUint) {
        self.balances.lock().unwrap().insert((address, token), amount);
    }

    pub fn queries(&self) -> Vec<QueryCall> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self, function: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.function == function)
            .count()
    }
}

impl Ledger for FakeLedger {
    async fn query(&self, call: &QueryCall) -> Result<Vec<Vec<u8>>, LedgerError> {
        self.queries.lock().unwrap().push(call.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(&call.function) else {
            return Ok(Vec::new());
        };
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(blobs)) => Ok(blobs),
            Some(Err(message)) => Err(LedgerError::Unavailable(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn epoch(&self, freshness: Freshness) -> Result<u64, LedgerError> {
        let mut cached = self.cached_epoch.lock().unwrap();
        if freshness == Freshness::Cached
            && let Some(epoch) = *cached
        {
            return Ok(epoch);
        }
        let epoch = *self.epoch.lock().unwrap();
        *cached = Some(epoch);
        Ok(epoch)
    }

    async fn balance(
        &self,
        address: &Address,
        token: &TokenIdentifier,
    ) -> Result<BigUint, LedgerError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(*address, token.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Wallet that accepts everything and records what it signed.
pub struct FakeWallet {
    address: Address,
    submitted: Mutex<Vec<Vec<CallPayload>>>,
    submit_calls: Mutex<usize>,
    withhold_next: Mutex<bool>,
    reject_next: Mutex<Option<String>>,
    status: Mutex<SessionStatus>,
}

impl FakeWallet {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            submitted: Mutex::new(Vec::new()),
            submit_calls: Mutex::new(0),
            withhold_next: Mutex::new(false),
            reject_next: Mutex::new(None),
            status: Mutex::new(SessionStatus::Success),
        }
    }

    pub fn withhold_next_handle(&self) {
        *self.withhold_next.lock().unwrap() = true;
    }

    pub fn reject_next(&self, reason: &str) {
        *self.reject_next.lock().unwrap() = Some(reason.to_string());
    }

    pub fn set_session_status(&self, status: SessionStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Payload lists of every session that obtained a handle.
    pub fn submitted(&self) -> Vec<Vec<CallPayload>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> usize {
        *self.submit_calls.lock().unwrap()
    }
}

impl Wallet for FakeWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn submit(
        &self,
        payloads: &[CallPayload],
    ) -> Result<Option<SessionHandle>, SubmissionError> {
        let call = {
            let mut calls = self.submit_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if let Some(reason) = self.reject_next.lock().unwrap().take() {
            return Err(SubmissionError::Rejected(reason));
        }
        if std::mem::take(&mut *self.withhold_next.lock().unwrap()) {
            return Ok(None);
        }
        self.submitted.lock().unwrap().push(payloads.to_vec());
        Ok(Some(SessionHandle::new(format!("session-{call}"))))
    }

    async fn session_status(
        &self,
        _handle: &SessionHandle,
    ) -> Result<SessionStatus, SubmissionError> {
        Ok(self.status.lock().unwrap().clone())
    }
}
