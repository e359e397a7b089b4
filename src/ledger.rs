use crate::{
    address::{
        Address,
        METACHAIN_SHARD,
    },
    encoder::HexArg,
    error::LedgerError,
    tokens::TokenIdentifier,
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use num_bigint::BigUint;
use reqwest::{
    StatusCode,
    header::CACHE_CONTROL,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use std::{
    future::Future,
    sync::Mutex,
    time::{
        Duration,
        Instant,
    },
};

/// Read-only contract query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryCall {
    pub function: String,
    pub args: Vec<HexArg>,
}

impl QueryCall {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: HexArg) -> Self {
        self.args.push(arg);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// A recently fetched value is good enough.
    Cached,
    /// Always go to the network.
    Fresh,
}

/// The ledger network as seen from the client.
pub trait Ledger {
    /// Runs a contract view and returns its raw result blobs.
    fn query(
        &self,
        call: &QueryCall,
    ) -> impl Future<Output = Result<Vec<Vec<u8>>, LedgerError>> + Send;

    fn epoch(
        &self,
        freshness: Freshness,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    fn balance(
        &self,
        address: &Address,
        token: &TokenIdentifier,
    ) -> impl Future<Output = Result<BigUint, LedgerError>> + Send;
}

/// [`Ledger`] backed by the gateway REST API.
pub struct GatewayLedger {
    base_url: String,
    hrp: String,
    contract: String,
    http: reqwest::Client,
    epoch_ttl: Duration,
    cached_epoch: Mutex<Option<(u64, Instant)>>,
}

impl GatewayLedger {
    pub fn new(
        base_url: impl Into<String>,
        hrp: impl Into<String>,
        contract: Address,
        request_timeout: Duration,
        epoch_ttl: Duration,
    ) -> Result<Self, LedgerError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let hrp = hrp.into();
        let contract = contract.to_bech32(&hrp)?;
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url,
            hrp,
            contract,
            http,
            epoch_ttl,
            cached_epoch: Mutex::new(None),
        })
    }

    fn cached_epoch(&self) -> Option<u64> {
        let guard = self.cached_epoch.lock().ok()?;
        let (epoch, at) = (*guard)?;
        (at.elapsed() < self.epoch_ttl).then_some(epoch)
    }

    fn store_epoch(&self, epoch: u64) {
        if let Ok(mut guard) = self.cached_epoch.lock() {
            *guard = Some((epoch, Instant::now()));
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        no_cache: bool,
    ) -> Result<T, LedgerError> {
        let mut request = self.http.get(url);
        if no_cache {
            request = request.header(CACHE_CONTROL, "no-cache");
        }
        let res = request.send().await?;
        Self::read_envelope(res).await
    }

    async fn read_envelope<T: DeserializeOwned>(
        res: reqwest::Response,
    ) -> Result<T, LedgerError> {
        let status = res.status();
        let bytes = res.bytes().await?;
        if status != StatusCode::OK {
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let envelope: EnvelopeDto<T> = serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::Payload(e.to_string()))?;
        envelope.data.ok_or_else(|| {
            LedgerError::Payload(format!("gateway error: {}", envelope.error))
        })
    }

    async fn fetch_epoch(&self) -> Result<u64, LedgerError> {
        let url = format!("{}/network/status/{}", self.base_url, METACHAIN_SHARD);
        let dto: NetworkStatusDto = self.get_json(url, true).await?;
        Ok(dto.status.erd_epoch_number)
    }
}

impl Ledger for GatewayLedger {
    async fn query(&self, call: &QueryCall) -> Result<Vec<Vec<u8>>, LedgerError> {
        let url = format!("{}/vm-values/query", self.base_url);
        let body = QueryRequestDto {
            sc_address: &self.contract,
            func_name: &call.function,
            args: call.args.iter().map(HexArg::as_str).collect(),
        };
        tracing::debug!(function = %call.function, "querying contract");
        let res = self.http.post(url).json(&body).send().await?;
        let dto: QueryResponseDto = Self::read_envelope(res).await?;
        let result = dto.data;
        if result.return_code != "ok" {
            return Err(LedgerError::Query {
                function: call.function.clone(),
                code: result.return_code,
                message: result.return_message,
            });
        }
        result
            .return_data
            .unwrap_or_default()
            .into_iter()
            .map(|blob| match blob {
                Some(encoded) => STANDARD.decode(encoded).map_err(LedgerError::from),
                None => Ok(Vec::new()),
            })
            .collect()
    }

    async fn epoch(&self, freshness: Freshness) -> Result<u64, LedgerError> {
        if freshness == Freshness::Cached
            && let Some(epoch) = self.cached_epoch()
        {
            return Ok(epoch);
        }
        let epoch = self.fetch_epoch().await?;
        self.store_epoch(epoch);
        Ok(epoch)
    }

    async fn balance(
        &self,
        address: &Address,
        token: &TokenIdentifier,
    ) -> Result<BigUint, LedgerError> {
        let address = address.to_bech32(&self.hrp)?;
        let raw = match token {
            TokenIdentifier::Native => {
                let url = format!("{}/address/{}/balance", self.base_url, address);
                let dto: BalanceDto = self.get_json(url, false).await?;
                dto.balance
            }
            TokenIdentifier::Fungible(id) => {
                let url = format!("{}/address/{}/esdt/{}", self.base_url, address, id);
                let dto: TokenBalanceDto = self.get_json(url, false).await?;
                dto.token_data.balance
            }
        };
        BigUint::parse_bytes(raw.as_bytes(), 10)
            .ok_or_else(|| LedgerError::Payload(format!("invalid balance {raw:?}")))
    }
}

#[derive(Deserialize)]
struct EnvelopeDto<T> {
    data: Option<T>,
    #[serde(default)]
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequestDto<'a> {
    sc_address: &'a str,
    func_name: &'a str,
    args: Vec<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponseDto {
    data: QueryResultDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultDto {
    return_data: Option<Vec<Option<String>>>,
    #[serde(default)]
    return_code: String,
    #[serde(default)]
    return_message: String,
}

#[derive(Deserialize)]
struct NetworkStatusDto {
    status: EpochDto,
}

#[derive(Deserialize)]
struct EpochDto {
    erd_epoch_number: u64,
}

#[derive(Deserialize)]
struct BalanceDto {
    balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalanceDto {
    token_data: BalanceDto,
}
