use crate::{
    address::{
        Address,
        DEFAULT_HRP,
    },
    error::ConfigError,
    poll::{
        PollPolicy,
        millis,
    },
    resolver::ResolverTimings,
    tokens::{
        TokenDecimalsTable,
        TokenIdentifier,
    },
};
use num_bigint::BigUint;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_DEVNET_GATEWAY_URL: &str = "https://devnet-gateway.multiversx.com";
pub const DEFAULT_TESTNET_GATEWAY_URL: &str = "https://testnet-gateway.multiversx.com";
pub const DEFAULT_MAINNET_GATEWAY_URL: &str = "https://gateway.multiversx.com";
pub const SPIN_SECRET_ENV: &str = "ARENA_SPIN_SECRET";

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(10_000);
const DEFAULT_EPOCH_CACHE_TTL: Duration = Duration::from_millis(30_000);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Devnet,
    Testnet,
    Mainnet,
}

impl Network {
    pub fn default_gateway(self) -> &'static str {
        match self {
            Network::Devnet => DEFAULT_DEVNET_GATEWAY_URL,
            Network::Testnet => DEFAULT_TESTNET_GATEWAY_URL,
            Network::Mainnet => DEFAULT_MAINNET_GATEWAY_URL,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(ConfigError::Invalid {
                field: "network",
                reason: format!("unknown network {other:?}"),
            }),
        }
    }
}

/// Poll budget per feature; fixed for each call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicies {
    pub create: PollPolicy,
    pub join: PollPolicy,
    pub cancel: PollPolicy,
    pub spin: PollPolicy,
    pub vote: PollPolicy,
}

impl Default for PollPolicies {
    fn default() -> Self {
        let second = Duration::from_millis(1_000);
        Self {
            create: PollPolicy::new(10, second),
            join: PollPolicy::new(10, second),
            cancel: PollPolicy::new(8, second),
            spin: PollPolicy::new(15, second),
            vote: PollPolicy::new(5, second),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasLimits {
    pub create: u64,
    pub join: u64,
    pub cancel: u64,
    pub spin: u64,
    pub vote: u64,
    pub fee_transfer: u64,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            create: 10_000_000,
            join: 15_000_000,
            cancel: 8_000_000,
            spin: 20_000_000,
            vote: 6_000_000,
            fee_transfer: 50_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProtocolFeeFile {
    receiver: String,
    /// Smallest units of the native currency.
    amount: String,
}

/// On-disk shape of the configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub gateway_url: Option<String>,
    pub contract: String,
    #[serde(default = "default_hrp")]
    pub address_hrp: String,
    #[serde(default)]
    pub tokens: BTreeMap<String, u32>,
    #[serde(default)]
    protocol_fee: Option<ProtocolFeeFile>,
    #[serde(default)]
    pub timings: ResolverTimings,
    #[serde(default)]
    pub polls: PollPolicies,
    #[serde(default)]
    pub gas: GasLimits,
    #[serde(with = "millis", default = "default_refresh_interval")]
    pub refresh_interval: Duration,
    #[serde(with = "millis", default = "default_epoch_cache_ttl")]
    pub epoch_cache_ttl: Duration,
    #[serde(with = "millis", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub spin_secret: Option<String>,
}

fn default_hrp() -> String {
    DEFAULT_HRP.to_string()
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

fn default_epoch_cache_ttl() -> Duration {
    DEFAULT_EPOCH_CACHE_TTL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolFee {
    pub receiver: Address,
    pub amount: BigUint,
}

/// Validated configuration handed to [`crate::client::ArenaClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    pub network: Network,
    pub gateway_url: String,
    pub contract: Address,
    pub address_hrp: String,
    pub tokens: TokenDecimalsTable,
    pub protocol_fee: Option<ProtocolFee>,
    pub timings: ResolverTimings,
    pub polls: PollPolicies,
    pub gas: GasLimits,
    pub refresh_interval: Duration,
    pub epoch_cache_ttl: Duration,
    pub request_timeout: Duration,
    pub spin_secret: Option<String>,
}

impl ArenaConfig {
    /// Defaults for `network`, only the contract is required.
    pub fn for_network(network: Network, contract: Address) -> Self {
        Self {
            network,
            gateway_url: network.default_gateway().to_string(),
            contract,
            address_hrp: DEFAULT_HRP.to_string(),
            tokens: TokenDecimalsTable::default(),
            protocol_fee: None,
            timings: ResolverTimings::default(),
            polls: PollPolicies::default(),
            gas: GasLimits::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            epoch_cache_ttl: DEFAULT_EPOCH_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            spin_secret: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = resolve_path(path.as_ref());
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile = serde_json::from_str(&raw)?;
        let env_secret = std::env::var(SPIN_SECRET_ENV).ok();
        Self::from_file(file, env_secret)
    }

    pub fn from_file(
        file: ConfigFile,
        env_secret: Option<String>,
    ) -> Result<Self, ConfigError> {
        let contract = parse_address("contract", &file.contract)?;
        if !contract.is_contract() {
            return Err(ConfigError::Invalid {
                field: "contract",
                reason: format!("{} is not a contract address", file.contract),
            });
        }

        if bech32::Hrp::parse(&file.address_hrp).is_err() {
            return Err(ConfigError::Invalid {
                field: "address_hrp",
                reason: format!("{:?} is not a bech32 prefix", file.address_hrp),
            });
        }

        let mut tokens = TokenDecimalsTable::default();
        for (raw, decimals) in file.tokens {
            let token =
                TokenIdentifier::parse(&raw).map_err(|e| ConfigError::Invalid {
                    field: "tokens",
                    reason: e.to_string(),
                })?;
            tokens.insert(token, decimals);
        }

        let protocol_fee = file
            .protocol_fee
            .map(|fee| -> Result<ProtocolFee, ConfigError> {
                let receiver = parse_address("protocol_fee.receiver", &fee.receiver)?;
                let amount = BigUint::parse_bytes(fee.amount.as_bytes(), 10)
                    .ok_or_else(|| ConfigError::Invalid {
                        field: "protocol_fee.amount",
                        reason: format!("{:?} is not a decimal amount", fee.amount),
                    })?;
                Ok(ProtocolFee { receiver, amount })
            })
            .transpose()?;

        for (name, policy) in [
            ("polls.create", file.polls.create),
            ("polls.join", file.polls.join),
            ("polls.cancel", file.polls.cancel),
            ("polls.spin", file.polls.spin),
            ("polls.vote", file.polls.vote),
        ] {
            if policy.max_attempts == 0 {
                return Err(ConfigError::Invalid {
                    field: "polls",
                    reason: format!("{name} must allow at least one attempt"),
                });
            }
        }

        let gateway_url = file
            .gateway_url
            .unwrap_or_else(|| file.network.default_gateway().to_string());

        Ok(Self {
            network: file.network,
            gateway_url,
            contract,
            address_hrp: file.address_hrp,
            tokens,
            protocol_fee,
            timings: file.timings,
            polls: file.polls,
            gas: file.gas,
            refresh_interval: file.refresh_interval,
            epoch_cache_ttl: file.epoch_cache_ttl,
            request_timeout: file.request_timeout,
            spin_secret: env_secret.or(file.spin_secret),
        })
    }
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.parse().map_err(|e: crate::error::EncodingError| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}

fn resolve_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
