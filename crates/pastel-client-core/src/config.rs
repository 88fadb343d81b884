use std::time::Duration;

/// Which Pastel network a `Client` talks to. Selects both the chain-node
/// RPC port and the burn address (spec §6.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub fn rpc_port(self) -> u16 {
        match self {
            Network::Mainnet => 9932,
            Network::Testnet => 19932,
            Network::Devnet => 29932,
        }
    }

    /// The well-known burn address for this network (spec §6.3).
    pub fn burn_address(self) -> &'static str {
        match self {
            Network::Mainnet => "PtpasteLBurnAddressXXXXXXXXXXbJ5ndd",
            Network::Testnet => "tPpasteLBurnAddressXXXXXXXXXXX3wy7u",
            Network::Devnet => "44oUgmZSL997veFEQDq569wv5tsT6KXf9QY7",
        }
    }
}

/// Runtime configuration, collecting every environment variable named in
/// spec §6.5. Values are per-deployment rather than compile-time protocol
/// constants, so this is loaded at startup rather than baked in.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub network: Network,

    /// `TARGET_VALUE_PER_CREDIT_IN_USD`
    pub target_value_per_credit_usd: f64,
    /// `TARGET_PROFIT_MARGIN`
    pub target_profit_margin: f64,
    /// `MAXIMUM_LOCAL_CREDIT_PRICE_DIFFERENCE_TO_ACCEPT_CREDIT_PRICING`
    pub max_local_credit_price_difference: f64,
    /// `MAXIMUM_LOCAL_PASTEL_BLOCK_HEIGHT_DIFFERENCE_IN_BLOCKS`
    pub max_block_height_difference: u64,
    /// `MESSAGING_TIMEOUT_IN_SECONDS`
    pub messaging_timeout: Duration,
    /// `MAXIMUM_PER_CREDIT_PRICE_IN_PSL_FOR_CLIENT`
    pub max_per_credit_price_psl: f64,

    /// Allowed clock skew between local time and a message's timestamp
    /// (spec §3 invariant 3, `T_clock`, default ~600s).
    pub clock_skew_tolerance: Duration,
    /// Overall deadline for one top-level operation (spec §5, `T_op`,
    /// default 900s).
    pub operation_deadline: Duration,
}

impl ClientConfig {
    pub fn from_env(network: Network) -> Self {
        Self {
            network,
            target_value_per_credit_usd: env_f64("TARGET_VALUE_PER_CREDIT_IN_USD", 0.0001),
            target_profit_margin: env_f64("TARGET_PROFIT_MARGIN", 0.1),
            max_local_credit_price_difference: env_f64(
                "MAXIMUM_LOCAL_CREDIT_PRICE_DIFFERENCE_TO_ACCEPT_CREDIT_PRICING",
                0.15,
            ),
            max_block_height_difference: env_u64(
                "MAXIMUM_LOCAL_PASTEL_BLOCK_HEIGHT_DIFFERENCE_IN_BLOCKS",
                2,
            ),
            messaging_timeout: Duration::from_secs(env_u64("MESSAGING_TIMEOUT_IN_SECONDS", 60)),
            max_per_credit_price_psl: env_f64("MAXIMUM_PER_CREDIT_PRICE_IN_PSL_FOR_CLIENT", 150.0),
            clock_skew_tolerance: Duration::from_secs(600),
            operation_deadline: Duration::from_secs(900),
        }
    }

    /// A configuration with documented defaults and no environment
    /// access, for tests and for hosts that configure programmatically.
    pub fn with_defaults(network: Network) -> Self {
        Self {
            network,
            target_value_per_credit_usd: 0.0001,
            target_profit_margin: 0.1,
            max_local_credit_price_difference: 0.15,
            max_block_height_difference: 2,
            messaging_timeout: Duration::from_secs(60),
            max_per_credit_price_psl: 150.0,
            clock_skew_tolerance: Duration::from_secs(600),
            operation_deadline: Duration::from_secs(900),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
