//! Underlying platform identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform identifier: {0}")]
pub struct UnknownPlatform(pub String);

/// Protocol a vault deposits into. Decides which breakdown formula applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    Aave,
    BalancerAura,
    Curve,
    Gamma,
    IchiLynex,
    Lynex,
    MendiLending,
    MendiLeverage,
    Nile,
    PendleEquilibria,
    Solidly,
    BeefyClm,
    BeefyClmVault,
    /// Only the share token is tracked; the breakdown is intentionally empty.
    TrackOnlyShareTokenBalance,
    /// Share token plus the underlying token, without decomposition.
    TrackOnlyShareAndUnderlyingTokenBalance,
}

impl Platform {
    pub const ALL: [Platform; 15] = [
        Platform::Aave,
        Platform::BalancerAura,
        Platform::Curve,
        Platform::Gamma,
        Platform::IchiLynex,
        Platform::Lynex,
        Platform::MendiLending,
        Platform::MendiLeverage,
        Platform::Nile,
        Platform::PendleEquilibria,
        Platform::Solidly,
        Platform::BeefyClm,
        Platform::BeefyClmVault,
        Platform::TrackOnlyShareTokenBalance,
        Platform::TrackOnlyShareAndUnderlyingTokenBalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Aave => "AAVE",
            Platform::BalancerAura => "BALANCER_AURA",
            Platform::Curve => "CURVE",
            Platform::Gamma => "GAMMA",
            Platform::IchiLynex => "ICHI_LYNEX",
            Platform::Lynex => "LYNEX",
            Platform::MendiLending => "MENDI_LENDING",
            Platform::MendiLeverage => "MENDI_LEVERAGE",
            Platform::Nile => "NILE",
            Platform::PendleEquilibria => "PENDLE_EQUILIBRIA",
            Platform::Solidly => "SOLIDLY",
            Platform::BeefyClm => "BEEFY_CLM",
            Platform::BeefyClmVault => "BEEFY_CLM_VAULT",
            Platform::TrackOnlyShareTokenBalance => "TRACK_ONLY_SHARE_TOKEN_BALANCE",
            Platform::TrackOnlyShareAndUnderlyingTokenBalance => {
                "TRACK_ONLY_SHARE_AND_UNDERLYING_TOKEN_BALANCE"
            }
        }
    }

    /// CLM platforms stake into reward pools; the others into boosts.
    pub fn uses_reward_pools(&self) -> bool {
        matches!(self, Platform::BeefyClm | Platform::BeefyClmVault)
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

impl TryFrom<String> for Platform {
    type Error = UnknownPlatform;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
