//! Network identities: chain ids, the native asset, alias resolution.

use serde::{Deserialize, Serialize};

use crate::{
    ids::{AssetId, ChainId, Id32},
    ChainTag, ConfigError,
};

/// Resolved identity of the network this node indexes.
///
/// Built once at startup from [`NetworkSettings`]; everything downstream
/// (engine, API, exporter) reads chain ids from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub network_id: u32,
    pub name: String,
    pub p_chain_id: ChainId,
    pub x_chain_id: ChainId,
    pub c_chain_id: ChainId,
    pub avax_asset_id: AssetId,
    /// bech32 human-readable part for addresses (`avax`, `fuji`)
    pub hrp: String,
}

impl NetworkParams {
    pub fn chain_id(&self, tag: ChainTag) -> ChainId {
        match tag {
            ChainTag::Platform => self.p_chain_id,
            ChainTag::Exchange => self.x_chain_id,
            ChainTag::Contract => self.c_chain_id,
        }
    }

    pub fn tag_for_chain(&self, id: &ChainId) -> Option<ChainTag> {
        ChainTag::ALL.into_iter().find(|tag| self.chain_id(*tag) == *id)
    }

    /// Resolve a path segment: accepts aliases (`p-chain`, `x-chain`,
    /// `c-chain`) and full CB58 chain ids.
    pub fn resolve_chain(&self, segment: &str) -> Option<ChainTag> {
        for tag in ChainTag::ALL {
            if segment.eq_ignore_ascii_case(tag.alias()) {
                return Some(tag);
            }
        }

        let id = Id32::from_cb58(segment).ok()?;
        self.tag_for_chain(&id)
    }
}

/// Network block of the daemon configuration.
///
/// The P-chain id is the all-zero id on every network; the X/C chain ids and
/// the native asset id are per-deployment values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub name: String,
    pub network_id: u32,
    pub x_chain_id: String,
    pub c_chain_id: String,
    pub avax_asset_id: String,
    pub hrp: Option<String>,
}

impl NetworkSettings {
    pub fn resolve(&self) -> Result<NetworkParams, ConfigError> {
        let parse = |field: &str, text: &str| {
            Id32::from_cb58(text)
                .map_err(|e| ConfigError::Invalid(field.to_string(), e.to_string()))
        };

        let hrp = match self.hrp.clone() {
            Some(hrp) => hrp,
            None => match self.name.as_str() {
                "mainnet" => "avax".to_string(),
                "fuji" | "testnet" => "fuji".to_string(),
                other => {
                    return Err(ConfigError::Invalid(
                        "network.hrp".into(),
                        format!("no default hrp for network {other}"),
                    ))
                }
            },
        };

        Ok(NetworkParams {
            network_id: self.network_id,
            name: self.name.clone(),
            p_chain_id: Id32::default(),
            x_chain_id: parse("network.x_chain_id", &self.x_chain_id)?,
            c_chain_id: parse("network.c_chain_id", &self.c_chain_id)?,
            avax_asset_id: parse("network.avax_asset_id", &self.avax_asset_id)?,
            hrp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NetworkParams {
        NetworkParams {
            network_id: 1,
            name: "mainnet".into(),
            p_chain_id: Id32::default(),
            x_chain_id: Id32([1; 32]),
            c_chain_id: Id32([2; 32]),
            avax_asset_id: Id32([3; 32]),
            hrp: "avax".into(),
        }
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        let params = params();
        assert_eq!(params.resolve_chain("p-chain"), Some(ChainTag::Platform));
        assert_eq!(params.resolve_chain("X-Chain"), Some(ChainTag::Exchange));
        assert_eq!(params.resolve_chain("c-chain"), Some(ChainTag::Contract));
        assert_eq!(params.resolve_chain("q-chain"), None);
    }

    #[test]
    fn full_ids_resolve() {
        let params = params();
        let x = params.x_chain_id.to_string();
        assert_eq!(params.resolve_chain(&x), Some(ChainTag::Exchange));

        let p = params.p_chain_id.to_string();
        assert_eq!(params.resolve_chain(&p), Some(ChainTag::Platform));
    }
}
