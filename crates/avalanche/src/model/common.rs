//! Output and input shapes shared by the three chains.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use serac_core::{AssetId, Id32, TxId, UnixTime, UtxoKind};

/// An output together with the asset it carries and the feature extension
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferableOutput {
    pub asset_id: AssetId,
    pub fx_id: Option<Id32>,
    pub output: Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Transfer(TransferOutput),
    StakeableLock(StakeableLockOutput),
    Mint(MintOutput),
    NftTransfer(NftTransferOutput),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutput {
    pub amount: u64,
    pub locktime: UnixTime,
    pub threshold: u32,
    pub addresses: Vec<String>,
}

/// A transfer output wrapped with a stakeable lock: spendable only for
/// staking until `locktime` passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeableLockOutput {
    pub locktime: UnixTime,
    pub transfer_output: TransferOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintOutput {
    pub locktime: UnixTime,
    pub threshold: u32,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftTransferOutput {
    pub group_id: u32,
    pub payload: Vec<u8>,
    pub locktime: UnixTime,
    pub threshold: u32,
    pub addresses: Vec<String>,
}

impl Output {
    pub fn kind(&self) -> UtxoKind {
        match self {
            Output::Transfer(_) => UtxoKind::Transfer,
            Output::StakeableLock(_) => UtxoKind::StakeableLock,
            Output::Mint(_) => UtxoKind::Mint,
            Output::NftTransfer(_) => UtxoKind::NftTransfer,
        }
    }

    pub fn addresses(&self) -> &[String] {
        match self {
            Output::Transfer(x) => &x.addresses,
            Output::StakeableLock(x) => &x.transfer_output.addresses,
            Output::Mint(x) => &x.addresses,
            Output::NftTransfer(x) => &x.addresses,
        }
    }

    pub fn threshold(&self) -> u32 {
        match self {
            Output::Transfer(x) => x.threshold,
            Output::StakeableLock(x) => x.transfer_output.threshold,
            Output::Mint(x) => x.threshold,
            Output::NftTransfer(x) => x.threshold,
        }
    }

    pub fn amount(&self) -> Option<u64> {
        match self {
            Output::Transfer(x) => Some(x.amount),
            Output::StakeableLock(x) => Some(x.transfer_output.amount),
            Output::Mint(_) | Output::NftTransfer(_) => None,
        }
    }

    pub fn locktime(&self) -> UnixTime {
        match self {
            Output::Transfer(x) => x.locktime,
            Output::StakeableLock(x) => x.transfer_output.locktime,
            Output::Mint(x) => x.locktime,
            Output::NftTransfer(x) => x.locktime,
        }
    }

    pub fn stakeable_locktime(&self) -> Option<UnixTime> {
        match self {
            Output::StakeableLock(x) => Some(x.locktime),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<u32> {
        match self {
            Output::NftTransfer(x) => Some(x.group_id),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Output::NftTransfer(x) => Some(&x.payload),
            _ => None,
        }
    }
}

impl TransferableOutput {
    /// Canonical serialization of the output as stored and exposed through
    /// `utxoBytes`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // the model is plain-old-data, bincode cannot fail on it
        bincode::serialize(self).unwrap_or_default()
    }
}

/// Append the 4-byte SHA-256 tail used when exposing raw bytes.
pub fn with_checksum(bytes: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(bytes);
    let mut out = Vec::with_capacity(bytes.len() + 4);
    out.extend_from_slice(bytes);
    out.extend_from_slice(&digest[digest.len() - 4..]);
    out
}

/// A consumed reference to an earlier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferableInput {
    pub tx_id: TxId,
    pub output_index: u32,
    pub asset_id: AssetId,
    pub amount: u64,
}

impl TransferableInput {
    pub fn utxo_id(&self) -> Id32 {
        Id32::for_output(&self.tx_id, self.output_index)
    }
}

/// A raw 65-byte recoverable signature as carried by atomic tx credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignature(pub Vec<u8>);

/// A UTXO packed into a block payload (reward UTXOs) or returned by the
/// node's reward query: full coordinates plus the output itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedUtxo {
    /// The staking tx this reward belongs to
    pub staking_tx_id: TxId,
    /// The reward tx that created the output
    pub tx_id: TxId,
    pub output_index: u32,
    pub out: TransferableOutput,
}

impl PackedUtxo {
    pub fn utxo_id(&self) -> Id32 {
        Id32::for_output(&self.tx_id, self.output_index)
    }
}

/// An owner set, used by subnets and reward destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owners {
    pub addresses: Vec<String>,
    pub threshold: u32,
    pub locktime: UnixTime,
}
