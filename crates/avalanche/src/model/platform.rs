//! P-chain blocks and transactions.

use serde::{Deserialize, Serialize};

use serac_core::{BlockHeight, ChainId, Id32, TxId, UnixTime};

use super::{Owners, PackedUtxo, TransferableInput, TransferableOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PBlock {
    pub height: BlockHeight,
    pub timestamp: UnixTime,
    pub block_id: Id32,
    pub txs: Vec<PTransaction>,
    /// Reward UTXOs packed into the block payload by the fetcher, present
    /// only when the block carries reward txs.
    #[serde(skip)]
    pub reward_utxos: Vec<PackedUtxo>,
}

/// Fields common to every value-moving P-chain tx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PBaseFields {
    pub tx_id: TxId,
    pub outs: Vec<TransferableOutput>,
    pub ins: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeKind {
    Validator,
    PermissionlessValidator,
    Delegator,
    PermissionlessDelegator,
}

impl StakeKind {
    pub fn is_validator(&self) -> bool {
        matches!(self, StakeKind::Validator | StakeKind::PermissionlessValidator)
    }
}

/// The subnet-management family. All of these move only base outs/ins from
/// the UTXO engine's point of view; the subnet indexers consume the details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubnetAction {
    AddSubnetValidator {
        subnet_id: Id32,
        node_id: String,
        start_time: UnixTime,
        end_time: UnixTime,
        weight: u64,
    },
    RemoveSubnetValidator {
        subnet_id: Id32,
        node_id: String,
    },
    TransformSubnet {
        subnet_id: Id32,
    },
    TransferSubnetOwnership {
        subnet_id: Id32,
        owners: Owners,
    },
    ConvertSubnetToL1 {
        subnet_id: Id32,
        manager_chain_id: ChainId,
        manager_address: Vec<u8>,
    },
    RegisterSubnetValidator {
        subnet_id: Id32,
        node_id: String,
        weight: u64,
        balance: u64,
    },
    SetL1ValidatorWeight {
        validation_id: Id32,
        weight: u64,
    },
    DisableL1Validator {
        validation_id: Id32,
    },
    IncreaseL1ValidatorBalance {
        validation_id: Id32,
        balance: u64,
    },
}

impl SubnetAction {
    pub fn subnet_id(&self) -> Option<Id32> {
        match self {
            SubnetAction::AddSubnetValidator { subnet_id, .. }
            | SubnetAction::RemoveSubnetValidator { subnet_id, .. }
            | SubnetAction::TransformSubnet { subnet_id }
            | SubnetAction::TransferSubnetOwnership { subnet_id, .. }
            | SubnetAction::ConvertSubnetToL1 { subnet_id, .. }
            | SubnetAction::RegisterSubnetValidator { subnet_id, .. } => Some(*subnet_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PTransaction {
    Base {
        base: PBaseFields,
    },
    Stake {
        base: PBaseFields,
        kind: StakeKind,
        node_id: String,
        /// Indexed offset by `|outs|`
        stake_outs: Vec<TransferableOutput>,
        start_time: UnixTime,
        end_time: UnixTime,
        reward_owner: Owners,
        /// Primary network when absent
        subnet_id: Option<Id32>,
    },
    SubnetAction {
        base: PBaseFields,
        action: SubnetAction,
    },
    CreateSubnet {
        base: PBaseFields,
        owners: Owners,
    },
    CreateChain {
        base: PBaseFields,
        subnet_id: Id32,
        name: String,
        vm_id: Id32,
    },
    Import {
        base: PBaseFields,
        source_chain: ChainId,
        imported_ins: Vec<TransferableInput>,
    },
    Export {
        base: PBaseFields,
        destination_chain: ChainId,
        exported_outs: Vec<TransferableOutput>,
    },
    RewardValidator {
        tx_id: TxId,
        staking_tx_id: TxId,
    },
}

impl PTransaction {
    pub fn base(&self) -> Option<&PBaseFields> {
        match self {
            PTransaction::Base { base }
            | PTransaction::Stake { base, .. }
            | PTransaction::SubnetAction { base, .. }
            | PTransaction::CreateSubnet { base, .. }
            | PTransaction::CreateChain { base, .. }
            | PTransaction::Import { base, .. }
            | PTransaction::Export { base, .. } => Some(base),
            PTransaction::RewardValidator { .. } => None,
        }
    }

    pub fn tx_id(&self) -> TxId {
        match self {
            PTransaction::RewardValidator { tx_id, .. } => *tx_id,
            other => other.base().map(|b| b.tx_id).unwrap_or_default(),
        }
    }
}
