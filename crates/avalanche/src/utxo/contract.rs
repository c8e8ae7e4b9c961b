//! C-chain atomic transaction handling.
//!
//! Only the shared-memory side of the chain is indexed: exported outputs
//! become UTXO records on the destination partition (and C's own), imported
//! inputs get cross-chain spend marks. EVM account movements are out of
//! scope.

use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};
use serac_core::{ChainTag, Credential, IndexError, SpendInfo, UtxoBatch, UtxoStore};
use sha2::{Digest, Sha256};

use crate::model::{CAtomicTx, CBlock, RawSignature};

use super::{
    creation_update, credential_list, foreign_partition, import_creation_fill, utxo_id_of,
    write_creation, write_consumption, BlockCoords, UtxoEngine,
};

pub(super) fn apply_block<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    block: &CBlock,
) -> Result<(), IndexError> {
    let coords = BlockCoords {
        block_number: Some(block.height),
        timestamp: block.timestamp,
    };

    for tx in &block.atomic_txs {
        match tx {
            CAtomicTx::Export {
                tx_id,
                unsigned_bytes,
                destination_chain,
                inputs: _,
                exported_outs,
                credentials,
            } => {
                let c_id = engine.params.c_chain_id;
                let destination =
                    foreign_partition(&engine.params, destination_chain, "c-chain export");

                let recovered = credential_list(unsigned_bytes, credentials);

                for (i, out) in exported_outs.iter().enumerate() {
                    let index = i as u32;
                    let id = utxo_id_of(tx_id, index);

                    let mut update =
                        creation_update(out, tx_id, index, c_id, *destination_chain, coords);
                    update.credentials = recovered.clone();

                    write_creation(batch, ChainTag::Contract, &id, update.clone())?;

                    if let Some(destination) = destination {
                        write_creation(batch, destination, &id, update)?;
                    }
                }
            }

            CAtomicTx::Import {
                tx_id,
                unsigned_bytes,
                source_chain,
                imported_ins,
                evm_outputs: _,
                credentials,
            } => {
                let info = SpendInfo {
                    consuming_tx: *tx_id,
                    consuming_time: block.timestamp,
                    consuming_block_number: block.height,
                    consumed_on_chain: engine.params.c_chain_id,
                    credentials: credential_list(unsigned_bytes, credentials),
                };

                let source = foreign_partition(&engine.params, source_chain, "c-chain import");

                for input in imported_ins {
                    let mut partitions = vec![ChainTag::Contract];
                    partitions.extend(source);

                    write_consumption(batch, &partitions, input, &info)?;
                    import_creation_fill(batch, engine, &partitions, source_chain, input, coords)?;
                }
            }
        }
    }

    Ok(())
}

/// Recover the signing public keys from 65-byte `r ‖ s ‖ v` signatures over
/// SHA-256 of the unsigned tx bytes. Recovery failure leaves the key empty;
/// the signature itself is always kept.
pub(crate) fn recover_credentials(unsigned: &[u8], sigs: &[RawSignature]) -> Vec<Credential> {
    let digest = Sha256::digest(unsigned);
    let secp = Secp256k1::verification_only();

    sigs.iter()
        .map(|sig| {
            let public_key = recover_one(&secp, &digest, &sig.0);

            Credential {
                signature: sig.0.clone(),
                public_key,
            }
        })
        .collect()
}

fn recover_one(
    secp: &Secp256k1<secp256k1::VerifyOnly>,
    digest: &[u8],
    sig: &[u8],
) -> Option<Vec<u8>> {
    if sig.len() != 65 {
        return None;
    }

    let recovery_id = RecoveryId::from_i32(sig[64] as i32).ok()?;
    let signature = RecoverableSignature::from_compact(&sig[..64], recovery_id).ok()?;
    let message = Message::from_slice(digest).ok()?;

    secp.recover_ecdsa(&message, &signature)
        .ok()
        .map(|key| key.serialize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    #[test]
    fn recovery_roundtrip() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public = secret.public_key(&secp);

        let unsigned = b"unsigned atomic tx bytes";
        let digest = Sha256::digest(unsigned);
        let message = Message::from_slice(&digest).unwrap();

        let signature = secp.sign_ecdsa_recoverable(&message, &secret);
        let (rec_id, compact) = signature.serialize_compact();

        let mut raw = compact.to_vec();
        raw.push(rec_id.to_i32() as u8);

        let creds = recover_credentials(unsigned, &[RawSignature(raw.clone())]);

        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].signature, raw);
        assert_eq!(
            creds[0].public_key.as_deref(),
            Some(public.serialize().as_slice())
        );
    }

    #[test]
    fn malformed_signature_keeps_bytes_without_key() {
        let creds = recover_credentials(b"data", &[RawSignature(vec![1, 2, 3])]);
        assert_eq!(creds.len(), 1);
        assert!(creds[0].public_key.is_none());
    }
}
