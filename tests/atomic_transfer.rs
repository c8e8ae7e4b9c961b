//! The cross-chain scenario end to end: a C-chain export and a P-chain
//! import meet in the UTXO store regardless of which side indexes first,
//! and the response shaping reports C-chain creation coords with P-chain
//! consumption coords.

use serac_avalanche::model::{CBlock, PBlock};
use serac_avalanche::utxo::{ListedUtxo, UtxoEngine};
use serac_core::{BlockIndexer, ChainTag, Id32, UtxoStore as _};
use serac_testing::{avax_out, c_export_block, input_for, p_import_block, test_id, test_params, TempStores};

const EXPORT_HEIGHT: u64 = 48_746_327;
const EXPORT_TS: u64 = 1_765_267_096;
const IMPORT_HEIGHT: u64 = 250_286;
const IMPORT_TS: u64 = 1_765_267_108;

fn export_block() -> CBlock {
    c_export_block(
        EXPORT_HEIGHT,
        EXPORT_TS,
        test_id(0x40),
        Id32::default(),
        vec![avax_out(7_000_000, "P-avax1xfer")],
    )
}

fn import_block() -> PBlock {
    p_import_block(
        IMPORT_HEIGHT,
        IMPORT_TS,
        test_id(0x41),
        test_id(0xCC),
        vec![input_for(test_id(0x40), 0, 7_000_000)],
        vec![avax_out(6_990_000, "P-avax1xfer")],
    )
}

fn run_order(c_first: bool) -> (TempStores, Id32) {
    let stores = TempStores::open();
    let engine = UtxoEngine::new(stores.utxos.clone(), test_params());

    if c_first {
        BlockIndexer::<CBlock>::process_batch(&engine, &[export_block()]).unwrap();
        BlockIndexer::<PBlock>::process_batch(&engine, &[import_block()]).unwrap();
    } else {
        BlockIndexer::<PBlock>::process_batch(&engine, &[import_block()]).unwrap();
        BlockIndexer::<CBlock>::process_batch(&engine, &[export_block()]).unwrap();
    }

    (stores, Id32::for_output(&test_id(0x40), 0))
}

#[test]
fn both_partitions_converge_in_either_order() {
    for c_first in [true, false] {
        let (stores, utxo_id) = run_order(c_first);

        for chain in [ChainTag::Contract, ChainTag::Platform] {
            let utxo = stores.utxos.get_utxo(chain, &utxo_id).unwrap().unwrap();
            let spend = stores.utxos.get_spend(chain, &utxo_id).unwrap().unwrap();

            assert_eq!(utxo.block_number, Some(EXPORT_HEIGHT), "order c_first={c_first}");
            assert_eq!(utxo.block_timestamp, Some(EXPORT_TS));
            assert_eq!(utxo.created_on_chain, Some(test_id(0xCC)));
            assert_eq!(utxo.consumed_on_chain, Some(Id32::default()));

            assert_eq!(spend.consuming_block_number, IMPORT_HEIGHT);
            assert_eq!(spend.consuming_time, IMPORT_TS);
        }

        // the record lives in exactly the two partitions of its lifetime
        assert!(stores
            .utxos
            .get_utxo(ChainTag::Exchange, &utxo_id)
            .unwrap()
            .is_none());
    }
}

#[test]
fn response_shape_reports_both_chains_without_platform_locktime() {
    let (stores, utxo_id) = run_order(true);

    let utxo = stores
        .utxos
        .get_utxo(ChainTag::Platform, &utxo_id)
        .unwrap()
        .unwrap();
    let spend = stores.utxos.get_spend(ChainTag::Platform, &utxo_id).unwrap();

    let listed = ListedUtxo { utxo, spend };
    let value = serac_api::mapping::shape_utxo(&listed, ChainTag::Platform);

    assert_eq!(value["blockNumber"], EXPORT_HEIGHT.to_string());
    assert_eq!(value["blockTimestamp"], EXPORT_TS);
    assert_eq!(value["consumingBlockNumber"], IMPORT_HEIGHT.to_string());
    assert_eq!(value["consumingBlockTimestamp"], IMPORT_TS);
    assert_eq!(value["createdOnChainId"], test_id(0xCC).to_string());
    assert_eq!(value["consumedOnChainId"], Id32::default().to_string());

    // cross-chain records never expose a platform locktime
    assert!(value.get("platformLocktime").is_none());
}
