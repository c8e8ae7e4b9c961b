//! End-to-end: payloads land in the block store, the runner drains them
//! through the UTXO engine, the query layer serves the result.

use std::sync::Arc;
use std::time::Duration;

use serac::sync::PlatformRunner;
use serac_avalanche::codec::encode_p_payload;
use serac_avalanche::model::PBlock;
use serac_avalanche::utxo::{list_utxos, platform_balances, UtxoEngine, UtxoQuery};
use serac_core::{BlockIndexer, BlockStore as _, ChainTag, StageWatermark, UtxoStore as _};
use serac_testing::{avax_out, input_for, p_transfer_block, test_id, test_params, TempStores};
use tokio_util::sync::CancellationToken;

fn store_blocks(stores: &TempStores, blocks: &[PBlock]) {
    let encoded: Vec<_> = blocks
        .iter()
        .map(|b| (b.height, encode_p_payload(b).unwrap()))
        .collect();

    let last = blocks.last().unwrap().height;
    stores.p_blocks.put_batch(&encoded, last).unwrap();
}

#[tokio::test]
async fn runner_drains_the_store_into_the_engine() {
    let stores = TempStores::open();
    let engine = Arc::new(UtxoEngine::new(stores.utxos.clone(), test_params()));

    let blocks = vec![
        p_transfer_block(
            0,
            1400,
            test_id(1),
            vec![avax_out(1_000_000, "P-avax1alpha")],
            vec![],
        ),
        // block 1 spends block 0's output
        p_transfer_block(
            1,
            1450,
            test_id(2),
            vec![avax_out(900_000, "P-avax1beta")],
            vec![input_for(test_id(1), 0, 1_000_000)],
        ),
        p_transfer_block(
            2,
            1500,
            test_id(3),
            vec![avax_out(50_000, "P-avax1alpha")],
            vec![],
        ),
    ];

    store_blocks(&stores, &blocks);

    let cancel = CancellationToken::new();

    let runner = PlatformRunner::new(stores.p_blocks.clone(), vec![engine.clone() as _], 10);
    let handle = tokio::spawn(runner.run(cancel.clone()));

    // the runner commits the watermark with the batch it consumed
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if stores.utxos.watermark(StageWatermark::Platform).unwrap() == Some(2) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "runner stalled");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let query = UtxoQuery {
        addresses: vec!["P-avax1alpha".into(), "P-avax1beta".into()],
        ..Default::default()
    };

    let page = list_utxos(&stores.utxos, ChainTag::Platform, &query, 2_000).unwrap();

    // alpha's first output was spent by block 1; two unspent remain
    let mut amounts: Vec<_> = page
        .items
        .iter()
        .map(|u| u.utxo.amount.clone().unwrap())
        .collect();
    amounts.sort();
    assert_eq!(amounts, vec!["50000", "900000"]);

    let balances = platform_balances(
        &stores.utxos,
        &test_params(),
        &["P-avax1alpha".into(), "P-avax1beta".into()],
        2_000,
        false,
    )
    .unwrap();

    let total = balances
        .unlocked_unstaked
        .0
        .get(&test_id(0xAA))
        .cloned()
        .unwrap();
    assert_eq!(total, 950_000u64.into());
}

#[tokio::test]
async fn reprocessing_the_same_payloads_is_idempotent() {
    let stores = TempStores::open();
    let engine = UtxoEngine::new(stores.utxos.clone(), test_params());

    let block = p_transfer_block(
        0,
        1400,
        test_id(7),
        vec![avax_out(123, "P-avax1dup")],
        vec![],
    );

    BlockIndexer::<PBlock>::process_batch(&engine, std::slice::from_ref(&block)).unwrap();
    let first = list_utxos(
        &stores.utxos,
        ChainTag::Platform,
        &UtxoQuery {
            addresses: vec!["P-avax1dup".into()],
            ..Default::default()
        },
        2_000,
    )
    .unwrap();

    BlockIndexer::<PBlock>::process_batch(&engine, std::slice::from_ref(&block)).unwrap();
    let second = list_utxos(
        &stores.utxos,
        ChainTag::Platform,
        &UtxoQuery {
            addresses: vec!["P-avax1dup".into()],
            ..Default::default()
        },
        2_000,
    )
    .unwrap();

    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].utxo, second.items[0].utxo);
}
