use std::sync::Arc;

use serac_core::{
    BlockIndexer, ChainTag, Id32, NetworkParams, TxIndexer, UtxoKind, UtxoStore,
};

use crate::archive::TimestampArchive;
use crate::model::*;

use super::memstore::MemUtxoStore;
use super::{
    list_utxos, lookup, platform_balances, SortBy, SortOrder, UtxoEngine, UtxoQuery,
};

fn id(byte: u8) -> Id32 {
    Id32([byte; 32])
}

fn params() -> NetworkParams {
    NetworkParams {
        network_id: 1,
        name: "mainnet".into(),
        p_chain_id: Id32::default(),
        x_chain_id: id(0xEE),
        c_chain_id: id(0xCC),
        avax_asset_id: id(0xAA),
        hrp: "avax".into(),
    }
}

fn engine() -> UtxoEngine<MemUtxoStore> {
    UtxoEngine::new(MemUtxoStore::new(), params())
}

fn transfer_out(amount: u64, address: &str) -> TransferableOutput {
    TransferableOutput {
        asset_id: id(0xAA),
        fx_id: None,
        output: Output::Transfer(TransferOutput {
            amount,
            locktime: 0,
            threshold: 1,
            addresses: vec![address.to_string()],
        }),
    }
}

fn run_p(engine: &UtxoEngine<MemUtxoStore>, blocks: &[PBlock]) {
    BlockIndexer::<PBlock>::process_batch(engine, blocks).unwrap();
}

fn run_x(engine: &UtxoEngine<MemUtxoStore>, blocks: &[XBlock]) {
    BlockIndexer::<XBlock>::process_batch(engine, blocks).unwrap();
}

fn run_c(engine: &UtxoEngine<MemUtxoStore>, blocks: &[CBlock]) {
    BlockIndexer::<CBlock>::process_batch(engine, blocks).unwrap();
}

fn query_for(address: &str) -> UtxoQuery {
    UtxoQuery {
        addresses: vec![address.to_string()],
        ..Default::default()
    }
}

#[test]
fn simple_platform_transfer() {
    let engine = engine();

    let block = PBlock {
        height: 10,
        timestamp: 1500,
        block_id: id(0x10),
        txs: vec![PTransaction::Base {
            base: PBaseFields {
                tx_id: id(0x01),
                outs: vec![transfer_out(1_000_000, "P-avax1aaa")],
                ins: vec![],
                memo: vec![],
            },
        }],
        reward_utxos: vec![],
    };

    run_p(&engine, &[block]);

    let page = list_utxos(engine.store(), ChainTag::Platform, &query_for("P-avax1aaa"), 2000).unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.next_page_token.is_none());

    let listed = &page.items[0];
    assert_eq!(listed.utxo.tx_id, Some(id(0x01)));
    assert_eq!(listed.utxo.block_number, Some(10));
    assert_eq!(listed.utxo.block_timestamp, Some(1500));
    assert_eq!(listed.utxo.amount.as_deref(), Some("1000000"));
    assert_eq!(listed.utxo.kind, Some(UtxoKind::Transfer));
    assert_eq!(listed.utxo.created_on_chain, Some(Id32::default()));
    assert_eq!(listed.utxo.consumed_on_chain, Some(Id32::default()));

    let wm = BlockIndexer::<PBlock>::watermark(&engine).unwrap();
    assert_eq!(wm, Some(10));
}

fn stake_block() -> PBlock {
    PBlock {
        height: 100,
        timestamp: 10_000,
        block_id: id(0x64),
        txs: vec![PTransaction::Stake {
            base: PBaseFields {
                tx_id: id(0x02),
                outs: vec![],
                ins: vec![],
                memo: vec![],
            },
            kind: StakeKind::Validator,
            node_id: "NodeID-7Xhw2mDxuDS44j42TCB6U5579esbSt3Lg".into(),
            stake_outs: vec![transfer_out(5_000_000_000_000, "P-avax1stake")],
            start_time: 10_000,
            end_time: 10_500,
            reward_owner: Owners {
                addresses: vec!["P-avax1stake".into()],
                threshold: 1,
                locktime: 0,
            },
            subnet_id: None,
        }],
        reward_utxos: vec![],
    }
}

fn reward_block() -> PBlock {
    PBlock {
        height: 200,
        timestamp: 10_500,
        block_id: id(0xC8),
        txs: vec![PTransaction::RewardValidator {
            tx_id: id(0x03),
            staking_tx_id: id(0x02),
        }],
        reward_utxos: vec![PackedUtxo {
            staking_tx_id: id(0x02),
            tx_id: id(0x03),
            output_index: 0,
            out: transfer_out(250_000_000, "P-avax1stake"),
        }],
    }
}

#[test]
fn stake_is_listed_while_active_and_hidden_after_end() {
    let engine = engine();
    run_p(&engine, &[stake_block(), reward_block()]);

    // active stake: listed despite includeSpent=false
    let active = list_utxos(engine.store(), ChainTag::Platform, &query_for("P-avax1stake"), 10_400)
        .unwrap();
    let stake = active
        .items
        .iter()
        .find(|u| u.utxo.staked == Some(true))
        .expect("stake utxo listed while active");
    assert!(stake.spend.is_none());
    assert_eq!(stake.utxo.stake_start, Some(10_000));
    assert_eq!(stake.utxo.stake_end, Some(10_500));

    // ended stake: gone from the unspent listing, reward remains
    let ended = list_utxos(engine.store(), ChainTag::Platform, &query_for("P-avax1stake"), 10_600)
        .unwrap();
    assert!(ended.items.iter().all(|u| u.utxo.staked != Some(true)));
    assert!(ended
        .items
        .iter()
        .any(|u| u.utxo.is_reward == Some(true) && u.utxo.amount.as_deref() == Some("250000000")));
}

#[test]
fn stake_and_reward_balances() {
    let engine = engine();
    run_p(&engine, &[stake_block(), reward_block()]);

    let params = params();

    let mid = platform_balances(engine.store(), &params, &["P-avax1stake".into()], 10_400, true)
        .unwrap();
    let staked: Vec<_> = mid.locked_staked.0.values().cloned().collect();
    assert_eq!(staked, vec![5_000_000_000_000u64.into()]);
    assert!(mid.unlocked_unstaked.is_empty());

    let after = platform_balances(engine.store(), &params, &["P-avax1stake".into()], 10_600, true)
        .unwrap();
    let liquid = after.unlocked_unstaked.0.get(&id(0xAA)).cloned().unwrap();
    assert_eq!(liquid, (5_000_000_000_000u64 + 250_000_000).into());
    assert!(after.locked_staked.is_empty());
}

fn c_export_block() -> CBlock {
    CBlock {
        height: 48_746_327,
        hash: "0xc0".into(),
        parent_hash: "0xbf".into(),
        timestamp: 1_765_267_096,
        size: 500,
        tx_count: 1,
        extra_data_hash: "0xed".into(),
        atomic_txs: vec![CAtomicTx::Export {
            tx_id: id(0x40),
            unsigned_bytes: vec![9, 9, 9],
            destination_chain: Id32::default(),
            inputs: vec![EvmInput {
                address: "0xabcdef".into(),
                amount: 7_000_000,
                asset_id: id(0xAA),
                nonce: 1,
            }],
            exported_outs: vec![transfer_out(7_000_000, "P-avax1xfer")],
            credentials: vec![],
        }],
    }
}

fn p_import_block() -> PBlock {
    PBlock {
        height: 250_286,
        timestamp: 1_765_267_108,
        block_id: id(0x51),
        txs: vec![PTransaction::Import {
            base: PBaseFields {
                tx_id: id(0x41),
                outs: vec![transfer_out(6_990_000, "P-avax1xfer")],
                ins: vec![],
                memo: vec![],
            },
            source_chain: id(0xCC),
            imported_ins: vec![TransferableInput {
                tx_id: id(0x40),
                output_index: 0,
                asset_id: id(0xAA),
                amount: 7_000_000,
            }],
        }],
        reward_utxos: vec![],
    }
}

#[test]
fn atomic_transfer_is_order_independent() {
    let exported_id = Id32::for_output(&id(0x40), 0);

    let forward = engine();
    run_c(&forward, &[c_export_block()]);
    run_p(&forward, &[p_import_block()]);

    let reverse = engine();
    run_p(&reverse, &[p_import_block()]);
    run_c(&reverse, &[c_export_block()]);

    for eng in [&forward, &reverse] {
        for chain in [ChainTag::Platform, ChainTag::Contract] {
            let (utxo, spend) = lookup(eng.store(), chain, &exported_id).unwrap().unwrap();

            // creation truth comes from the C-chain block on both partitions
            assert_eq!(utxo.block_number, Some(48_746_327), "chain {chain}");
            assert_eq!(utxo.block_timestamp, Some(1_765_267_096));
            assert_eq!(utxo.created_on_chain, Some(id(0xCC)));
            assert_eq!(utxo.consumed_on_chain, Some(Id32::default()));
            assert!(utxo.has_creation_data());

            // consumption truth comes from the P-chain block
            let spend = spend.expect("spend info present");
            assert_eq!(spend.consuming_block_number, 250_286);
            assert_eq!(spend.consuming_time, 1_765_267_108);
            assert_eq!(spend.consumed_on_chain, Id32::default());
        }
    }

    let f = lookup(forward.store(), ChainTag::Platform, &exported_id).unwrap();
    let r = lookup(reverse.store(), ChainTag::Platform, &exported_id).unwrap();
    assert_eq!(f.map(|(u, _)| u), r.map(|(u, _)| u));
}

#[test]
fn import_alone_leaves_fallback_coords() {
    let engine = engine();
    run_p(&engine, &[p_import_block()]);

    let exported_id = Id32::for_output(&id(0x40), 0);
    let (utxo, spend) = lookup(engine.store(), ChainTag::Platform, &exported_id)
        .unwrap()
        .unwrap();

    assert_eq!(utxo.block_number, Some(250_286));
    assert!(!utxo.has_creation_data());
    assert!(spend.is_some());
}

#[test]
fn reingesting_a_block_is_idempotent() {
    let engine = engine();
    run_p(&engine, &[stake_block()]);

    let stake_id = Id32::for_output(&id(0x02), 0);
    let first = lookup(engine.store(), ChainTag::Platform, &stake_id).unwrap();

    run_p(&engine, &[stake_block()]);
    let second = lookup(engine.store(), ChainTag::Platform, &stake_id).unwrap();

    assert_eq!(first.map(|(u, _)| u), second.map(|(u, _)| u));
}

#[test]
fn create_asset_output_offsets() {
    let engine = engine();

    let minted = |amount| {
        Output::Transfer(TransferOutput {
            amount,
            locktime: 0,
            threshold: 1,
            addresses: vec!["X-avax1mint".into()],
        })
    };

    let block = XBlock {
        height: 7,
        timestamp: 900,
        block_id: id(0x70),
        txs: vec![XTransaction::CreateAsset {
            base: XBaseFields {
                tx_id: id(0x05),
                outs: vec![
                    transfer_out(11, "X-avax1base"),
                    transfer_out(22, "X-avax1base"),
                ],
                ins: vec![],
                memo: vec![],
            },
            name: "Example Token".into(),
            symbol: "EXT".into(),
            denomination: 9,
            states: vec![InitialState {
                fx_id: None,
                outs: vec![minted(33), minted(44)],
            }],
        }],
    };

    run_x(&engine, &[block]);

    // base outs at 0 and 1, state outs continue at 2 and 3
    for (index, amount, asset) in [
        (0u32, "11", id(0xAA)),
        (1, "22", id(0xAA)),
        (2, "33", id(0x05)),
        (3, "44", id(0x05)),
    ] {
        let utxo_id = Id32::for_output(&id(0x05), index);
        let (utxo, _) = lookup(engine.store(), ChainTag::Exchange, &utxo_id)
            .unwrap()
            .unwrap_or_else(|| panic!("missing output {index}"));
        assert_eq!(utxo.amount.as_deref(), Some(amount));
        assert_eq!(utxo.asset_id, Some(asset));
        assert_eq!(utxo.output_index, Some(index));
    }

    let asset = engine.store().get_asset(&id(0x05)).unwrap().unwrap();
    assert_eq!(asset.symbol, "EXT");
    assert_eq!(asset.denomination, 9);
}

#[test]
fn pre_cortina_timestamp_comes_from_the_archive() {
    let tx_id = id(0x66);
    let raw = TimestampArchive::build(&[(tx_id.0, 1_634_055_385)]).unwrap();
    let archive = TimestampArchive::parse(&raw).unwrap();

    let engine = engine().with_archive(Arc::new(archive));

    let record = XTxRecord {
        index: 100_200,
        tx: XTransaction::Base {
            base: XBaseFields {
                tx_id,
                outs: vec![transfer_out(123, "X-avax1old")],
                ins: vec![],
                memo: vec![],
            },
        },
    };

    TxIndexer::<XTxRecord>::process_tx_batch(&engine, &[record]).unwrap();

    let utxo_id = Id32::for_output(&tx_id, 0);
    let (utxo, _) = lookup(engine.store(), ChainTag::Exchange, &utxo_id)
        .unwrap()
        .unwrap();

    assert_eq!(utxo.block_timestamp, Some(1_634_055_385));
    assert_eq!(utxo.block_number, None);

    let wm = TxIndexer::<XTxRecord>::tx_watermark(&engine).unwrap();
    assert_eq!(wm, Some(100_200));
}

#[test]
fn pre_cortina_without_archive_entry_is_fatal() {
    let raw = TimestampArchive::build(&[(id(0x01).0, 1)]).unwrap();
    let engine = engine().with_archive(Arc::new(TimestampArchive::parse(&raw).unwrap()));

    let record = XTxRecord {
        index: 5,
        tx: XTransaction::Base {
            base: XBaseFields {
                tx_id: id(0x99),
                outs: vec![],
                ins: vec![],
                memo: vec![],
            },
        },
    };

    let err = TxIndexer::<XTxRecord>::process_tx_batch(&engine, &[record]).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn spending_own_batch_output_sees_pending_record() {
    let engine = engine();

    // tx B consumes tx A's output inside the same block batch
    let a = PTransaction::Base {
        base: PBaseFields {
            tx_id: id(0x0A),
            outs: vec![transfer_out(500, "P-avax1chain")],
            ins: vec![],
            memo: vec![],
        },
    };
    let b = PTransaction::Base {
        base: PBaseFields {
            tx_id: id(0x0B),
            outs: vec![transfer_out(400, "P-avax1chain")],
            ins: vec![TransferableInput {
                tx_id: id(0x0A),
                output_index: 0,
                asset_id: id(0xAA),
                amount: 500,
            }],
            memo: vec![],
        },
    };

    run_p(
        &engine,
        &[PBlock {
            height: 3,
            timestamp: 30,
            block_id: id(0x30),
            txs: vec![a, b],
            reward_utxos: vec![],
        }],
    );

    let spent_id = Id32::for_output(&id(0x0A), 0);
    let (utxo, spend) = lookup(engine.store(), ChainTag::Platform, &spent_id)
        .unwrap()
        .unwrap();

    // the creation fields survived the same-batch consumption upsert
    assert_eq!(utxo.amount.as_deref(), Some("500"));
    assert_eq!(utxo.block_number, Some(3));
    assert_eq!(spend.unwrap().consuming_tx, id(0x0B));
}

#[test]
fn listing_sorts_descending_with_id_tiebreak() {
    let engine = engine();

    let mk = |tx: u8, ts: u64, height: u64| PBlock {
        height,
        timestamp: ts,
        block_id: id(tx ^ 0x80),
        txs: vec![PTransaction::Base {
            base: PBaseFields {
                tx_id: id(tx),
                outs: vec![transfer_out(100 + tx as u64, "P-avax1sort")],
                ins: vec![],
                memo: vec![],
            },
        }],
        reward_utxos: vec![],
    };

    run_p(&engine, &[mk(1, 100, 1), mk(2, 300, 2), mk(3, 300, 3)]);

    let query = UtxoQuery {
        addresses: vec!["P-avax1sort".into()],
        sort_by: SortBy::Timestamp,
        sort_order: SortOrder::Desc,
        ..Default::default()
    };

    let page = list_utxos(engine.store(), ChainTag::Platform, &query, 1_000).unwrap();
    let stamps: Vec<_> = page.items.iter().map(|u| u.utxo.block_timestamp.unwrap()).collect();
    assert_eq!(stamps, vec![300, 300, 100]);

    // equal timestamps tie-break on utxo id, same direction as the sort
    let first = page.items[0].utxo.utxo_id;
    let second = page.items[1].utxo.utxo_id;
    assert!(first > second);
}

#[test]
fn historical_listing_uses_strict_bounds() {
    let engine = engine();

    // created at 1500, consumed at 1600
    let created = PBlock {
        height: 1,
        timestamp: 1500,
        block_id: id(0x21),
        txs: vec![PTransaction::Base {
            base: PBaseFields {
                tx_id: id(0x20),
                outs: vec![transfer_out(77, "P-avax1hist")],
                ins: vec![],
                memo: vec![],
            },
        }],
        reward_utxos: vec![],
    };
    let consumed = PBlock {
        height: 2,
        timestamp: 1600,
        block_id: id(0x23),
        txs: vec![PTransaction::Base {
            base: PBaseFields {
                tx_id: id(0x22),
                outs: vec![],
                ins: vec![TransferableInput {
                    tx_id: id(0x20),
                    output_index: 0,
                    asset_id: id(0xAA),
                    amount: 77,
                }],
                memo: vec![],
            },
        }],
        reward_utxos: vec![],
    };

    run_p(&engine, &[created, consumed]);

    let at = |t: u64| UtxoQuery {
        addresses: vec!["P-avax1hist".into()],
        block_timestamp: Some(t),
        ..Default::default()
    };

    let listed = |t: u64| {
        list_utxos(engine.store(), ChainTag::Platform, &at(t), 10_000)
            .unwrap()
            .items
            .len()
    };

    // created at exactly T is excluded; consumed at exactly T is excluded
    assert_eq!(listed(1500), 0);
    assert_eq!(listed(1501), 1);
    assert_eq!(listed(1600), 0);
    assert_eq!(listed(1700), 0);
}

#[test]
fn pagination_walks_the_full_set() {
    let engine = engine();

    let blocks: Vec<_> = (1..=5u8)
        .map(|i| PBlock {
            height: i as u64,
            timestamp: i as u64 * 10,
            block_id: id(i ^ 0x40),
            txs: vec![PTransaction::Base {
                base: PBaseFields {
                    tx_id: id(i),
                    outs: vec![transfer_out(i as u64, "P-avax1page")],
                    ins: vec![],
                    memo: vec![],
                },
            }],
            reward_utxos: vec![],
        })
        .collect();

    run_p(&engine, &blocks);

    let mut query = UtxoQuery {
        addresses: vec!["P-avax1page".into()],
        page_size: 2,
        ..Default::default()
    };

    let mut seen = 0;
    let mut pages = 0;

    loop {
        let page = list_utxos(engine.store(), ChainTag::Platform, &query, 1_000).unwrap();
        seen += page.items.len();
        pages += 1;

        match page.next_page_token {
            Some(token) => query.page_token = Some(token),
            None => break,
        }
    }

    assert_eq!(seen, 5);
    assert_eq!(pages, 3);
}
