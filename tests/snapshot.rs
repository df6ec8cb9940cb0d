use equality::{
    ChainConfig, EngineError, Header, HeaderExtra, MemoryState, Snapshot, SortableAddress,
    StateDb, TrieDb,
};
use ethereum_types::{H256, U256};

fn addr(byte: u8) -> equality::Address {
    equality::Address::repeat_byte(byte)
}

#[test]
fn apply_first_epoch_block() {
    let db = TrieDb::memory();
    let mut snap = Snapshot::new_empty(&db);
    let config = ChainConfig::default();

    let v1 = addr(0x11);
    let v2 = addr(0x22);
    let v3 = addr(0x33);

    let header = Header {
        number: 1,
        time: 1_625_976_000,
        coinbase: v1,
        ..Header::default()
    };
    let extra = HeaderExtra {
        epoch: 1,
        epoch_block: 1,
        current_block_candidates: vec![v1, v2, v3],
        current_epoch_validators: vec![v1, v2, v3],
        ..HeaderExtra::default()
    };

    snap.apply(&config, &header, &extra).expect("apply");

    let mut candidates = snap.candidates().expect("candidates");
    candidates.sort();
    assert_eq!(candidates, vec![v1, v2, v3]);
    assert_eq!(snap.validators().expect("validators"), vec![v1, v2, v3]);

    let minted = snap.count_minted(1).expect("count minted");
    assert_eq!(minted[0], SortableAddress::new(v1, U256::one()));
    assert_eq!(minted[1], SortableAddress::new(v2, U256::zero()));
    assert_eq!(minted[2], SortableAddress::new(v3, U256::zero()));
}

#[test]
fn apply_is_reproducible_from_committed_root() {
    let db = TrieDb::memory();
    let config = ChainConfig::default();

    let v1 = addr(0x11);
    let v2 = addr(0x22);

    let header = Header {
        number: 1,
        coinbase: v1,
        ..Header::default()
    };
    let extra = HeaderExtra {
        epoch: 1,
        epoch_block: 1,
        current_block_candidates: vec![v1, v2],
        current_epoch_validators: vec![v1, v2],
        ..HeaderExtra::default()
    };

    let mut snap = Snapshot::new_empty(&db);
    snap.apply(&config, &header, &extra).expect("apply");
    let root = snap.root().expect("root");
    snap.commit(root).expect("commit");

    // A second replay over a fresh snapshot lands on the same root.
    let mut replay = Snapshot::new_empty(&db);
    replay.apply(&config, &header, &extra).expect("replay");
    assert_eq!(replay.root().expect("root"), root);

    // And the committed root is loadable with all tables intact.
    let mut reloaded = Snapshot::load(&db, root);
    assert_eq!(reloaded.validators().expect("validators"), vec![v1, v2]);
    let record = reloaded.candidate(v2).expect("get").expect("record");
    assert_eq!(record.block_number, 1);
    assert!(record.security.is_zero());
}

#[test]
fn untouched_tables_keep_their_hashes() {
    let db = TrieDb::memory();
    let config = ChainConfig::default();

    let v1 = addr(0x11);
    let header = Header {
        number: 1,
        coinbase: v1,
        ..Header::default()
    };
    let extra = HeaderExtra {
        epoch: 1,
        epoch_block: 1,
        current_block_candidates: vec![v1],
        current_epoch_validators: vec![v1],
        ..HeaderExtra::default()
    };

    let mut snap = Snapshot::new_empty(&db);
    snap.apply(&config, &header, &extra).expect("apply");
    let root = snap.root().expect("root");
    snap.commit(root).expect("commit");

    // A block that only mints leaves every other table hash untouched.
    let mut next = Snapshot::load(&db, root);
    next.mint_block(1, 2, v1).expect("mint");
    let next_root = next.root().expect("root");

    assert_ne!(next_root.mint_cnt_hash, root.mint_cnt_hash);
    assert_eq!(next_root.epoch_hash, root.epoch_hash);
    assert_eq!(next_root.candidate_hash, root.candidate_hash);
    assert_eq!(next_root.config_hash, root.config_hash);
    assert_eq!(next_root.delegate_hash, root.delegate_hash);
    assert_eq!(next_root.vote_hash, root.vote_hash);
    assert_eq!(next_root.proposal_hash, root.proposal_hash);
    assert_eq!(next_root.declare_hash, root.declare_hash);
}

#[test]
fn apply_reports_missing_cancel_target() {
    let db = TrieDb::memory();
    let mut snap = Snapshot::new_empty(&db);
    let config = ChainConfig::default();

    let header = Header {
        number: 2,
        coinbase: addr(0x11),
        ..Header::default()
    };
    let extra = HeaderExtra {
        epoch: 1,
        epoch_block: 1,
        current_block_cancel_candidates: vec![addr(0x99)],
        ..HeaderExtra::default()
    };
    assert!(matches!(
        snap.apply(&config, &header, &extra),
        Err(EngineError::Snapshot(_))
    ));
}

#[test]
fn vote_weight_follows_balance_changes() {
    let db = TrieDb::memory();
    let mut snap = Snapshot::new_empty(&db);
    let mut state = MemoryState::new();

    let candidate = addr(0x11);
    let delegator = addr(0x22);
    snap.become_candidate(candidate, 1, U256::zero())
        .expect("become");
    snap.delegate(delegator, candidate).expect("delegate");

    state.set_balance(delegator, U256::from(100));
    assert_eq!(
        snap.count_votes(&state, candidate).expect("votes"),
        U256::from(100)
    );

    state.add_balance(&delegator, U256::from(50));
    assert_eq!(
        snap.count_votes(&state, candidate).expect("votes"),
        U256::from(150)
    );
}

#[test]
fn empty_tables_have_zero_hashes() {
    let db = TrieDb::memory();
    let mut snap = Snapshot::new_empty(&db);
    let root = snap.root().expect("root");
    assert_eq!(root.epoch_hash, H256::zero());
    assert_eq!(root.candidate_hash, H256::zero());
    assert_eq!(root.mint_cnt_hash, H256::zero());
    assert_eq!(root.config_hash, H256::zero());
}
