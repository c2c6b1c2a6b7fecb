use relstore_codec::{lex, ColumnType, Direction, NullsOrder, Value};
use relstore_engine::{AutoKeyGenerator, Durability, Index, KeyRange, LockMode};
use relstore_sled::SledStore;
use std::sync::Arc;

/// Fills every slot but one in a tiny range, then checks the generator
/// still finds the single remaining free value instead of giving up.
#[tokio::test]
async fn finds_the_last_free_slot_in_a_small_range() {
    let store = SledStore::open_temporary().unwrap();
    let index = Arc::new(store.index("orders").unwrap());
    let txn = store.begin(LockMode::Write, Durability::Full);
    txn.set_lock_timeout(Some(std::time::Duration::from_secs(5)));

    for v in [-2i64, -1, 1] {
        let mut key = Vec::new();
        lex::encode(&Value::I32(v as i32), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false, &mut key).unwrap();
        index.store(&txn, &key, Some(b"taken")).await.unwrap();
    }

    let generator = AutoKeyGenerator::new(index.clone(), Vec::new(), KeyRange { min: -2, max: 2 }, ColumnType::I32, Direction::Asc, NullsOrder::Low);

    let key = generator.generate(&txn, b"new-order").await.unwrap();
    let (value, _) = lex::decode(&key, &ColumnType::I32, Direction::Asc, NullsOrder::Low, false).unwrap();
    assert_eq!(value, Value::I32(2));
}

#[tokio::test]
async fn fails_with_lock_failure_when_range_is_exhausted() {
    let store = SledStore::open_temporary().unwrap();
    let index = Arc::new(store.index("full_range").unwrap());
    let txn = store.begin(LockMode::Write, Durability::Full);
    txn.set_lock_timeout(Some(std::time::Duration::from_millis(200)));

    for v in [-1i64, 1] {
        let mut key = Vec::new();
        lex::encode(&Value::I32(v as i32), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false, &mut key).unwrap();
        index.store(&txn, &key, Some(b"taken")).await.unwrap();
    }

    let generator = AutoKeyGenerator::new(index.clone(), Vec::new(), KeyRange { min: -1, max: 1 }, ColumnType::I32, Direction::Asc, NullsOrder::Low);

    let result = generator.generate(&txn, b"overflow").await;
    assert!(result.is_err());
}
