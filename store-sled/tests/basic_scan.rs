use relstore_codec::{lex, plain, ColumnDescriptor, ColumnType, Direction, NullsOrder, Value};
use relstore_engine::{Bound, Durability, Index, LockMode, RowInfo, ScanController, Txn};
use relstore_query::ast::Predicate;
use relstore_sled::SledStore;

fn row_info() -> RowInfo {
    RowInfo {
        row_type: "widget".into(),
        version: 1,
        key_columns: vec![ColumnDescriptor::key("id", ColumnType::I32, Direction::Asc, NullsOrder::Low, 0)],
        value_columns: vec![ColumnDescriptor::value("name", ColumnType::Utf8, false, 0)],
    }
}

fn encode_key(id: i32) -> Vec<u8> {
    let mut out = Vec::new();
    lex::encode(&Value::I32(id), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false, &mut out).unwrap();
    out
}

fn encode_value(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    plain::encode(&Value::Utf8(name.to_string()), &ColumnType::Utf8, false, &mut out).unwrap();
    out
}

#[tokio::test]
async fn full_scan_returns_rows_in_key_order() {
    let store = SledStore::open_temporary().unwrap();
    let index = store.index("widgets").unwrap();
    let txn = store.begin(LockMode::Write, Durability::Full);

    for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
        index.store(&txn, &encode_key(id), Some(&encode_value(name))).await.unwrap();
    }
    txn.commit().await.unwrap();

    let ri = row_info();
    let residual = Predicate::True;
    let scan = ScanController::new(&index, Bound::Unbounded, Bound::Unbounded, false, &ri, &residual);
    let read_txn = store.begin(LockMode::Read, Durability::Full);
    let mut cursor = scan.new_cursor(&read_txn).await.unwrap();

    let mut seen = Vec::new();
    while scan.advance(&mut cursor, &[]).await.unwrap() {
        let (id, _) = lex::decode(cursor.key().unwrap(), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false).unwrap();
        seen.push(id);
    }
    assert_eq!(seen, vec![Value::I32(1), Value::I32(2), Value::I32(3)]);
}

#[tokio::test]
async fn reverse_scan_returns_rows_in_descending_key_order() {
    let store = SledStore::open_temporary().unwrap();
    let index = store.index("widgets_rev").unwrap();
    let txn = store.begin(LockMode::Write, Durability::Full);

    for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
        index.store(&txn, &encode_key(id), Some(&encode_value(name))).await.unwrap();
    }
    txn.commit().await.unwrap();

    let ri = row_info();
    let residual = Predicate::True;
    let scan = ScanController::new(&index, Bound::Unbounded, Bound::Unbounded, true, &ri, &residual);
    let read_txn = store.begin(LockMode::Read, Durability::Full);
    let mut cursor = scan.new_cursor(&read_txn).await.unwrap();

    let mut seen = Vec::new();
    while scan.advance(&mut cursor, &[]).await.unwrap() {
        let (id, _) = lex::decode(cursor.key().unwrap(), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false).unwrap();
        seen.push(id);
    }
    assert_eq!(seen, vec![Value::I32(3), Value::I32(2), Value::I32(1)]);
}

#[tokio::test]
async fn reverse_scan_respects_bounds() {
    let store = SledStore::open_temporary().unwrap();
    let index = store.index("widgets_rev_bounded").unwrap();
    let txn = store.begin(LockMode::Write, Durability::Full);

    for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        index.store(&txn, &encode_key(id), Some(&encode_value(name))).await.unwrap();
    }
    txn.commit().await.unwrap();

    let ri = row_info();
    let residual = Predicate::True;
    let low = Bound::Inclusive(encode_key(2));
    let high = Bound::Exclusive(encode_key(4));
    let scan = ScanController::new(&index, low, high, true, &ri, &residual);
    let read_txn = store.begin(LockMode::Read, Durability::Full);
    let mut cursor = scan.new_cursor(&read_txn).await.unwrap();

    let mut seen = Vec::new();
    while scan.advance(&mut cursor, &[]).await.unwrap() {
        let (id, _) = lex::decode(cursor.key().unwrap(), &ColumnType::I32, Direction::Asc, NullsOrder::Low, false).unwrap();
        seen.push(id);
    }
    assert_eq!(seen, vec![Value::I32(3), Value::I32(2)]);
}

#[tokio::test]
async fn unique_insert_conflict_is_reported() {
    let store = SledStore::open_temporary().unwrap();
    let index = store.index("alt_emails").unwrap();
    let txn = store.begin(LockMode::Write, Durability::Full);

    let key = encode_key(42);
    assert!(index.insert(&txn, &key, b"first").await.unwrap());
    assert!(!index.insert(&txn, &key, b"second").await.unwrap());
}
