use rstest::rstest;
use trainer_hardware::FileStore;
use trainer_traits::SettingsStore;

#[rstest]
fn blob_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = FileStore::open(dir.path()).expect("open");

    assert_eq!(store.get_blob("powerTbl"), None);
    store.put_blob("powerTbl", &[1, 2, 3]).expect("put");
    assert_eq!(store.get_blob("powerTbl"), Some(vec![1, 2, 3]));
}

#[rstest]
#[case("idleA", 0.0)]
#[case("idleB", 8.0)]
#[case("idleC", -0.5)]
fn f32_helpers_use_le_bytes(#[case] key: &str, #[case] value: f32) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = FileStore::open(dir.path()).expect("open");

    store.put_f32(key, value).expect("put");
    assert_eq!(store.get_f32(key), Some(value));
    assert_eq!(store.get_blob(key), Some(value.to_le_bytes().to_vec()));
}

#[rstest]
fn reopen_sees_previous_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut store = FileStore::open(dir.path()).expect("open");
        store.put_blob("simTbl", &[9; 8]).expect("put");
    }
    let mut store = FileStore::open(dir.path()).expect("reopen");
    assert_eq!(store.get_blob("simTbl"), Some(vec![9; 8]));
}
