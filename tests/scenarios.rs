//! Whole-pipeline scenarios from SPEC_FULL §8, exercised through the public API rather than
//! `part`'s internals, mirroring `parquet2`'s split between unit tests and `tests/it/`.

use colpart::columns_descriptor::ColumnDescriptor;
use colpart::compression::CompressionMethod;
use colpart::config::WriterOptions;
use colpart::serialize::ColumnData;
use colpart::types::{ColumnType, PrimitiveType};
use colpart::PartAssembler;

fn options(granularity: u64) -> WriterOptions {
    WriterOptions::new(granularity, 0, 1 << 20, CompressionMethod::None, 0).unwrap()
}

#[test]
fn scenario_1_tiny_primitive_one_block() {
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("part");
    let columns = vec![ColumnDescriptor::new("n", ColumnType::Primitive(PrimitiveType::U32))];
    let mut part =
        PartAssembler::create(&part_dir, columns, vec!["n".to_string()], options(8192)).unwrap();

    let values: Vec<u32> = vec![1, 2, 3];
    part.write_block(3, &[ColumnData::Primitive(&values)], None)
        .unwrap();
    let manifest = part.finalize_and_get_manifest().unwrap();

    assert_eq!(part.marks_count(), 1);
    assert_eq!(
        std::fs::read(part_dir.join("primary.idx")).unwrap(),
        [1u8, 0, 0, 0]
    );
    assert_eq!(std::fs::read(part_dir.join("n.mrk")).unwrap(), [0u8; 16]);

    let mut entries: Vec<_> = std::fs::read_dir(&part_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    entries.sort();
    assert_eq!(
        entries,
        ["checksums.txt", "columns.txt", "n.bin", "n.mrk", "primary.idx"]
    );
    assert!(manifest.verify(&part_dir).unwrap());
}

#[test]
fn scenario_2_exact_granule_multiple() {
    let dir = tempfile::tempdir().unwrap();
    let columns = vec![ColumnDescriptor::new("n", ColumnType::Primitive(PrimitiveType::U32))];
    let mut part = PartAssembler::create(
        dir.path().join("part"),
        columns,
        vec!["n".to_string()],
        options(8192),
    )
    .unwrap();
    let values: Vec<u32> = (0..16384u32).collect();
    part.write_block(16384, &[ColumnData::Primitive(&values)], None)
        .unwrap();
    part.finalize_and_get_manifest().unwrap();
    assert_eq!(part.marks_count(), 2);
}

#[test]
fn scenario_3_off_by_one_carry_across_two_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let columns = vec![ColumnDescriptor::new("n", ColumnType::Primitive(PrimitiveType::U32))];
    let mut part = PartAssembler::create(
        dir.path().join("part"),
        columns,
        vec!["n".to_string()],
        options(8192),
    )
    .unwrap();
    let block: Vec<u32> = (0..5000u32).collect();
    part.write_block(5000, &[ColumnData::Primitive(&block)], None)
        .unwrap();
    assert_eq!(part.marks_count(), 1);
    part.write_block(5000, &[ColumnData::Primitive(&block)], None)
        .unwrap();
    assert_eq!(part.marks_count(), 2);
    part.finalize_and_get_manifest().unwrap();
}

#[test]
fn scenario_4_nullable_array_of_u8() {
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("part");
    let ty = ColumnType::Nullable(Box::new(ColumnType::Array(Box::new(ColumnType::Primitive(
        PrimitiveType::U8,
    )))));
    let columns = vec![ColumnDescriptor::new("a", ty)];
    let mut part = PartAssembler::create(&part_dir, columns, vec![], options(8192)).unwrap();

    let mask = [false, false, true, false];
    let sizes: Vec<u64> = vec![2, 1, 0, 3];
    let values: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
    let data = ColumnData::Nullable {
        mask: &mask,
        inner: Box::new(ColumnData::Array {
            sizes: &sizes,
            inner: Box::new(ColumnData::Primitive(&values)),
        }),
    };
    part.write_block(4, &[data], None).unwrap();
    part.finalize_and_get_manifest().unwrap();

    let mut entries: Vec<_> = std::fs::read_dir(&part_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    entries.sort();
    assert_eq!(
        entries,
        [
            "a%size0.bin",
            "a%size0.mrk",
            "a.bin",
            "a.mrk",
            "a.null",
            "a.null_mrk",
            "checksums.txt",
            "columns.txt"
        ]
    );
}

#[test]
fn scenario_5_sibling_array_sharing() {
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("part");
    let ty = ColumnType::Nested(vec![
        ("x".to_string(), ColumnType::Primitive(PrimitiveType::U8)),
        ("y".to_string(), ColumnType::Primitive(PrimitiveType::U8)),
    ]);
    let columns = vec![ColumnDescriptor::new("t", ty)];
    let mut part = PartAssembler::create(&part_dir, columns, vec![], options(8192)).unwrap();

    let sizes: Vec<u64> = vec![2, 1];
    let x: Vec<u8> = vec![1, 2, 3];
    let y: Vec<u8> = vec![4, 5, 6];
    let data = ColumnData::Nested {
        sizes: &sizes,
        fields: vec![
            ("x".to_string(), ColumnData::Primitive(&x)),
            ("y".to_string(), ColumnData::Primitive(&y)),
        ],
    };
    part.write_block(2, &[data], None).unwrap();
    part.finalize_and_get_manifest().unwrap();

    assert!(part_dir.join("t%size0.bin").exists());
    assert!(part_dir.join("t%size0.mrk").exists());
    assert!(!part_dir.join("t.x%size0.bin").exists());
}

#[test]
fn scenario_6_empty_part_is_erased() {
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("part");
    let columns = vec![ColumnDescriptor::new("n", ColumnType::Primitive(PrimitiveType::U32))];
    let mut part =
        PartAssembler::create(&part_dir, columns, vec!["n".to_string()], options(8192)).unwrap();
    let manifest = part.finalize_and_get_manifest().unwrap();
    assert!(manifest.is_empty());
    assert!(!part_dir.exists());
}

#[test]
fn multi_column_sort_key_orders_primary_idx_by_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("part");
    let columns = vec![
        ColumnDescriptor::new("a", ColumnType::Primitive(PrimitiveType::U8)),
        ColumnDescriptor::new("b", ColumnType::Primitive(PrimitiveType::U32)),
    ];
    let mut part = PartAssembler::create(
        &part_dir,
        columns,
        vec!["a".to_string(), "b".to_string()],
        options(8192),
    )
    .unwrap();
    let a: Vec<u8> = vec![7];
    let b: Vec<u32> = vec![9];
    part.write_block(
        1,
        &[ColumnData::Primitive(&a), ColumnData::Primitive(&b)],
        None,
    )
    .unwrap();
    part.finalize_and_get_manifest().unwrap();
    assert_eq!(
        std::fs::read(part_dir.join("primary.idx")).unwrap(),
        [7u8, 9, 0, 0, 0]
    );
}

#[test]
fn compressed_round_trip_via_manifest_verify() {
    let dir = tempfile::tempdir().unwrap();
    let part_dir = dir.path().join("part");
    let columns = vec![ColumnDescriptor::new("n", ColumnType::Primitive(PrimitiveType::U64))];
    let writer_options = WriterOptions::new(1024, 0, 1 << 16, CompressionMethod::Lz4, 0).unwrap();
    let mut part = PartAssembler::create(&part_dir, columns, vec![], writer_options).unwrap();
    let values: Vec<u64> = (0..4000u64).collect();
    part.write_block(4000, &[ColumnData::Primitive(&values)], None)
        .unwrap();
    let manifest = part.finalize_and_get_manifest().unwrap();
    assert!(manifest.verify(&part_dir).unwrap());
}
