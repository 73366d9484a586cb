use uuid::Uuid;

use twinbank_layout::{
    disk::{Partition, PartitionTable},
    error::LayoutError,
    instructions::{Instruction, PartitionGuid},
    introspect::{introspect, verify_compatible},
    layout::{Disk, ImageGeometry, PartitionKey, PartitionPlan, UpdateMode},
    units::NumSectors,
    BuildPlan,
};

/// Create the partition table the partitioning tool would write for the instructions.
fn simulate_tool<'i>(instructions: impl Iterator<Item = &'i Instruction>) -> PartitionTable {
    let mut table = PartitionTable::new(Uuid::from_u128(0xd15c), 512);
    for instruction in instructions {
        let gpt_id = match instruction.partition_guid {
            PartitionGuid::Fixed(guid) => guid,
            PartitionGuid::Generate => Uuid::from_u128(0x1000 + u128::from(instruction.number)),
        };
        table.partitions.push(Partition {
            number: instruction.number,
            start: instruction.start,
            size: NumSectors::from_value(
                instruction.end.into_value() - instruction.start.into_value() + 1,
            ),
            ty: instruction.type_guid,
            name: (!instruction.label.is_empty()).then(|| instruction.label.clone()),
            gpt_id: Some(gpt_id),
        });
    }
    table
}

#[test]
fn test_round_trip() {
    for plan in [PartitionPlan::Split, PartitionPlan::Unified] {
        for update_mode in [UpdateMode::InPlace, UpdateMode::SingleBank] {
            for (os_image_gib, data_image_gib) in [(1, 1), (2, 20), (3, 7)] {
                let build = BuildPlan::compute(
                    ImageGeometry::new(os_image_gib, data_image_gib),
                    plan,
                    update_mode,
                )
                .unwrap();
                let os_table = simulate_tool(build.instructions_for(Disk::Os));
                let data_table = match plan {
                    PartitionPlan::Split => Some(simulate_tool(build.instructions_for(Disk::Data))),
                    PartitionPlan::Unified => None,
                };
                let recovered = introspect(&os_table, data_table.as_ref()).unwrap();
                assert_eq!(recovered.plan(), plan);
                assert_eq!(recovered.update_mode(), update_mode);
                assert_eq!(
                    recovered.iter().collect::<Vec<_>>(),
                    build.layout.iter().collect::<Vec<_>>()
                );
                verify_compatible(&build.layout, &recovered).unwrap();
            }
        }
    }
}

#[test]
fn test_recovered_layout_of_other_geometry_is_rejected() {
    let old = BuildPlan::compute(
        ImageGeometry::new(2, 20),
        PartitionPlan::Split,
        UpdateMode::InPlace,
    )
    .unwrap();
    let os_table = simulate_tool(old.instructions_for(Disk::Os));
    let data_table = simulate_tool(old.instructions_for(Disk::Data));
    let recovered = introspect(&os_table, Some(&data_table)).unwrap();
    let new = BuildPlan::compute(
        ImageGeometry::new(4, 20),
        PartitionPlan::Split,
        UpdateMode::InPlace,
    )
    .unwrap();
    let error = verify_compatible(&new.layout, &recovered).unwrap_err();
    assert!(matches!(
        error,
        LayoutError::LayoutMismatch {
            key: PartitionKey::BootA,
            ..
        }
    ));
}

#[test]
fn test_missing_data_disk_partition() {
    let build = BuildPlan::compute(
        ImageGeometry::new(1, 4),
        PartitionPlan::Split,
        UpdateMode::InPlace,
    )
    .unwrap();
    let os_table = simulate_tool(build.instructions_for(Disk::Os));
    let empty = PartitionTable::new(Uuid::from_u128(2), 512);
    let error = introspect(&os_table, Some(&empty)).unwrap_err();
    assert!(matches!(error, LayoutError::IntrospectionParse { .. }));
}

#[test]
fn test_unknown_plan_produces_nothing() {
    let result = "mirrored"
        .parse::<PartitionPlan>()
        .and_then(|plan| BuildPlan::compute(ImageGeometry::new(1, 1), plan, UpdateMode::InPlace));
    let error = result.unwrap_err();
    assert!(matches!(error, LayoutError::Configuration { .. }));
    assert!(error.to_string().contains("\"mirrored\""));
}

#[test]
fn test_example_split_in_place() {
    let build = BuildPlan::compute(
        ImageGeometry::new(1, 1),
        PartitionPlan::Split,
        UpdateMode::InPlace,
    )
    .unwrap();
    let sizes = build
        .layout
        .iter()
        .filter(|(_, extent)| extent.disk == Disk::Os)
        .map(|(key, extent)| (key.to_string(), extent.size.into_value()))
        .collect::<Vec<_>>();
    let expected: [(&str, u64); 13] = [
        ("BIOS", 4),
        ("EFI-A", 5),
        ("BOOT-A", 20),
        ("ROOT-A", 460),
        ("HASH-A", 5),
        ("RESERVED-A", 10),
        ("EFI-B", 5),
        ("BOOT-B", 20),
        ("ROOT-B", 460),
        ("HASH-B", 5),
        ("RESERVED-B", 10),
        ("PRIVATE", 17),
        ("DATA-A", 1),
    ];
    assert_eq!(sizes, expected.map(|(key, size)| (key.to_owned(), size)));
}

#[test]
fn test_largest_geometry_fits_sectors() {
    const MAX_GIB: u64 = (1 << 43) - 1;
    for update_mode in [UpdateMode::InPlace, UpdateMode::SingleBank] {
        let build = BuildPlan::compute(
            ImageGeometry::new(MAX_GIB, MAX_GIB),
            PartitionPlan::Split,
            update_mode,
        )
        .unwrap();
        for disk in [Disk::Os, Disk::Data] {
            let last = build.instructions_for(disk).last().unwrap();
            // Leaves room for the backup GPT at the very end of the disk.
            assert_eq!(
                last.end.into_value(),
                MAX_GIB * 1024 * 2048 - 2048 - 1
            );
        }
        for geometry in [
            ImageGeometry::new(MAX_GIB + 1, 1),
            ImageGeometry::new(1, MAX_GIB + 1),
            ImageGeometry::new(1, u64::MAX / 512),
            ImageGeometry::new(u64::MAX / 1000, 1),
        ] {
            for plan in [PartitionPlan::Split, PartitionPlan::Unified] {
                let error = BuildPlan::compute(geometry, plan, update_mode).unwrap_err();
                assert!(matches!(error, LayoutError::ArithmeticRange { .. }));
            }
        }
    }
}
