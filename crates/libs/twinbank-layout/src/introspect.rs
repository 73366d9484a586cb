//! Recovering the layout of existing images from their partition tables.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::{
    assign::parse_label,
    catalog::data_guids,
    disk::{Partition, PartitionTable},
    error::{LayoutError, LayoutResult},
    layout::{
        Bank, Disk, Extent, PartitionClass, PartitionKey, PartitionLayout, PartitionPlan,
        UpdateMode,
    },
    units::{NumMebibytes, NumSectors, SECTOR_SIZE},
    Anyhow,
};

/// Read the partition tables of the given images and recover their layout.
pub fn introspect_images(os_image: &Path, data_image: Option<&Path>) -> Anyhow<PartitionLayout> {
    let os_table = PartitionTable::read(os_image)?;
    let data_table = data_image
        .map(|image| PartitionTable::read(image))
        .transpose()?;
    Ok(introspect(&os_table, data_table.as_ref())?)
}

/// Recover the layout from the partition tables of an OS image and an optional data
/// image.
///
/// The plan is split if and only if a data image is given. The update mode is in-place
/// if any partition of bank B exists. Tables whose partitions do not form a valid layout,
/// e.g., because an unknown partition leaves a gap, are reported as
/// [`LayoutError::IntrospectionParse`].
pub fn introspect(
    os_table: &PartitionTable,
    data_table: Option<&PartitionTable>,
) -> LayoutResult<PartitionLayout> {
    let mut found = IndexMap::new();
    scan(os_table, Disk::Os, &mut found)?;
    if let Some(data_table) = data_table {
        scan(data_table, Disk::Data, &mut found)?;
    }
    let plan = match data_table {
        Some(_) => PartitionPlan::Split,
        None => PartitionPlan::Unified,
    };
    let update_mode = if found
        .keys()
        .any(|key| key.class() != PartitionClass::Data && key.bank() == Some(Bank::B))
    {
        UpdateMode::InPlace
    } else {
        UpdateMode::SingleBank
    };
    let required = PartitionKey::required(plan, update_mode);
    if let Some(key) = found.keys().find(|key| !required.contains(key)) {
        return Err(LayoutError::introspection(format!(
            "unexpected partition {key} for plan {plan} with update mode {update_mode}"
        )));
    }
    let mut partitions = IndexMap::new();
    for key in required {
        let Some(extent) = found.get(&key) else {
            return Err(LayoutError::introspection(format!(
                "partition {key} is missing"
            )));
        };
        partitions.insert(key, *extent);
    }
    let layout = PartitionLayout::from_entries(plan, update_mode, partitions)
        .map_err(LayoutError::introspection)?;
    info!(
        "recovered layout with {} partitions (plan: {plan}, update mode: {update_mode})",
        layout.len()
    );
    Ok(layout)
}

/// Key of a partition based on its name or, for unnamed data partitions, its GUID.
fn partition_key(partition: &Partition, disk: Disk) -> Option<PartitionKey> {
    match &partition.name {
        Some(name) => parse_label(name),
        None => {
            let guid = partition.gpt_id?;
            if guid != data_guids::PREFERRED && guid != data_guids::FALLBACK {
                return None;
            }
            match disk {
                Disk::Os => Some(PartitionKey::DataA),
                Disk::Data => Some(PartitionKey::DataB),
            }
        }
    }
}

fn to_mebibytes(
    sectors: NumSectors,
    what: &str,
    partition: &Partition,
) -> LayoutResult<NumMebibytes> {
    sectors.to_mebibytes_exact().ok_or_else(|| {
        LayoutError::introspection(format!(
            "{what} of partition {} ({sectors}) is not 1-MiB aligned",
            partition.number
        ))
    })
}

fn scan(
    table: &PartitionTable,
    disk: Disk,
    found: &mut IndexMap<PartitionKey, Extent>,
) -> LayoutResult<()> {
    if table.sector_size != SECTOR_SIZE {
        return Err(LayoutError::introspection(format!(
            "unsupported sector size of {} bytes on the {disk} disk",
            table.sector_size
        )));
    }
    debug!("scanning partition table {} of the {disk} disk", table.disk_id);
    for partition in &table.partitions {
        let Some(key) = partition_key(partition, disk) else {
            debug!(
                "skipping partition {} with name {:?} on the {disk} disk",
                partition.number, partition.name
            );
            continue;
        };
        if key.disk() != disk {
            return Err(LayoutError::introspection(format!(
                "partition {key} found on the {disk} disk"
            )));
        }
        let extent = Extent {
            disk,
            offset: to_mebibytes(partition.start, "start", partition)?,
            size: to_mebibytes(partition.size, "size", partition)?,
        };
        if found.insert(key, extent).is_some() {
            return Err(LayoutError::introspection(format!(
                "partition {key} exists more than once"
            )));
        }
    }
    Ok(())
}

/// Check that a recovered layout matches the computed one.
pub fn verify_compatible(expected: &PartitionLayout, found: &PartitionLayout) -> LayoutResult<()> {
    let keys = expected
        .keys()
        .chain(found.keys().filter(|key| expected.get(*key).is_none()));
    for key in keys {
        let (expected_extent, found_extent) = (expected.get(key), found.get(key));
        if expected_extent != found_extent {
            return Err(LayoutError::mismatch(key, expected_extent, found_extent));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        catalog::gpt_types,
        layout::{plan_layout, ImageGeometry},
    };

    fn partition(number: u32, start: u64, size: u64, name: &str) -> Partition {
        Partition {
            number,
            start: NumSectors::from_value(start * 2048),
            size: NumSectors::from_value(size * 2048),
            ty: gpt_types::BOOT,
            name: (!name.is_empty()).then(|| name.to_owned()),
            gpt_id: Some(Uuid::from_u128(u128::from(number))),
        }
    }

    fn single_bank_table() -> PartitionTable {
        let mut table = PartitionTable::new(Uuid::from_u128(1), 512);
        let mut data = partition(8, 1032, 1024, "");
        data.gpt_id = Some(data_guids::PREFERRED);
        table.partitions = vec![
            partition(1, 1, 4, "BIOS-BOOT"),
            partition(2, 5, 10, "EFI-SYSTEM"),
            partition(3, 15, 40, "TWINBANK-BOOT-A"),
            partition(4, 55, 920, "TWINBANK-ROOT-A"),
            partition(5, 975, 10, "TWINBANK-HASH-A"),
            partition(6, 985, 20, "TWINBANK-RESERVED-A"),
            partition(7, 1005, 17, "TWINBANK-PRIVATE"),
            partition(9, 1022, 10, "SCRATCH"),
            data,
        ];
        table
    }

    #[test]
    fn test_single_bank_unified() {
        let table = single_bank_table();
        let layout = introspect(&table, None);
        // The unknown scratch partition is skipped but leaves a gap.
        assert!(matches!(
            layout,
            Err(LayoutError::IntrospectionParse { reason }) if reason.contains("DATA-A")
        ));

        let mut table = single_bank_table();
        table.partitions.retain(|partition| partition.number != 9);
        table.partitions[7].start = NumSectors::from_value(1022 * 2048);
        let layout = introspect(&table, None).unwrap();
        assert_eq!(layout.plan(), PartitionPlan::Unified);
        assert_eq!(layout.update_mode(), UpdateMode::SingleBank);
        let expected = plan_layout(
            ImageGeometry::new(1, 1),
            PartitionPlan::Unified,
            UpdateMode::SingleBank,
        )
        .unwrap();
        verify_compatible(&expected, &layout).unwrap();
    }

    #[test]
    fn test_missing_partition() {
        let mut table = single_bank_table();
        table
            .partitions
            .retain(|partition| partition.name.as_deref() != Some("TWINBANK-HASH-A"));
        let error = introspect(&table, None).unwrap_err();
        assert!(
            matches!(&error, LayoutError::IntrospectionParse { reason } if reason.contains("HASH-A"))
        );
    }

    #[test]
    fn test_unaligned_partition() {
        let mut table = single_bank_table();
        table.partitions[1].size = NumSectors::from_value(10 * 2048 + 1);
        assert!(matches!(
            introspect(&table, None),
            Err(LayoutError::IntrospectionParse { .. })
        ));
    }

    #[test]
    fn test_unsupported_sector_size() {
        let mut table = single_bank_table();
        table.sector_size = 4096;
        assert!(matches!(
            introspect(&table, None),
            Err(LayoutError::IntrospectionParse { .. })
        ));
    }

    #[test]
    fn test_mismatch() {
        let geometry = ImageGeometry::new(1, 1);
        let expected = plan_layout(geometry, PartitionPlan::Unified, UpdateMode::SingleBank).unwrap();
        let bigger = plan_layout(
            ImageGeometry::new(2, 1),
            PartitionPlan::Unified,
            UpdateMode::SingleBank,
        )
        .unwrap();
        let error = verify_compatible(&expected, &bigger).unwrap_err();
        assert!(matches!(
            error,
            LayoutError::LayoutMismatch {
                key: PartitionKey::BootA,
                ..
            }
        ));
        let in_place = plan_layout(geometry, PartitionPlan::Unified, UpdateMode::InPlace).unwrap();
        assert!(verify_compatible(&expected, &in_place).is_err());
    }
}
