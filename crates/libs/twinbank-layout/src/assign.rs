//! Labels, type GUIDs, and partition GUIDs of the partitions of a layout.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    catalog::{data_guids, gpt_types, labels},
    layout::{PartitionClass, PartitionKey, PartitionLayout, PartitionPlan},
};

/// Label of the given partition.
///
/// Data partitions have an empty label as they are labeled at boot time.
pub fn label(key: PartitionKey) -> String {
    match key {
        PartitionKey::Bios => labels::BIOS_BOOT.to_owned(),
        PartitionKey::EfiA => labels::EFI_SYSTEM.to_owned(),
        PartitionKey::EfiB => labels::EFI_BACKUP.to_owned(),
        PartitionKey::Private => labels::PRIVATE.to_owned(),
        PartitionKey::DataA | PartitionKey::DataB => String::new(),
        _ => format!("{}{key}", labels::LABEL_PREFIX),
    }
}

/// GPT type of the given partition.
///
/// Both banks share the type of a class.
pub fn type_guid(key: PartitionKey) -> Uuid {
    match key.class() {
        PartitionClass::Bios => gpt_types::BIOS_BOOT,
        PartitionClass::Efi => match key {
            PartitionKey::EfiA => gpt_types::EFI_SYSTEM,
            _ => gpt_types::EFI_BACKUP,
        },
        PartitionClass::Boot => gpt_types::BOOT,
        PartitionClass::Root => gpt_types::ROOT,
        PartitionClass::Hash => gpt_types::HASH,
        PartitionClass::Reserved => gpt_types::RESERVED,
        PartitionClass::Private => gpt_types::PRIVATE,
        PartitionClass::Data => gpt_types::DATA,
    }
}

/// Fixed partition GUID of the given partition, if it has one.
///
/// Only data partitions have fixed GUIDs. The partition on the data disk is preferred
/// in the split plan, the one on the OS disk is preferred otherwise.
pub fn partition_guid(key: PartitionKey, plan: PartitionPlan) -> Option<Uuid> {
    match (key, plan) {
        (PartitionKey::DataA, PartitionPlan::Split) => Some(data_guids::FALLBACK),
        (PartitionKey::DataB, PartitionPlan::Split) => Some(data_guids::PREFERRED),
        (PartitionKey::DataA, PartitionPlan::Unified) => Some(data_guids::PREFERRED),
        (PartitionKey::DataB, PartitionPlan::Unified) => Some(data_guids::FALLBACK),
        _ => None,
    }
}

/// Labels, types, and fixed GUIDs of every partition of a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignments {
    pub labels: IndexMap<PartitionKey, String>,
    pub types: IndexMap<PartitionKey, Uuid>,
    pub guids: IndexMap<PartitionKey, Uuid>,
}

impl Assignments {
    /// Assign labels, types, and fixed GUIDs to the partitions of the layout.
    pub fn for_layout(layout: &PartitionLayout) -> Self {
        let plan = layout.plan();
        Self {
            labels: layout.keys().map(|key| (key, label(key))).collect(),
            types: layout.keys().map(|key| (key, type_guid(key))).collect(),
            guids: layout
                .keys()
                .filter_map(|key| partition_guid(key, plan).map(|guid| (key, guid)))
                .collect(),
        }
    }

    /// Label of a partition of the layout.
    ///
    /// # Panics
    ///
    /// Panics if the partition is not part of the layout.
    pub fn label(&self, key: PartitionKey) -> &str {
        match self.labels.get(&key) {
            Some(label) => label,
            None => panic!("BUG: no label assigned to partition {key}"),
        }
    }

    /// Type of a partition of the layout.
    ///
    /// # Panics
    ///
    /// Panics if the partition is not part of the layout.
    pub fn type_guid(&self, key: PartitionKey) -> Uuid {
        match self.types.get(&key) {
            Some(guid) => *guid,
            None => panic!("BUG: no type assigned to partition {key}"),
        }
    }

    /// Fixed GUID of a partition, [`None`] if the tool should generate one.
    pub fn partition_guid(&self, key: PartitionKey) -> Option<Uuid> {
        self.guids.get(&key).copied()
    }
}

/// Parse a partition label back into its key.
///
/// Returns [`None`] for empty or unknown labels.
pub fn parse_label(label: &str) -> Option<PartitionKey> {
    match label {
        labels::BIOS_BOOT => Some(PartitionKey::Bios),
        labels::EFI_SYSTEM => Some(PartitionKey::EfiA),
        labels::EFI_BACKUP => Some(PartitionKey::EfiB),
        _ => {
            let name = label.strip_prefix(labels::LABEL_PREFIX)?;
            PartitionKey::ALL.into_iter().find(|key| {
                !matches!(
                    key.class(),
                    PartitionClass::Bios | PartitionClass::Efi | PartitionClass::Data
                ) && key.to_string() == name
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{plan_layout, Bank, ImageGeometry, UpdateMode};

    #[test]
    fn test_labels() {
        assert_eq!(label(PartitionKey::Bios), "BIOS-BOOT");
        assert_eq!(label(PartitionKey::EfiB), "EFI-BACKUP");
        assert_eq!(label(PartitionKey::RootB), "TWINBANK-ROOT-B");
        assert_eq!(label(PartitionKey::Private), "TWINBANK-PRIVATE");
        assert_eq!(label(PartitionKey::DataB), "");
    }

    #[test]
    fn test_label_roundtrip() {
        for key in PartitionKey::ALL {
            let label = label(key);
            if key.class() == PartitionClass::Data {
                assert_eq!(parse_label(&label), None);
            } else {
                assert_eq!(parse_label(&label), Some(key));
            }
        }
        assert_eq!(parse_label("TWINBANK-SWAP"), None);
        assert_eq!(parse_label("BOOT-A"), None);
    }

    #[test]
    fn test_types_shared_by_banks() {
        for (a, b) in Bank::A.keys().into_iter().zip(Bank::B.keys()).skip(1) {
            assert_eq!(type_guid(a), type_guid(b));
        }
        assert_ne!(type_guid(PartitionKey::EfiA), type_guid(PartitionKey::EfiB));
    }

    #[test]
    fn test_data_guids_by_plan() {
        let split = plan_layout(
            ImageGeometry::new(1, 1),
            PartitionPlan::Split,
            UpdateMode::InPlace,
        )
        .unwrap();
        let assignments = Assignments::for_layout(&split);
        assert_eq!(
            assignments.partition_guid(PartitionKey::DataB),
            Some(data_guids::PREFERRED)
        );
        assert_eq!(
            assignments.partition_guid(PartitionKey::DataA),
            Some(data_guids::FALLBACK)
        );
        assert_eq!(assignments.partition_guid(PartitionKey::RootA), None);
        assert_eq!(assignments.guids.len(), 2);

        let unified = plan_layout(
            ImageGeometry::new(1, 1),
            PartitionPlan::Unified,
            UpdateMode::InPlace,
        )
        .unwrap();
        let assignments = Assignments::for_layout(&unified);
        assert_eq!(
            assignments.partition_guid(PartitionKey::DataA),
            Some(data_guids::PREFERRED)
        );
        assert_eq!(assignments.guids.len(), 1);
        assert_eq!(assignments.labels.len(), unified.len());
    }

    #[test]
    #[should_panic]
    fn test_missing_assignment_is_a_bug() {
        let layout = plan_layout(
            ImageGeometry::new(1, 1),
            PartitionPlan::Unified,
            UpdateMode::SingleBank,
        )
        .unwrap();
        Assignments::for_layout(&layout).label(PartitionKey::BootB);
    }
}
