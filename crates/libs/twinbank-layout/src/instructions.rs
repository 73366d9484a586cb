//! Instructions for the external partitioning tool.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    assign::Assignments,
    catalog::attribute_bits,
    error::{LayoutError, LayoutResult},
    layout::{Disk, PartitionKey, PartitionLayout},
    units::{NumMebibytes, NumSectors},
};

/// Partition GUID to create a partition with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionGuid {
    /// Use the given GUID.
    Fixed(Uuid),
    /// Let the tool generate a random GUID.
    Generate,
}

/// Operation on a GPT attribute bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeAction {
    Set,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AttributeOp {
    pub bit: u8,
    pub action: AttributeAction,
}

/// Instruction to create a single partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// Partition the instruction creates.
    pub key: PartitionKey,
    /// Disk to create the partition on.
    pub disk: Disk,
    /// Number of the partition on its disk, starting at 1.
    pub number: u32,
    /// First sector of the partition.
    pub start: NumSectors,
    /// Last sector of the partition (inclusive).
    pub end: NumSectors,
    pub label: String,
    pub type_guid: Uuid,
    pub partition_guid: PartitionGuid,
    /// Attribute operations applied after creating the partition.
    pub attributes: Vec<AttributeOp>,
}

/// Attribute operations of the given partition.
///
/// Bank A starts out as the active bank, i.e., its boot partition has priority and has
/// booted successfully, while bank B has neither.
fn attribute_ops(key: PartitionKey) -> Vec<AttributeOp> {
    let action = match key {
        PartitionKey::BootA => AttributeAction::Set,
        PartitionKey::BootB => AttributeAction::Clear,
        _ => return Vec::new(),
    };
    [attribute_bits::PRIORITY, attribute_bits::SUCCESSFUL]
        .into_iter()
        .map(|bit| AttributeOp { bit, action })
        .collect()
}

fn sector(key: PartitionKey, offset: NumMebibytes) -> LayoutResult<NumSectors> {
    offset.to_sectors().ok_or_else(|| {
        LayoutError::arithmetic_range(key, format!("{offset} is not addressable with sectors"))
    })
}

/// Build the instructions creating the partitions of a layout in placement order.
pub fn build_instructions(
    layout: &PartitionLayout,
    assignments: &Assignments,
) -> LayoutResult<Vec<Instruction>> {
    let mut next_number = [1u32; 2];
    layout
        .iter()
        .map(|(key, extent)| {
            let counter = &mut next_number[match extent.disk {
                Disk::Os => 0,
                Disk::Data => 1,
            }];
            let number = *counter;
            *counter += 1;
            // The end sector is inclusive.
            let end = sector(key, extent.end())?.into_value() - 1;
            Ok(Instruction {
                key,
                disk: extent.disk,
                number,
                start: sector(key, extent.offset)?,
                end: NumSectors::from_value(end),
                label: assignments.label(key).to_owned(),
                type_guid: assignments.type_guid(key),
                partition_guid: assignments
                    .partition_guid(key)
                    .map(PartitionGuid::Fixed)
                    .unwrap_or(PartitionGuid::Generate),
                attributes: attribute_ops(key),
            })
        })
        .collect()
}
