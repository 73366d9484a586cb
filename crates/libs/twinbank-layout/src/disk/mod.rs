//! Partition tables of existing disk images and the tools reading and writing them.
//!
//! The layout engine never touches image bytes itself. Reading goes through `sfdisk`
//! and writing through `sgdisk`.

use std::path::Path;

use uuid::Uuid;

use crate::{units::NumSectors, Anyhow};

pub mod sfdisk;
pub mod sgdisk;

/// GPT partition table as reported by the partitioning tool.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PartitionTable {
    /// GUID of the disk.
    pub disk_id: Uuid,
    /// Size of a sector in bytes.
    pub sector_size: u64,
    /// Partitions of the disk sorted by their start sector.
    pub partitions: Vec<Partition>,
}

impl PartitionTable {
    /// Create an empty partition table with the given ID.
    pub fn new(disk_id: Uuid, sector_size: u64) -> Self {
        Self {
            disk_id,
            sector_size,
            partitions: Vec::new(),
        }
    }

    /// Read the partition table of an image.
    pub fn read(image: impl AsRef<Path>) -> Anyhow<Self> {
        sfdisk::sfdisk_read(image.as_ref())
    }

    /// Parse the JSON dump produced by `sfdisk --dump --json`.
    pub fn from_sfdisk_json(json: &str) -> Anyhow<Self> {
        sfdisk::parse_sfdisk_json(json)
    }
}

/// Partition of a disk.
#[derive(Clone, Debug)]
pub struct Partition {
    /// Number of the partition.
    pub number: u32,
    /// Start sector of the partition.
    pub start: NumSectors,
    /// Size of the partition.
    pub size: NumSectors,
    /// Type of the partition.
    pub ty: Uuid,
    /// Name of the partition, [`None`] if it has none.
    pub name: Option<String>,
    /// Unique identifier of the partition.
    pub gpt_id: Option<Uuid>,
}
