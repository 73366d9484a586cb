//! Reading partition tables with `sfdisk`.

use std::{path::Path, str::FromStr};

use anyhow::{anyhow, bail};
use serde::Deserialize;
use uuid::Uuid;
use xscript::{read_str, Run};

use super::{Partition, PartitionTable};
use crate::{units::NumSectors, Anyhow};

/// Path to the `sfdisk` executable.
const SFDISK: &str = "/usr/sbin/sfdisk";

pub(crate) fn sfdisk_read(image: &Path) -> Anyhow<PartitionTable> {
    let json = read_str!([SFDISK, "--dump", "--json", image])?;
    parse_sfdisk_json(&json).map_err(|error| anyhow!("{error} (image: {image:?})"))
}

pub(crate) fn parse_sfdisk_json(json: &str) -> Anyhow<PartitionTable> {
    let json_table = serde_json::from_str::<SfdiskJson>(json)?.partition_table;
    if json_table.label != SfdiskJsonLabel::Gpt {
        bail!("expected a GPT disk, found {:?}", json_table.label);
    }
    let disk_id = Uuid::parse_str(&json_table.id).map_err(|_| {
        anyhow!(
            "invalid GPT disk id {:?} returned from `sfdisk`",
            json_table.id
        )
    })?;
    let mut partitions = json_table
        .partitions
        .into_iter()
        .map(|partition| {
            let number = partition
                .node
                .rsplit_once(|c: char| !c.is_ascii_digit())
                .and_then(|(_, suffix)| u32::from_str(suffix).ok())
                .ok_or_else(|| {
                    anyhow!(
                        "invalid partition node {:?} returned from `sfdisk`",
                        partition.node
                    )
                })?;
            let ty = Uuid::parse_str(&partition.ty).map_err(|_| {
                anyhow!(
                    "invalid GPT partition type {:?} returned from `sfdisk`",
                    partition.ty
                )
            })?;
            let gpt_id = partition
                .uuid
                .map(|guid| {
                    Uuid::parse_str(&guid).map_err(|_| {
                        anyhow!("invalid partition GUID {:?} returned from `sfdisk`", guid)
                    })
                })
                .transpose()?;
            Ok(Partition {
                number,
                start: NumSectors::from_value(partition.start),
                size: NumSectors::from_value(partition.size),
                ty,
                name: partition.name.filter(|name| !name.is_empty()),
                gpt_id,
            })
        })
        .collect::<Anyhow<Vec<_>>>()?;
    partitions.sort_by(|x, y| x.start.cmp(&y.start));
    Ok(PartitionTable {
        disk_id,
        sector_size: json_table.sector_size,
        partitions,
    })
}

#[derive(Debug, Clone, Deserialize)]
struct SfdiskJson {
    #[serde(rename = "partitiontable")]
    partition_table: SfdiskJsonTable,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
struct SfdiskJsonTable {
    label: SfdiskJsonLabel,
    id: String,
    device: String,
    unit: String,
    #[serde(rename = "sectorsize")]
    sector_size: u64,
    // This field is missing if there are no partitions.
    #[serde(default)]
    partitions: Vec<SfdiskJsonPartition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SfdiskJsonLabel {
    Dos,
    Gpt,
}

#[derive(Debug, Clone, Deserialize)]
struct SfdiskJsonPartition {
    node: String,
    start: u64,
    size: u64,
    #[serde(rename = "type")]
    ty: String,
    uuid: Option<String>,
    name: Option<String>,
}
