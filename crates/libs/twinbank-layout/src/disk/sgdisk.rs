//! Writing partition tables with `sgdisk`.

use std::path::Path;

use tracing::info;
use xscript::{cmd, ParentEnv, Run};

use crate::{
    instructions::{AttributeAction, Instruction, PartitionGuid},
    Anyhow,
};

/// Path to the `sgdisk` executable.
const SGDISK: &str = "/usr/sbin/sgdisk";

/// Render the `sgdisk` arguments creating the partitions of the given instructions.
///
/// The arguments start with `--clear` so that any existing table is replaced.
pub fn sgdisk_args<'i>(instructions: impl IntoIterator<Item = &'i Instruction>) -> Vec<String> {
    let mut args = vec!["--clear".to_owned()];
    for instruction in instructions {
        let number = instruction.number;
        args.push(format!(
            "--new={number}:{}:{}",
            instruction.start.into_value(),
            instruction.end.into_value()
        ));
        if !instruction.label.is_empty() {
            args.push(format!("--change-name={number}:{}", instruction.label));
        }
        args.push(format!(
            "--typecode={number}:{}",
            instruction.type_guid.hyphenated()
        ));
        let guid = match instruction.partition_guid {
            PartitionGuid::Fixed(guid) => guid.hyphenated().to_string(),
            PartitionGuid::Generate => "R".to_owned(),
        };
        args.push(format!("--partition-guid={number}:{guid}"));
        for attribute in &instruction.attributes {
            let action = match attribute.action {
                AttributeAction::Set => "set",
                AttributeAction::Clear => "clear",
            };
            args.push(format!("--attributes={number}:{action}:{}", attribute.bit));
        }
    }
    args
}

/// Create the partitions of the given instructions on an image.
pub fn apply<'i>(
    image: &Path,
    instructions: impl IntoIterator<Item = &'i Instruction>,
) -> Anyhow<()> {
    let mut args = sgdisk_args(instructions);
    info!("partitioning {image:?} with `sgdisk {}`", args.join(" "));
    args.push(image.to_string_lossy().into_owned());
    let mut cmd = cmd!(SGDISK);
    cmd.extend_args(&args);
    ParentEnv.run(cmd)?;
    Ok(())
}
