//! Partition layout planning for dual-bank, verified-boot images.
//!
//! The forward planner ([`layout::plan_layout`]) turns an image geometry, a partition
//! plan, and an update mode into a gap-free table of partition extents. Labels, types,
//! and GUIDs are assigned by [`assign`], and [`instructions`] turns everything into
//! instructions for the external partitioning tool. The reverse planner
//! ([`introspect`]) recovers the same table from the partition table of existing
//! images.
//!
//! Nothing in here touches image bytes. The [`disk`] module shells out to `sfdisk` and
//! `sgdisk` for that.

use serde::Serialize;

use crate::{
    assign::Assignments,
    error::LayoutResult,
    instructions::{build_instructions, Instruction},
    layout::{plan_layout, Disk, ImageGeometry, PartitionLayout, PartitionPlan, UpdateMode},
};

pub mod assign;
pub mod catalog;
pub mod disk;
pub mod error;
pub mod instructions;
pub mod introspect;
pub mod layout;
pub mod units;

/// [`Result`] with [`anyhow::Error`] as error type.
pub type Anyhow<T> = anyhow::Result<T>;

/// Everything computed for a single build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub geometry: ImageGeometry,
    pub layout: PartitionLayout,
    #[serde(skip)]
    pub assignments: Assignments,
    pub instructions: Vec<Instruction>,
}

impl BuildPlan {
    /// Compute the layout, its assignments, and the partitioning instructions.
    pub fn compute(
        geometry: ImageGeometry,
        plan: PartitionPlan,
        update_mode: UpdateMode,
    ) -> LayoutResult<Self> {
        let layout = plan_layout(geometry, plan, update_mode)?;
        let assignments = Assignments::for_layout(&layout);
        let instructions = build_instructions(&layout, &assignments)?;
        Ok(Self {
            geometry,
            layout,
            assignments,
            instructions,
        })
    }

    /// Instructions for the given disk.
    pub fn instructions_for(&self, disk: Disk) -> impl Iterator<Item = &Instruction> {
        self.instructions
            .iter()
            .filter(move |instruction| instruction.disk == disk)
    }
}
