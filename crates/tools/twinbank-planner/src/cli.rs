//! Definition of the command line interface (CLI).

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use twinbank_layout::{
    disk::sgdisk,
    introspect::{introspect_images, verify_compatible},
    layout::{Disk, PartitionLayout, PartitionPlan},
    Anyhow, BuildPlan,
};

use crate::config::{load_config, PlannerConfig};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// Path to the `twinbank.toml` configuration file.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Print debug output.
    #[clap(long, short, global = true)]
    pub verbose: bool,
    #[clap(flatten)]
    pub geometry: GeometryArgs,
    /// The command to execute.
    #[clap(subcommand)]
    pub command: Command,
}

/// Overrides of the configuration file.
#[derive(Debug, ClapArgs)]
pub struct GeometryArgs {
    /// Size of the OS image in GiB.
    #[clap(long, global = true)]
    pub os_image_gib: Option<u64>,
    /// Size of the data image in GiB.
    #[clap(long, global = true)]
    pub data_image_gib: Option<u64>,
    /// Partition plan (`split` or `unified`).
    #[clap(long, global = true)]
    pub partition_plan: Option<String>,
    /// Whether to create two banks for in-place updates (`yes` or `no`).
    #[clap(long, global = true)]
    pub update_mode: Option<String>,
}

/// Images to operate on.
#[derive(Debug, ClapArgs)]
pub struct ImageArgs {
    /// The OS image.
    #[clap(long)]
    pub os_image: PathBuf,
    /// The data image of the split plan.
    #[clap(long)]
    pub data_image: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the computed partition layout.
    Plan {
        /// Print the layout as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Print the `sgdisk` arguments creating the partitions.
    Instructions,
    /// Create the partitions on the given images.
    Partition(ImageArgs),
    /// Print the layout recovered from existing images.
    Introspect {
        #[clap(flatten)]
        images: ImageArgs,
        /// Print the layout as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Check that existing images have the computed layout.
    Verify(ImageArgs),
}

impl GeometryArgs {
    /// Apply the overrides to the configuration.
    fn apply(&self, config: &mut PlannerConfig) {
        if let Some(os_image_gib) = self.os_image_gib {
            config.os_image_gib = os_image_gib;
        }
        if let Some(data_image_gib) = self.data_image_gib {
            config.data_image_gib = data_image_gib;
        }
        if let Some(plan) = &self.partition_plan {
            config.partition_plan = plan.clone();
        }
        if let Some(update_mode) = &self.update_mode {
            config.update_mode = update_mode.clone();
        }
    }
}

fn compute_plan(args: &Args) -> Anyhow<BuildPlan> {
    let mut config = load_config(args.config.as_deref())?;
    args.geometry.apply(&mut config);
    Ok(BuildPlan::compute(
        config.geometry(),
        config.plan()?,
        config.update_mode()?,
    )?)
}

fn print_layout(layout: &PartitionLayout, json: bool) -> Anyhow<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(layout)?);
        return Ok(());
    }
    println!(
        "plan: {}, update mode: {}",
        layout.plan(),
        layout.update_mode()
    );
    for (key, extent) in layout.iter() {
        println!(
            "{:<12} {:<5} offset={:<8} size={}",
            key.to_string(),
            extent.disk.to_string(),
            extent.offset.into_value(),
            extent.size.into_value()
        );
    }
    Ok(())
}

fn check_images(plan: &BuildPlan, images: &ImageArgs) -> Anyhow<()> {
    match (plan.layout.plan(), &images.data_image) {
        (PartitionPlan::Split, None) => bail!("the split plan requires a data image"),
        (PartitionPlan::Unified, Some(data_image)) => {
            bail!("the unified plan has no data image, got {data_image:?}")
        }
        _ => Ok(()),
    }
}

fn partition(plan: &BuildPlan, images: &ImageArgs) -> Anyhow<()> {
    check_images(plan, images)?;
    sgdisk::apply(&images.os_image, plan.instructions_for(Disk::Os))?;
    if let Some(data_image) = &images.data_image {
        sgdisk::apply(data_image, plan.instructions_for(Disk::Data))?;
    }
    Ok(())
}

fn verify(plan: &BuildPlan, images: &ImageArgs) -> Anyhow<()> {
    check_images(plan, images)?;
    let recovered = introspect_images(&images.os_image, images.data_image.as_deref())?;
    verify_compatible(&plan.layout, &recovered)?;
    info!("layout of {:?} matches", images.os_image);
    Ok(())
}

fn print_instructions(plan: &BuildPlan, disk: Disk, image: &Path) {
    let args = sgdisk::sgdisk_args(plan.instructions_for(disk));
    if args.len() > 1 {
        println!("sgdisk {} {}", args.join(" "), image.display());
    }
}

pub fn run(args: Args) -> Anyhow<()> {
    match &args.command {
        Command::Plan { json } => {
            let plan = compute_plan(&args)?;
            print_layout(&plan.layout, *json)?;
        }
        Command::Instructions => {
            let plan = compute_plan(&args)?;
            print_instructions(&plan, Disk::Os, Path::new("<os-image>"));
            print_instructions(&plan, Disk::Data, Path::new("<data-image>"));
        }
        Command::Partition(images) => {
            let plan = compute_plan(&args)?;
            partition(&plan, images)?;
        }
        Command::Introspect { images, json } => {
            let layout = introspect_images(&images.os_image, images.data_image.as_deref())?;
            print_layout(&layout, *json)?;
        }
        Command::Verify(images) => {
            let plan = compute_plan(&args)?;
            verify(&plan, images)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "twinbank-planner",
            "plan",
            "--os-image-gib",
            "3",
            "--partition-plan",
            "unified",
        ]);
        let mut config = PlannerConfig::default();
        args.geometry.apply(&mut config);
        assert_eq!(config.os_image_gib, 3);
        assert_eq!(config.data_image_gib, 20);
        assert_eq!(config.partition_plan, "unified");
        assert!(matches!(args.command, Command::Plan { json: false }));
    }
}
