//! Partition layouts and the forward planner computing them from an image geometry.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    catalog::{scaling, BIOS_SIZE, EFI_SIZE, GPT_RESERVATION, INITIAL_DATA_SIZE},
    error::{LayoutError, LayoutResult},
    units::NumMebibytes,
};

/// Whether the OS and the mutable data live on separate disks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPlan {
    /// Data lives on its own disk, the OS disk carries a tiny initial data partition.
    Split,
    /// Data lives on the OS disk right after the private partition.
    Unified,
}

impl FromStr for PartitionPlan {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "split" => Ok(Self::Split),
            "unified" => Ok(Self::Unified),
            _ => Err(LayoutError::Configuration {
                setting: "partition plan",
                value: s.to_owned(),
                expected: "\"split\" or \"unified\"",
            }),
        }
    }
}

impl std::fmt::Display for PartitionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionPlan::Split => f.write_str("split"),
            PartitionPlan::Unified => f.write_str("unified"),
        }
    }
}

/// Whether two redundant OS banks exist for active/passive updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UpdateMode {
    /// Two banks, updates are written to the passive one.
    #[serde(rename = "yes")]
    InPlace,
    /// One bank of twice the size.
    #[serde(rename = "no")]
    SingleBank,
}

impl UpdateMode {
    /// The banks existing in this mode.
    pub const fn banks(self) -> &'static [Bank] {
        match self {
            UpdateMode::InPlace => &[Bank::A, Bank::B],
            UpdateMode::SingleBank => &[Bank::A],
        }
    }

    /// Factor applied to the in-place size of every bank partition.
    const fn bank_scale(self) -> u64 {
        match self {
            UpdateMode::InPlace => 1,
            UpdateMode::SingleBank => 2,
        }
    }
}

impl FromStr for UpdateMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::InPlace),
            "no" => Ok(Self::SingleBank),
            _ => Err(LayoutError::Configuration {
                setting: "update mode",
                value: s.to_owned(),
                expected: "\"yes\" or \"no\"",
            }),
        }
    }
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateMode::InPlace => f.write_str("yes"),
            UpdateMode::SingleBank => f.write_str("no"),
        }
    }
}

/// OS bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    A,
    B,
}

impl Bank {
    /// Keys of the partitions of the bank in placement order.
    pub const fn keys(self) -> [PartitionKey; 5] {
        match self {
            Bank::A => [
                PartitionKey::EfiA,
                PartitionKey::BootA,
                PartitionKey::RootA,
                PartitionKey::HashA,
                PartitionKey::ReservedA,
            ],
            Bank::B => [
                PartitionKey::EfiB,
                PartitionKey::BootB,
                PartitionKey::RootB,
                PartitionKey::HashB,
                PartitionKey::ReservedB,
            ],
        }
    }

    /// Letter of the bank as used in labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Bank::A => "A",
            Bank::B => "B",
        }
    }
}

/// Class of a partition, shared by both banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionClass {
    Bios,
    Efi,
    Boot,
    Root,
    Hash,
    Reserved,
    Private,
    Data,
}

impl PartitionClass {
    /// Name of the class as used in labels and keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            PartitionClass::Bios => "BIOS",
            PartitionClass::Efi => "EFI",
            PartitionClass::Boot => "BOOT",
            PartitionClass::Root => "ROOT",
            PartitionClass::Hash => "HASH",
            PartitionClass::Reserved => "RESERVED",
            PartitionClass::Private => "PRIVATE",
            PartitionClass::Data => "DATA",
        }
    }
}

/// Disk an entry of the layout lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Disk {
    /// The OS image.
    Os,
    /// The separate data image of the split plan.
    Data,
}

impl std::fmt::Display for Disk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disk::Os => f.write_str("os"),
            Disk::Data => f.write_str("data"),
        }
    }
}

/// Identity of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    Bios,
    EfiA,
    EfiB,
    BootA,
    BootB,
    RootA,
    RootB,
    HashA,
    HashB,
    ReservedA,
    ReservedB,
    Private,
    DataA,
    DataB,
}

impl PartitionKey {
    /// All keys.
    pub const ALL: [PartitionKey; 14] = [
        PartitionKey::Bios,
        PartitionKey::EfiA,
        PartitionKey::EfiB,
        PartitionKey::BootA,
        PartitionKey::BootB,
        PartitionKey::RootA,
        PartitionKey::RootB,
        PartitionKey::HashA,
        PartitionKey::HashB,
        PartitionKey::ReservedA,
        PartitionKey::ReservedB,
        PartitionKey::Private,
        PartitionKey::DataA,
        PartitionKey::DataB,
    ];

    /// Class of the partition.
    pub const fn class(self) -> PartitionClass {
        match self {
            PartitionKey::Bios => PartitionClass::Bios,
            PartitionKey::EfiA | PartitionKey::EfiB => PartitionClass::Efi,
            PartitionKey::BootA | PartitionKey::BootB => PartitionClass::Boot,
            PartitionKey::RootA | PartitionKey::RootB => PartitionClass::Root,
            PartitionKey::HashA | PartitionKey::HashB => PartitionClass::Hash,
            PartitionKey::ReservedA | PartitionKey::ReservedB => PartitionClass::Reserved,
            PartitionKey::Private => PartitionClass::Private,
            PartitionKey::DataA | PartitionKey::DataB => PartitionClass::Data,
        }
    }

    /// Bank of the partition, if it is per bank.
    pub const fn bank(self) -> Option<Bank> {
        match self {
            PartitionKey::Bios | PartitionKey::Private => None,
            PartitionKey::EfiA
            | PartitionKey::BootA
            | PartitionKey::RootA
            | PartitionKey::HashA
            | PartitionKey::ReservedA
            | PartitionKey::DataA => Some(Bank::A),
            PartitionKey::EfiB
            | PartitionKey::BootB
            | PartitionKey::RootB
            | PartitionKey::HashB
            | PartitionKey::ReservedB
            | PartitionKey::DataB => Some(Bank::B),
        }
    }

    /// Disk the partition is placed on.
    pub const fn disk(self) -> Disk {
        match self {
            PartitionKey::DataB => Disk::Data,
            _ => Disk::Os,
        }
    }

    /// Keys existing for the given plan and update mode in placement order.
    pub fn required(plan: PartitionPlan, update_mode: UpdateMode) -> Vec<PartitionKey> {
        let mut keys = vec![PartitionKey::Bios];
        for bank in update_mode.banks() {
            keys.extend(bank.keys());
        }
        keys.push(PartitionKey::Private);
        keys.push(PartitionKey::DataA);
        if plan == PartitionPlan::Split {
            keys.push(PartitionKey::DataB);
        }
        keys
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.class().as_str())?;
        if let Some(bank) = self.bank() {
            f.write_str("-")?;
            f.write_str(bank.as_str())?;
        }
        Ok(())
    }
}

impl Serialize for PartitionKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Requested size of the images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageGeometry {
    /// Size of the OS image in GiB.
    pub os_image_gib: u64,
    /// Size of the data image in GiB.
    pub data_image_gib: u64,
}

impl ImageGeometry {
    /// Create a geometry.
    pub const fn new(os_image_gib: u64, data_image_gib: u64) -> Self {
        Self {
            os_image_gib,
            data_image_gib,
        }
    }

    /// Capacity of the given disk, [`None`] if it exceeds 64 bits.
    pub fn capacity(&self, disk: Disk, plan: PartitionPlan) -> Option<NumMebibytes> {
        let gib = match (disk, plan) {
            (Disk::Os, PartitionPlan::Split) => self.os_image_gib,
            (Disk::Os, PartitionPlan::Unified) => {
                self.os_image_gib.checked_add(self.data_image_gib)?
            }
            (Disk::Data, _) => self.data_image_gib,
        };
        NumMebibytes::gibibytes(gib)
    }
}

/// Location and size of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Extent {
    /// Disk of the partition.
    pub disk: Disk,
    /// Offset of the first byte.
    pub offset: NumMebibytes,
    /// Size of the partition.
    pub size: NumMebibytes,
}

impl Extent {
    /// Offset just after the partition.
    ///
    /// Never overflows for extents of a [`PartitionLayout`].
    pub fn end(&self) -> NumMebibytes {
        self.offset + self.size
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "offset {}, size {} on {} disk",
            self.offset, self.size, self.disk
        )
    }
}

/// Complete, gap-free table of partition extents.
///
/// Entries are kept in placement order. The size of every disk, including its backup
/// GPT, is addressable with 512-byte sectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionLayout {
    plan: PartitionPlan,
    update_mode: UpdateMode,
    partitions: IndexMap<PartitionKey, Extent>,
}

impl PartitionLayout {
    /// Create a layout from entries in placement order and check its invariants.
    pub fn from_entries(
        plan: PartitionPlan,
        update_mode: UpdateMode,
        partitions: IndexMap<PartitionKey, Extent>,
    ) -> LayoutResult<Self> {
        let layout = Self {
            plan,
            update_mode,
            partitions,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn plan(&self) -> PartitionPlan {
        self.plan
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    /// Extent of the given partition.
    pub fn get(&self, key: PartitionKey) -> Option<Extent> {
        self.partitions.get(&key).copied()
    }

    /// Iterator over the entries in placement order.
    pub fn iter(&self) -> impl Iterator<Item = (PartitionKey, Extent)> + '_ {
        self.partitions.iter().map(|(key, extent)| (*key, *extent))
    }

    /// Iterator over the entries on the given disk in placement order.
    pub fn on_disk(&self, disk: Disk) -> impl Iterator<Item = (PartitionKey, Extent)> + '_ {
        self.iter().filter(move |(_, extent)| extent.disk == disk)
    }

    /// Keys in placement order.
    pub fn keys(&self) -> impl Iterator<Item = PartitionKey> + '_ {
        self.partitions.keys().copied()
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether the layout has no partitions.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// End of the last partition on the given disk.
    pub fn end(&self, disk: Disk) -> Option<NumMebibytes> {
        self.on_disk(disk).last().map(|(_, extent)| extent.end())
    }

    /// Space taken on the given disk including the backup GPT.
    pub fn disk_size(&self, disk: Disk) -> Option<NumMebibytes> {
        self.end(disk).map(|end| end + GPT_RESERVATION)
    }

    /// Check the structural invariants of the layout.
    ///
    /// - Exactly the keys of the plan and update mode exist, in placement order.
    /// - Every partition lives on its disk and has a positive size.
    /// - Partitions on a disk start right after the primary GPT and are contiguous.
    /// - Every disk, including its backup GPT, is addressable with 512-byte sectors.
    pub fn validate(&self) -> LayoutResult<()> {
        let required = PartitionKey::required(self.plan, self.update_mode);
        let actual = self.keys().collect::<Vec<_>>();
        if actual != required {
            return Err(LayoutError::inconsistent(format!(
                "expected partitions {} but found {}",
                display_keys(&required),
                display_keys(&actual)
            )));
        }
        for disk in [Disk::Os, Disk::Data] {
            let mut next_offset = GPT_RESERVATION;
            for (key, extent) in self.on_disk(disk) {
                if key.disk() != disk {
                    return Err(LayoutError::inconsistent(format!(
                        "partition {key} must not be on the {disk} disk"
                    )));
                }
                if extent.size.is_zero() {
                    return Err(LayoutError::inconsistent(format!(
                        "partition {key} is empty"
                    )));
                }
                if extent.offset != next_offset {
                    return Err(LayoutError::inconsistent(format!(
                        "partition {key} starts at {} instead of {next_offset}",
                        extent.offset
                    )));
                }
                next_offset = addressable_end(extent).ok_or_else(|| {
                    LayoutError::inconsistent(format!(
                        "partition {key} ends beyond the last addressable sector"
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// End of the extent if it and the backup GPT after it are addressable with sectors.
fn addressable_end(extent: Extent) -> Option<NumMebibytes> {
    let end = extent.offset.checked_add(extent.size)?;
    end.checked_add(GPT_RESERVATION)?.to_sectors()?;
    Some(end)
}

fn display_keys(keys: &[PartitionKey]) -> String {
    keys.iter()
        .map(PartitionKey::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Places partitions back to back on the disks.
struct Placer {
    partitions: IndexMap<PartitionKey, Extent>,
    next_os: NumMebibytes,
    next_data: NumMebibytes,
}

impl Placer {
    fn new() -> Self {
        Self {
            partitions: IndexMap::new(),
            next_os: GPT_RESERVATION,
            next_data: GPT_RESERVATION,
        }
    }

    fn place(&mut self, key: PartitionKey, size: NumMebibytes) -> LayoutResult<()> {
        if size.is_zero() {
            return Err(LayoutError::arithmetic_range(key, "computed size is 0 MiB"));
        }
        let disk = key.disk();
        let next = match disk {
            Disk::Os => &mut self.next_os,
            Disk::Data => &mut self.next_data,
        };
        let extent = Extent {
            disk,
            offset: *next,
            size,
        };
        *next = addressable_end(extent).ok_or_else(|| {
            LayoutError::arithmetic_range(
                key,
                format!(
                    "{size} at {} ends beyond the last addressable sector",
                    extent.offset
                ),
            )
        })?;
        debug!("placing {key} at {} with {size}", extent.offset);
        self.partitions.insert(key, extent);
        Ok(())
    }
}

/// Scale a per-GiB size by the size of the OS image.
fn scaled(key: PartitionKey, os_image_gib: u64, per_gib: u64) -> LayoutResult<NumMebibytes> {
    os_image_gib
        .checked_mul(per_gib)
        .map(NumMebibytes::from_value)
        .ok_or_else(|| LayoutError::arithmetic_range(key, "size exceeds 64 bits"))
}

/// Sizes of the partitions of a single bank in in-place mode, in placement order.
fn in_place_bank_sizes(bank: Bank, os_image_gib: u64) -> LayoutResult<[NumMebibytes; 5]> {
    let [efi, boot, root, hash, reserved] = bank.keys();
    let reserve = scaled(reserved, os_image_gib, scaling::RESERVE)?;
    Ok([
        EFI_SIZE,
        scaled(boot, os_image_gib, scaling::BOOT)?,
        scaled(root, os_image_gib, scaling::ROOT)?,
        scaled(hash, os_image_gib, scaling::HASH)?,
        reserve.checked_sub(EFI_SIZE).ok_or_else(|| {
            LayoutError::arithmetic_range(
                reserved,
                format!("reserve of {reserve} is smaller than the {efi} partition"),
            )
        })?,
    ])
}

/// Size of the private partition.
///
/// Both GPT reservations, the BIOS boot partition, and the initial data partition are
/// carved out of the private budget, each exactly once.
fn private_size(os_image_gib: u64) -> LayoutResult<NumMebibytes> {
    let budget = scaled(PartitionKey::Private, os_image_gib, scaling::PRIVATE)?;
    let overhead = GPT_RESERVATION * 2 + BIOS_SIZE + INITIAL_DATA_SIZE;
    budget.checked_sub(overhead).ok_or_else(|| {
        LayoutError::arithmetic_range(
            PartitionKey::Private,
            format!("budget of {budget} does not cover the fixed overhead of {overhead}"),
        )
    })
}

/// Compute the layout for the given geometry, plan, and update mode.
///
/// Fails with [`LayoutError::ArithmeticRange`] if any partition would end up with a
/// non-positive size or any disk would not be addressable with 512-byte sectors.
pub fn plan_layout(
    geometry: ImageGeometry,
    plan: PartitionPlan,
    update_mode: UpdateMode,
) -> LayoutResult<PartitionLayout> {
    let os_image_gib = geometry.os_image_gib;
    if os_image_gib == 0 {
        return Err(LayoutError::arithmetic_range(
            "the OS image",
            "requested size is 0 GiB",
        ));
    }
    let mut placer = Placer::new();
    placer.place(PartitionKey::Bios, BIOS_SIZE)?;
    for bank in update_mode.banks() {
        let sizes = in_place_bank_sizes(*bank, os_image_gib)?;
        for (key, size) in bank.keys().into_iter().zip(sizes) {
            let size = size.checked_mul(update_mode.bank_scale()).ok_or_else(|| {
                LayoutError::arithmetic_range(key, "size exceeds 64 bits")
            })?;
            placer.place(key, size)?;
        }
    }
    placer.place(PartitionKey::Private, private_size(os_image_gib)?)?;
    let data = NumMebibytes::gibibytes(geometry.data_image_gib).ok_or_else(|| {
        LayoutError::arithmetic_range("the data image", "size exceeds 64 bits")
    })?;
    match plan {
        PartitionPlan::Split => {
            placer.place(PartitionKey::DataA, INITIAL_DATA_SIZE)?;
            let data_size = data.checked_sub(GPT_RESERVATION * 2).ok_or_else(|| {
                LayoutError::arithmetic_range(
                    PartitionKey::DataB,
                    format!("data image of {data} cannot hold its own GPT"),
                )
            })?;
            placer.place(PartitionKey::DataB, data_size)?;
        }
        PartitionPlan::Unified => {
            placer.place(PartitionKey::DataA, data)?;
        }
    }
    let layout = PartitionLayout::from_entries(plan, update_mode, placer.partitions)?;
    for disk in [Disk::Os, Disk::Data] {
        if let Some(size) = layout.disk_size(disk) {
            let capacity = geometry.capacity(disk, plan).ok_or_else(|| {
                LayoutError::arithmetic_range(format!("the {disk} disk"), "size exceeds 64 bits")
            })?;
            if size > capacity {
                return Err(LayoutError::inconsistent(format!(
                    "{disk} disk needs {size} exceeding its capacity of {capacity}"
                )));
            }
        }
    }
    info!(
        "computed layout with {} partitions for {}+{} GiB (plan: {plan}, update mode: {update_mode})",
        layout.len(),
        geometry.os_image_gib,
        geometry.data_image_gib,
    );
    Ok(layout)
}
