//! Fixed sizes, scaling factors, and identifiers of the partition layout.
//!
//! Everything in here is part of the on-disk contract. Firmware and early boot match on
//! the identifiers and previously shipped images depend on the sizes for in-place
//! updates. Never change any of these values.

use crate::units::NumMebibytes;

/// Reservation for the primary or backup GPT of a disk.
pub const GPT_RESERVATION: NumMebibytes = NumMebibytes::from_value(1);

/// Size of the BIOS boot partition.
pub const BIOS_SIZE: NumMebibytes = NumMebibytes::from_value(4);

/// Size of an EFI system partition of one bank in in-place mode.
pub const EFI_SIZE: NumMebibytes = NumMebibytes::from_value(5);

/// Size of the data partition placed on the OS image in the split plan.
pub const INITIAL_DATA_SIZE: NumMebibytes = NumMebibytes::from_value(1);

/// Mebibytes per gibibyte of OS image for each scaled partition class.
pub mod scaling {
    /// Boot partition.
    pub const BOOT: u64 = 20;
    /// Root filesystem partition.
    pub const ROOT: u64 = 460;
    /// Verity hash tree partition.
    pub const HASH: u64 = 5;
    /// Reserved partition, before subtracting the EFI partition.
    pub const RESERVE: u64 = 15;
    /// Private partition, before subtracting the fixed reservations.
    pub const PRIVATE: u64 = 24;
}

/// GPT partition types.
pub mod gpt_types {
    use uuid::{uuid, Uuid};

    /// BIOS boot partition (`ef02`).
    pub const BIOS_BOOT: Uuid = uuid!("21686148-6449-6E6F-744E-656564454649");
    /// EFI system partition (`ef00`).
    pub const EFI_SYSTEM: Uuid = uuid!("C12A7328-F81F-11D2-BA4B-00A0C93EC93B");
    /// Backup of the EFI system partition, ignored by firmware.
    ///
    /// The hex digits of [`EFI_SYSTEM`] in reverse order.
    pub const EFI_BACKUP: Uuid = uuid!("B39CE39C-0A00-B4AB-2D11-F18F8237A21C");
    /// Boot partitions of both banks.
    pub const BOOT: Uuid = uuid!("6B636168-7420-6568-2070-6C616E657421");
    /// Root partitions of both banks.
    pub const ROOT: Uuid = uuid!("5526016A-1A97-4EA4-B39A-B7C8C6CA4502");
    /// Hash partitions of both banks.
    pub const HASH: Uuid = uuid!("598F10AF-C955-4456-6A99-7720068A6CEA");
    /// Reserved partitions of both banks.
    pub const RESERVED: Uuid = uuid!("0C5D99A5-D331-4147-BAEF-08E2B855BDC9");
    /// Private partition.
    pub const PRIVATE: Uuid = uuid!("440408BB-EB0B-4328-A6E5-A29038FAD706");
    /// Data partitions.
    pub const DATA: Uuid = uuid!("626F7474-6C65-6474-6861-726D61726B73");
}

/// Fixed partition GUIDs of the data partitions.
///
/// Early boot mounts the partition with the preferred GUID if it exists and falls back
/// to the other one otherwise.
pub mod data_guids {
    use uuid::{uuid, Uuid};

    /// Data partition to mount first.
    pub const PREFERRED: Uuid = uuid!("5B94E8DF-28B8-485C-9D19-362263B5944C");
    /// Data partition to mount when the preferred one is absent.
    pub const FALLBACK: Uuid = uuid!("69040874-417D-4E26-A764-7885F22007EA");
}

/// Partition labels.
pub mod labels {
    /// Prefix of the labels of bank partitions and the private partition.
    pub const LABEL_PREFIX: &str = "TWINBANK-";
    /// BIOS boot partition.
    pub const BIOS_BOOT: &str = "BIOS-BOOT";
    /// EFI system partition of bank A.
    pub const EFI_SYSTEM: &str = "EFI-SYSTEM";
    /// EFI system partition of bank B.
    pub const EFI_BACKUP: &str = "EFI-BACKUP";
    /// Private partition.
    pub const PRIVATE: &str = "TWINBANK-PRIVATE";
}

/// GPT attribute bits used by the bootloader to pick the active bank.
pub mod attribute_bits {
    /// Priority and remaining tries.
    pub const PRIORITY: u8 = 48;
    /// The bank has booted successfully.
    pub const SUCCESSFUL: u8 = 56;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efi_backup_is_reversed_efi_system() {
        let forward = gpt_types::EFI_SYSTEM.simple().to_string();
        let backward = gpt_types::EFI_BACKUP.simple().to_string();
        assert_eq!(forward.chars().rev().collect::<String>(), backward);
    }

    #[test]
    fn test_data_guids_differ() {
        assert_ne!(data_guids::PREFERRED, data_guids::FALLBACK);
    }
}
