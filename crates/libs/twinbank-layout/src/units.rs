//! Simple unit system to keep mebibytes and sectors apart via the type system.

use std::marker::PhantomData;

/// Trait to be implemented by units.
pub trait Unit {
    /// Name of the unit.
    ///
    /// Should be capitalized.
    fn name() -> &'static str;

    /// Symbol of the unit.
    fn symbol() -> &'static str;
}

/// A quantity has a value of some type and a unit.
pub struct Quantity<N, U> {
    value: N,
    unit: PhantomData<fn(&U)>,
}

impl<N, U> Quantity<N, U> {
    /// Construct the quantity from the given value.
    pub const fn from_value(raw: N) -> Self {
        Self {
            value: raw,
            unit: PhantomData,
        }
    }

    /// Convert the quantity to the raw value.
    pub const fn into_value(self) -> N
    where
        N: Copy,
    {
        self.value
    }
}

impl<U> Quantity<u64, U> {
    /// Subtract `rhs` returning [`None`] on underflow.
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.value.checked_sub(rhs.value) {
            Some(value) => Some(Self::from_value(value)),
            None => None,
        }
    }

    /// Add `rhs` returning [`None`] on overflow.
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.value.checked_add(rhs.value) {
            Some(value) => Some(Self::from_value(value)),
            None => None,
        }
    }

    /// Multiply by `factor` returning [`None`] on overflow.
    pub const fn checked_mul(self, factor: u64) -> Option<Self> {
        match self.value.checked_mul(factor) {
            Some(value) => Some(Self::from_value(value)),
            None => None,
        }
    }

    /// Whether the quantity is zero.
    pub const fn is_zero(self) -> bool {
        self.value == 0
    }
}

impl<N: std::fmt::Display, U: Unit> std::fmt::Display for Quantity<N, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{} {}", self.value, U::symbol()))
    }
}

impl<N: std::fmt::Display, U: Unit> std::fmt::Debug for Quantity<N, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}({})", U::name(), self.value))
    }
}

impl<N: Clone, U> Clone for Quantity<N, U> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            unit: PhantomData,
        }
    }
}

impl<N: Copy, U> Copy for Quantity<N, U> {}

impl<N: Copy + std::ops::Add<N, Output = N>, U> std::ops::Add for Quantity<N, U> {
    type Output = Quantity<N, U>;

    fn add(self, rhs: Self) -> Self::Output {
        Quantity::from_value(self.value + rhs.value)
    }
}

impl<N: Copy + std::ops::Mul<N, Output = N>, U> std::ops::Mul<N> for Quantity<N, U> {
    type Output = Quantity<N, U>;

    fn mul(self, rhs: N) -> Self::Output {
        Quantity::from_value(self.value * rhs)
    }
}

impl<N: PartialEq, U> PartialEq for Quantity<N, U> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<N: Eq, U> Eq for Quantity<N, U> {}

impl<N: PartialOrd, U> PartialOrd for Quantity<N, U> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<N: Ord, U> Ord for Quantity<N, U> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<N: std::hash::Hash, U> std::hash::Hash for Quantity<N, U> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<N: serde::Serialize, U> serde::Serialize for Quantity<N, U> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de, N: serde::Deserialize<'de>, U> serde::Deserialize<'de> for Quantity<N, U> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        N::deserialize(deserializer).map(Self::from_value)
    }
}

/// Mebibytes unit.
pub struct MebibytesUnit(());

impl Unit for MebibytesUnit {
    fn name() -> &'static str {
        "NumMebibytes"
    }

    fn symbol() -> &'static str {
        "MiB"
    }
}

/// Number of mebibytes.
pub type NumMebibytes = Quantity<u64, MebibytesUnit>;

/// Sectors unit.
pub struct SectorsUnit(());

impl Unit for SectorsUnit {
    fn name() -> &'static str {
        "NumSectors"
    }

    fn symbol() -> &'static str {
        "sectors"
    }
}

/// Number of 512-byte sectors.
pub type NumSectors = Quantity<u64, SectorsUnit>;

/// Size of a sector in bytes.
pub const SECTOR_SIZE: u64 = 512;

/// Number of sectors in one mebibyte.
pub const SECTORS_PER_MIB: u64 = (1 << 20) / SECTOR_SIZE;

impl NumMebibytes {
    /// Number of mebibytes in the given number of gibibytes, [`None`] on overflow.
    pub const fn gibibytes(gib: u64) -> Option<Self> {
        Self::from_value(gib).checked_mul(1024)
    }

    /// Convert to the number of sectors, [`None`] on overflow.
    pub const fn to_sectors(self) -> Option<NumSectors> {
        match self.value.checked_mul(SECTORS_PER_MIB) {
            Some(value) => Some(NumSectors::from_value(value)),
            None => None,
        }
    }
}

impl NumSectors {
    /// Convert to mebibytes if the number of sectors is 1-MiB aligned.
    pub const fn to_mebibytes_exact(self) -> Option<NumMebibytes> {
        if self.value % SECTORS_PER_MIB == 0 {
            Some(NumMebibytes::from_value(self.value / SECTORS_PER_MIB))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_conversion() {
        assert_eq!(
            NumMebibytes::from_value(1).to_sectors(),
            Some(NumSectors::from_value(2048))
        );
        assert!(NumMebibytes::from_value(u64::MAX / 2048).to_sectors().is_some());
        assert_eq!(NumMebibytes::from_value(u64::MAX / 2048 + 1).to_sectors(), None);
        assert_eq!(
            NumSectors::from_value(4096).to_mebibytes_exact(),
            Some(NumMebibytes::from_value(2))
        );
        assert_eq!(NumSectors::from_value(4097).to_mebibytes_exact(), None);
    }

    #[test]
    fn test_checked_arithmetic() {
        let five = NumMebibytes::from_value(5);
        assert_eq!(
            five.checked_sub(NumMebibytes::from_value(2)),
            Some(NumMebibytes::from_value(3))
        );
        assert_eq!(five.checked_sub(NumMebibytes::from_value(6)), None);
        assert_eq!(five.checked_add(five), Some(NumMebibytes::from_value(10)));
        assert_eq!(NumMebibytes::from_value(u64::MAX).checked_add(five), None);
        assert_eq!(five.checked_mul(u64::MAX), None);
        assert_eq!(NumMebibytes::gibibytes(2), Some(NumMebibytes::from_value(2048)));
        assert_eq!(NumMebibytes::gibibytes(u64::MAX / 512), None);
        assert_eq!(format!("{five}"), "5 MiB");
    }
}
