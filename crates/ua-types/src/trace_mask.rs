//! Process-wide trace mask.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Bit set selecting which categories of general trace output are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceMask(pub u32);

impl TraceMask {
    pub const NONE: Self = Self(0x000);
    pub const ERROR: Self = Self(0x001);
    pub const INFORMATION: Self = Self(0x002);
    /// Include the long-form error description in exception events.
    pub const STACK_TRACE: Self = Self(0x004);
    pub const SERVICE: Self = Self(0x008);
    pub const SERVICE_DETAIL: Self = Self(0x010);
    pub const OPERATION: Self = Self(0x020);
    pub const OPERATION_DETAIL: Self = Self(0x040);
    pub const START_STOP: Self = Self(0x080);
    pub const EXTERNAL_SYSTEM: Self = Self(0x100);
    pub const SECURITY: Self = Self(0x200);
    pub const ALL: Self = Self(0x3FF);

    const NAMES: [(&'static str, Self); 12] = [
        ("none", Self::NONE),
        ("error", Self::ERROR),
        ("information", Self::INFORMATION),
        ("stack_trace", Self::STACK_TRACE),
        ("service", Self::SERVICE),
        ("service_detail", Self::SERVICE_DETAIL),
        ("operation", Self::OPERATION),
        ("operation_detail", Self::OPERATION_DETAIL),
        ("start_stop", Self::START_STOP),
        ("external_system", Self::EXTERNAL_SYSTEM),
        ("security", Self::SECURITY),
        ("all", Self::ALL),
    ];

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Looks up a single mask by its lowercase snake-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, mask)| *mask)
    }
}

impl std::ops::BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TraceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::str::FromStr for TraceMask {
    type Err = ParseTraceMaskError;

    /// Parses a comma-separated list of names, or a decimal / `0x` hex number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u32::from_str_radix(hex, 16)
                .map(Self)
                .map_err(|_| ParseTraceMaskError(s.to_string()));
        }
        if let Ok(bits) = trimmed.parse::<u32>() {
            return Ok(Self(bits));
        }

        let mut mask = Self::NONE;
        for part in trimmed.split(',').filter(|p| !p.trim().is_empty()) {
            mask |= Self::from_name(part).ok_or_else(|| ParseTraceMaskError(part.to_string()))?;
        }
        Ok(mask)
    }
}

/// Error returned when a trace mask string names an unknown category.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown trace mask: {0}")]
pub struct ParseTraceMaskError(pub String);

/// Shared, updatable view of the process trace mask.
///
/// Cloning the handle shares the underlying value. Readers always see the
/// latest value stored by any clone.
#[derive(Debug, Clone, Default)]
pub struct TraceMaskHandle(Arc<AtomicU32>);

impl TraceMaskHandle {
    /// Creates a handle holding `mask`.
    pub fn new(mask: TraceMask) -> Self {
        Self(Arc::new(AtomicU32::new(mask.0)))
    }

    /// Returns the current mask.
    pub fn get(&self) -> TraceMask {
        TraceMask(self.0.load(Ordering::Relaxed))
    }

    /// Replaces the mask for every clone of this handle.
    pub fn set(&self, mask: TraceMask) {
        self.0.store(mask.0, Ordering::Relaxed);
    }

    /// Returns `true` if all bits of `mask` are currently set.
    pub fn contains(&self, mask: TraceMask) -> bool {
        self.get().contains(mask)
    }
}
