//! Synthetic population records and the provider seam.
//!
//! The engine does not generate populations or interpret their demographic
//! shape; it only reads the named attributes the behavior model's closed-form
//! equations require.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Device class a member primarily uses. The one categorical attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Full-size screen and keyboard; the low-friction baseline.
    Desktop,
    /// Small screen, higher interaction friction.
    Mobile,
    /// Uses the product through a helper (support agent, family member).
    Assisted,
}

impl DeviceClass {
    /// Extra friction attributable to the device context.
    #[must_use]
    pub const fn friction(self) -> f64 {
        match self {
            Self::Desktop => 0.0,
            Self::Mobile => 0.05,
            Self::Assisted => 0.10,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
            Self::Assisted => write!(f, "assisted"),
        }
    }
}

/// The replaceable member attributes, named for attribution and partial
/// dependence output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Attribute {
    DigitalLiteracy,
    RiskTolerance,
    EffortTolerance,
    Device,
}

impl Attribute {
    /// All attributes, in canonical order.
    pub const ALL: [Self; 4] = [
        Self::DigitalLiteracy,
        Self::RiskTolerance,
        Self::EffortTolerance,
        Self::Device,
    ];

    /// Whether the attribute is numeric (mean-replaceable) rather than
    /// categorical (mode-replaceable).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Device)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigitalLiteracy => write!(f, "digital_literacy"),
            Self::RiskTolerance => write!(f, "risk_tolerance"),
            Self::EffortTolerance => write!(f, "effort_tolerance"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// One synthetic population member.
///
/// Numeric attributes are scores in [0.0, 1.0]. The engine treats the record
/// as opaque beyond these accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationMember {
    /// Stable member identifier within its population.
    pub id: u64,
    /// Comfort with digital products.
    pub digital_literacy: f64,
    /// Willingness to try something that feels risky.
    pub risk_tolerance: f64,
    /// Tolerance for up-front effort.
    pub effort_tolerance: f64,
    /// Primary device context.
    pub device: DeviceClass,
}

impl PopulationMember {
    /// Reads a numeric attribute by name.
    ///
    /// Returns `None` for categorical attributes.
    #[must_use]
    pub fn numeric(&self, attr: Attribute) -> Option<f64> {
        match attr {
            Attribute::DigitalLiteracy => Some(self.digital_literacy),
            Attribute::RiskTolerance => Some(self.risk_tolerance),
            Attribute::EffortTolerance => Some(self.effort_tolerance),
            Attribute::Device => None,
        }
    }

    /// Returns a copy with one numeric attribute replaced.
    ///
    /// Categorical attributes are replaced through [`Self::with_device`].
    #[must_use]
    pub fn with_numeric(&self, attr: Attribute, value: f64) -> Self {
        let mut next = self.clone();
        match attr {
            Attribute::DigitalLiteracy => next.digital_literacy = value,
            Attribute::RiskTolerance => next.risk_tolerance = value,
            Attribute::EffortTolerance => next.effort_tolerance = value,
            Attribute::Device => {}
        }
        next
    }

    /// Returns a copy with the device class replaced.
    #[must_use]
    pub fn with_device(&self, device: DeviceClass) -> Self {
        let mut next = self.clone();
        next.device = device;
        next
    }
}

/// Supplies the fixed member set for a population identifier.
///
/// Injected collaborator; the engine never queries storage directly.
pub trait PopulationProvider: Send + Sync {
    /// Fetches all members of the named population.
    ///
    /// # Errors
    ///
    /// Returns `SimError::PopulationUnavailable` when the population cannot
    /// be loaded. An existing-but-empty population is not an error here; the
    /// Monte Carlo engine rejects empty populations itself.
    fn fetch(&self, population_id: &str) -> Result<Vec<PopulationMember>, SimError>;
}

/// In-memory provider used by tests and embedded callers.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPopulation {
    members: Vec<PopulationMember>,
}

impl InMemoryPopulation {
    /// Wraps a fixed member list.
    #[must_use]
    pub fn new(members: Vec<PopulationMember>) -> Self {
        Self { members }
    }

    /// Deterministic synthetic population for tests: attributes spread over
    /// [0.05, 0.95] with a device mix.
    #[must_use]
    pub fn synthetic(size: usize) -> Self {
        let members = (0..size as u64)
            .map(|id| {
                let spread = |offset: u64| {
                    let slot = (id.wrapping_mul(7).wrapping_add(offset * 13)) % 19;
                    0.05 + 0.9 * (slot as f64 / 18.0)
                };
                PopulationMember {
                    id,
                    digital_literacy: spread(0),
                    risk_tolerance: spread(1),
                    effort_tolerance: spread(2),
                    device: match id % 5 {
                        0 | 1 => DeviceClass::Desktop,
                        2 | 3 => DeviceClass::Mobile,
                        _ => DeviceClass::Assisted,
                    },
                }
            })
            .collect();
        Self { members }
    }

    /// Borrow the member list.
    #[must_use]
    pub fn members(&self) -> &[PopulationMember] {
        &self.members
    }
}

impl PopulationProvider for InMemoryPopulation {
    fn fetch(&self, _population_id: &str) -> Result<Vec<PopulationMember>, SimError> {
        Ok(self.members.clone())
    }
}

impl PopulationProvider for Arc<InMemoryPopulation> {
    fn fetch(&self, population_id: &str) -> Result<Vec<PopulationMember>, SimError> {
        self.as_ref().fetch(population_id)
    }
}
