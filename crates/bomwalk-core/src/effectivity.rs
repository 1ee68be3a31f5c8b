//! # Effectivity Model
//!
//! Validity windows attached to part revisions (and optionally to substitute
//! links): serial-number ranges, date ranges and lot ranges.
//!
//! Every range has a mandatory lower bound and an optional upper bound; an
//! absent upper bound means "open ended". Creation without a lower bound is
//! rejected with `BomError::MissingLowerBound` before anything is stored.
//!
//! `EffectivityManager` implements the create/get/update/delete operations on
//! top of a `PartRepository`. An effectivity always belongs to exactly one
//! revision and is removed only together with it or explicitly.

use crate::catalog::PartRepository;
use crate::{BomError, ConfigurationItemKey, PartMaster, PartRevisionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// RANGES
// =============================================================================

/// The bounded quantity of an effectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectivityRange {
    SerialNumber {
        start: String,
        end: Option<String>,
    },
    Date {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
    Lot {
        start: String,
        end: Option<String>,
    },
}

impl EffectivityRange {
    /// Short name of the variant, used in messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SerialNumber { .. } => "serial number",
            Self::Date { .. } => "date",
            Self::Lot { .. } => "lot",
        }
    }
}

/// Compare two serial numbers or lot ids.
///
/// Plain decimal strings compare numerically (`"99" < "100"`), anything else
/// compares lexically.
#[must_use]
pub fn compare_ordinal(a: &str, b: &str) -> Ordering {
    fn is_decimal(s: &str) -> bool {
        !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit())
    }

    if is_decimal(a) && is_decimal(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

fn within(value: &str, start: &str, end: Option<&str>) -> bool {
    compare_ordinal(value, start) != Ordering::Less
        && end.is_none_or(|end| compare_ordinal(value, end) != Ordering::Greater)
}

fn required(value: Option<&str>, kind: &'static str) -> Result<String, BomError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(BomError::MissingLowerBound(kind)),
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

// =============================================================================
// CONTEXT
// =============================================================================

/// What an effectivity is evaluated against.
///
/// Each variant only looks at its own field: a serial-number effectivity never
/// matches a context without a serial number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivityContext {
    pub serial_number: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub lot_id: Option<String>,
    pub configuration_item: Option<ConfigurationItemKey>,
}

impl EffectivityContext {
    #[must_use]
    pub fn at_date(date: DateTime<Utc>) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_serial_number(serial: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_lot(lot_id: impl Into<String>) -> Self {
        Self {
            lot_id: Some(lot_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_configuration_item(mut self, item: ConfigurationItemKey) -> Self {
        self.configuration_item = Some(item);
        self
    }
}

// =============================================================================
// EFFECTIVITY
// =============================================================================

/// A named validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effectivity {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Product the range refers to. Mandatory for serial and lot ranges.
    #[serde(default)]
    pub configuration_item: Option<ConfigurationItemKey>,
    pub range: EffectivityRange,
}

impl Effectivity {
    /// Serial-number range `[start, end]`; `start` is mandatory.
    pub fn serial_number_based(
        id: u64,
        name: impl Into<String>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, BomError> {
        let range = EffectivityRange::SerialNumber {
            start: required(start, "serial number")?,
            end: optional(end),
        };
        Ok(Self::with_range(id, name, range))
    }

    /// Date range `[start, end]`; `start` is mandatory.
    pub fn date_based(
        id: u64,
        name: impl Into<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, BomError> {
        let start = start.ok_or(BomError::MissingLowerBound("date"))?;
        Ok(Self::with_range(id, name, EffectivityRange::Date { start, end }))
    }

    /// Lot range `[start, end]`; `start` is mandatory.
    pub fn lot_based(
        id: u64,
        name: impl Into<String>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self, BomError> {
        let range = EffectivityRange::Lot {
            start: required(start, "lot")?,
            end: optional(end),
        };
        Ok(Self::with_range(id, name, range))
    }

    fn with_range(id: u64, name: impl Into<String>, range: EffectivityRange) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            configuration_item: None,
            range,
        }
    }

    #[must_use]
    pub fn for_configuration_item(mut self, item: ConfigurationItemKey) -> Self {
        self.configuration_item = Some(item);
        self
    }

    /// Does the context fall inside this window?
    #[must_use]
    pub fn matches(&self, context: &EffectivityContext) -> bool {
        if let (Some(own), Some(asked)) = (&self.configuration_item, &context.configuration_item)
            && own != asked
        {
            return false;
        }

        match &self.range {
            EffectivityRange::SerialNumber { start, end } => context
                .serial_number
                .as_deref()
                .is_some_and(|serial| within(serial, start, end.as_deref())),
            EffectivityRange::Date { start, end } => context
                .date
                .is_some_and(|date| date >= *start && end.is_none_or(|end| date <= end)),
            EffectivityRange::Lot { start, end } => context
                .lot_id
                .as_deref()
                .is_some_and(|lot| within(lot, start, end.as_deref())),
        }
    }
}

/// True when any effectivity in the list matches.
#[must_use]
pub fn any_matches(effectivities: &[Effectivity], context: &EffectivityContext) -> bool {
    effectivities.iter().any(|e| e.matches(context))
}

// =============================================================================
// MANAGEMENT
// =============================================================================

/// Create, read, update and delete effectivities attached to revisions.
pub struct EffectivityManager<'a, R: PartRepository + ?Sized> {
    repo: &'a mut R,
}

impl<'a, R: PartRepository + ?Sized> EffectivityManager<'a, R> {
    pub fn new(repo: &'a mut R) -> Self {
        Self { repo }
    }

    /// Attach a serial-number range. The configuration item is mandatory.
    pub fn create_serial_number_based(
        &mut self,
        revision: &PartRevisionKey,
        name: &str,
        description: &str,
        configuration_item: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Effectivity, BomError> {
        let id = self.next_id(&revision.part.workspace)?;
        let effectivity = Effectivity::serial_number_based(id, name, start, end)?;
        let item = self.existing_item(&revision.part.workspace, configuration_item)?;
        self.attach(revision, description, Some(item), effectivity)
    }

    /// Attach a date range. The configuration item is optional but must
    /// exist when given.
    pub fn create_date_based(
        &mut self,
        revision: &PartRevisionKey,
        name: &str,
        description: &str,
        configuration_item: Option<&str>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Effectivity, BomError> {
        let id = self.next_id(&revision.part.workspace)?;
        let effectivity = Effectivity::date_based(id, name, start, end)?;
        let item = match configuration_item.filter(|id| !id.is_empty()) {
            Some(ci) => Some(self.existing_item(&revision.part.workspace, ci)?),
            None => None,
        };
        self.attach(revision, description, item, effectivity)
    }

    /// Attach a lot range. The configuration item is mandatory.
    pub fn create_lot_based(
        &mut self,
        revision: &PartRevisionKey,
        name: &str,
        description: &str,
        configuration_item: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Effectivity, BomError> {
        let id = self.next_id(&revision.part.workspace)?;
        let effectivity = Effectivity::lot_based(id, name, start, end)?;
        let item = self.existing_item(&revision.part.workspace, configuration_item)?;
        self.attach(revision, description, Some(item), effectivity)
    }

    pub fn get_effectivity(&self, workspace: &str, id: u64) -> Result<Effectivity, BomError> {
        let (part, version) = self.holder(workspace, id)?;
        part.revision(&version)
            .and_then(|r| r.effectivities.iter().find(|e| e.id == id))
            .cloned()
            .ok_or(BomError::EffectivityNotFound(id))
    }

    /// Rename or re-describe an effectivity; its range is untouched.
    pub fn update_effectivity(
        &mut self,
        workspace: &str,
        id: u64,
        name: &str,
        description: &str,
    ) -> Result<Effectivity, BomError> {
        self.modify(workspace, id, |effectivity| {
            effectivity.name = name.to_string();
            effectivity.description = description.to_string();
            Ok(())
        })
    }

    pub fn update_serial_number_range(
        &mut self,
        workspace: &str,
        id: u64,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Effectivity, BomError> {
        let start = required(start, "serial number")?;
        self.modify(workspace, id, |effectivity| match &mut effectivity.range {
            EffectivityRange::SerialNumber { start: s, end: e } => {
                *s = start;
                *e = optional(end);
                Ok(())
            }
            other => Err(mismatch(id, other.kind(), "serial number")),
        })
    }

    pub fn update_date_range(
        &mut self,
        workspace: &str,
        id: u64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Effectivity, BomError> {
        let start = start.ok_or(BomError::MissingLowerBound("date"))?;
        self.modify(workspace, id, |effectivity| match &mut effectivity.range {
            EffectivityRange::Date { start: s, end: e } => {
                *s = start;
                *e = end;
                Ok(())
            }
            other => Err(mismatch(id, other.kind(), "date")),
        })
    }

    pub fn update_lot_range(
        &mut self,
        workspace: &str,
        id: u64,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Effectivity, BomError> {
        let start = required(start, "lot")?;
        self.modify(workspace, id, |effectivity| match &mut effectivity.range {
            EffectivityRange::Lot { start: s, end: e } => {
                *s = start;
                *e = optional(end);
                Ok(())
            }
            other => Err(mismatch(id, other.kind(), "lot")),
        })
    }

    /// Detach and drop an effectivity from the named revision.
    pub fn delete_effectivity(&mut self, revision: &PartRevisionKey, id: u64) -> Result<(), BomError> {
        let loaded = self.repo.load_part_master(&revision.part)?;
        let mut part = PartMaster::clone(&loaded);
        let rev = part
            .revision_mut(&revision.version)
            .ok_or_else(|| BomError::PartRevisionNotFound(revision.clone()))?;

        let before = rev.effectivities.len();
        rev.effectivities.retain(|e| e.id != id);
        if rev.effectivities.len() == before {
            return Err(BomError::EffectivityNotFound(id));
        }

        self.repo.save_part_master(part)?;
        tracing::info!(effectivity = id, revision = %revision, "effectivity deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------

    fn existing_item(&self, workspace: &str, id: &str) -> Result<ConfigurationItemKey, BomError> {
        let key = ConfigurationItemKey::new(workspace, id);
        self.repo.load_configuration_item(&key).map(|item| item.key)
    }

    fn attach(
        &mut self,
        revision: &PartRevisionKey,
        description: &str,
        item: Option<ConfigurationItemKey>,
        mut effectivity: Effectivity,
    ) -> Result<Effectivity, BomError> {
        effectivity.description = description.to_string();
        effectivity.configuration_item = item;

        let loaded = self.repo.load_part_master(&revision.part)?;
        let mut part = PartMaster::clone(&loaded);
        let rev = part
            .revision_mut(&revision.version)
            .ok_or_else(|| BomError::PartRevisionNotFound(revision.clone()))?;
        rev.effectivities.push(effectivity.clone());

        self.repo.save_part_master(part)?;
        tracing::info!(
            effectivity = effectivity.id,
            kind = effectivity.range.kind(),
            revision = %revision,
            "effectivity created"
        );
        Ok(effectivity)
    }

    fn modify<F>(&mut self, workspace: &str, id: u64, change: F) -> Result<Effectivity, BomError>
    where
        F: FnOnce(&mut Effectivity) -> Result<(), BomError>,
    {
        let (mut part, version) = self.holder(workspace, id)?;
        let effectivity = part
            .revision_mut(&version)
            .and_then(|r| r.effectivities.iter_mut().find(|e| e.id == id))
            .ok_or(BomError::EffectivityNotFound(id))?;
        change(effectivity)?;
        let updated = effectivity.clone();

        self.repo.save_part_master(part)?;
        tracing::info!(effectivity = id, "effectivity updated");
        Ok(updated)
    }

    /// Part master and revision version holding the effectivity.
    fn holder(&self, workspace: &str, id: u64) -> Result<(PartMaster, String), BomError> {
        for part in self.repo.part_masters(workspace)? {
            for revision in &part.revisions {
                if revision.effectivities.iter().any(|e| e.id == id) {
                    let version = revision.version().to_string();
                    return Ok((PartMaster::clone(&part), version));
                }
            }
        }
        Err(BomError::EffectivityNotFound(id))
    }

    /// Ids already held by stored effectivities (imported ones included) act
    /// as a floor for the repository counter.
    fn next_id(&mut self, workspace: &str) -> Result<u64, BomError> {
        let floor = self
            .repo
            .part_masters(workspace)?
            .iter()
            .map(|part| highest_effectivity_id(part))
            .max()
            .unwrap_or(0);
        self.repo.next_effectivity_id(workspace, floor)
    }
}

/// Highest effectivity id on a part, over its revisions and substitute links.
fn highest_effectivity_id(part: &PartMaster) -> u64 {
    let on_revisions = part
        .revisions
        .iter()
        .flat_map(|revision| revision.effectivities.iter());
    let on_substitutes = part
        .revisions
        .iter()
        .flat_map(|revision| revision.iterations.iter())
        .flat_map(|iteration| iteration.usage_links.iter())
        .flat_map(|link| link.substitutes.iter())
        .flat_map(|substitute| substitute.effectivities.iter());
    on_revisions.chain(on_substitutes).map(|e| e.id).max().unwrap_or(0)
}

fn mismatch(id: u64, actual: &str, requested: &str) -> BomError {
    BomError::NotAllowed(format!(
        "effectivity {} is {} based, not {} based",
        id, actual, requested
    ))
}

// =============================================================================
// TESTS
// =============================================================================
