//! Asset Model
//!
//! Assets are a closed set of variants (charts, insights, audience segments)
//! owned by a user. Every variant carries an identity and a mutable
//! description; everything else is variant specific.
//!
//! # JSON Shape
//!
//! Assets are internally tagged on `type`:
//!
//! ```text
//! {"type": "insight", "id": "i1", "description": "40% of millennials..."}
//! ```
//!
//! Persistence and cache encoding dispatch on [`AssetKind`], never on
//! runtime type inspection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Variant tag of an [`Asset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Chart,
    Insight,
    Audience,
}

impl AssetKind {
    /// All variant tags, in declaration order
    pub const ALL: [Self; 3] = [Self::Chart, Self::Insight, Self::Audience];

    /// Tag as persisted in `asset_type` columns and cache records
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Insight => "insight",
            Self::Audience => "audience",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chart" => Ok(Self::Chart),
            "insight" => Ok(Self::Insight),
            "audience" => Ok(Self::Audience),
            other => Err(ValidationError::UnknownAssetType(other.to_string())),
        }
    }
}

/// Identity plus mutable description, shared by every asset variant
pub trait AssetRecord {
    /// Tag of the implementing variant
    const KIND: AssetKind;

    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn set_description(&mut self, description: String);
}

/// One data point of a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataPoint {
    pub datapoint_code: String,
    pub value: f64,
}

impl ChartDataPoint {
    pub fn new(datapoint_code: impl Into<String>, value: f64) -> Self {
        Self {
            datapoint_code: datapoint_code.into(),
            value,
        }
    }
}

/// Chart asset
///
/// Data points keep the order they were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chart {
    pub id: String,
    pub title: String,
    pub description: String,
    pub x_axis_title: String,
    pub y_axis_title: String,
    pub data: Vec<ChartDataPoint>,
}

/// Insight asset: a short piece of text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insight {
    pub id: String,
    pub description: String,
}

/// Audience segment asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Audience {
    pub id: String,
    pub gender: String,
    pub country: String,
    pub age_group: String,
    pub social_hours: i32,
    pub purchases: i32,
    pub description: String,
}

macro_rules! impl_asset_record {
    ($ty:ty, $kind:expr) => {
        impl AssetRecord for $ty {
            const KIND: AssetKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn description(&self) -> &str {
                &self.description
            }

            fn set_description(&mut self, description: String) {
                self.description = description;
            }
        }
    };
}

impl_asset_record!(Chart, AssetKind::Chart);
impl_asset_record!(Insight, AssetKind::Insight);
impl_asset_record!(Audience, AssetKind::Audience);

/// A persisted asset owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Asset {
    Chart(Chart),
    Insight(Insight),
    Audience(Audience),
}

impl Asset {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Chart(chart) => chart.id(),
            Self::Insight(insight) => insight.id(),
            Self::Audience(audience) => audience.id(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Chart(chart) => chart.description(),
            Self::Insight(insight) => insight.description(),
            Self::Audience(audience) => audience.description(),
        }
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        match self {
            Self::Chart(chart) => chart.set_description(description),
            Self::Insight(insight) => insight.set_description(description),
            Self::Audience(audience) => audience.set_description(description),
        }
    }

    #[must_use]
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Chart(_) => Chart::KIND,
            Self::Insight(_) => Insight::KIND,
            Self::Audience(_) => Audience::KIND,
        }
    }

    /// Decode a request body of the form `{"type": ..., "id": ..., ...}`
    ///
    /// Missing variant fields fall back to empty strings, zero and an empty
    /// data point list. The `type` tag and a non-empty `id` are required.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the tag is missing or unknown, the
    /// id is missing, or a field has the wrong JSON type.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, ValidationError> {
        let kind = match payload.get("type") {
            Some(serde_json::Value::String(tag)) => tag.parse::<AssetKind>()?,
            Some(other) => return Err(ValidationError::UnknownAssetType(other.to_string())),
            None => return Err(ValidationError::MissingType),
        };

        let asset = Self::from_data(kind, payload)?;
        if asset.id().is_empty() {
            return Err(ValidationError::MissingId);
        }
        Ok(asset)
    }

    /// Variant payload without the `type` tag
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn data_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Chart(chart) => serde_json::to_value(chart),
            Self::Insight(insight) => serde_json::to_value(insight),
            Self::Audience(audience) => serde_json::to_value(audience),
        }
    }

    /// Rebuild an asset from its tag and untagged variant payload
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not match the variant selected by `kind`.
    pub fn from_data(kind: AssetKind, data: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            AssetKind::Chart => Self::Chart(serde_json::from_value(data)?),
            AssetKind::Insight => Self::Insight(serde_json::from_value(data)?),
            AssetKind::Audience => Self::Audience(serde_json::from_value(data)?),
        })
    }
}

impl From<Chart> for Asset {
    fn from(chart: Chart) -> Self {
        Self::Chart(chart)
    }
}

impl From<Insight> for Asset {
    fn from(insight: Insight) -> Self {
        Self::Insight(insight)
    }
}

impl From<Audience> for Asset {
    fn from(audience: Audience) -> Self {
        Self::Audience(audience)
    }
}

/// A user's favourite, carrying the full asset it points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favourite {
    pub user_id: String,
    pub asset: Asset,
}

impl Favourite {
    pub fn new(user_id: impl Into<String>, asset: Asset) -> Self {
        Self {
            user_id: user_id.into(),
            asset,
        }
    }
}
