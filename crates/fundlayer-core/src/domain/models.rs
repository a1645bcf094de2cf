use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Latest price for one fund. `pct` is the intraday estimated change when
/// the provider publishes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundQuote {
    pub code: String,
    pub price: f64,
    #[serde(default)]
    pub pct: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// One net asset value observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub date: String,
    pub close: f64,
}

/// Net asset value history for one fund, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundHistory {
    pub code: String,
    pub points: Vec<NavPoint>,
}

impl FundHistory {
    pub fn latest(&self) -> Option<&NavPoint> {
        self.points.last()
    }
}

/// Capital flow for one sector board. Amounts are in units of 1e8 CNY.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorFlow {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub main_net: f64,
    #[serde(default)]
    pub main_net_pct: f64,
    #[serde(default)]
    pub chg_pct: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
}

/// One finance news headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ctime: Option<String>,
    #[serde(default)]
    pub media_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Aggregation window for sector flow rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowIndicator {
    #[default]
    Today,
    FiveDay,
    TenDay,
}

impl FlowIndicator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::FiveDay => "5d",
            Self::TenDay => "10d",
        }
    }
}

impl Display for FlowIndicator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowIndicator {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" | "1d" => Ok(Self::Today),
            "5d" => Ok(Self::FiveDay),
            "10d" => Ok(Self::TenDay),
            other => Err(ValidationError::MalformedParam {
                value: format!("indicator={other}"),
            }),
        }
    }
}

/// Sector board family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorType {
    #[default]
    Industry,
    Concept,
    Region,
}

impl SectorType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Industry => "industry",
            Self::Concept => "concept",
            Self::Region => "region",
        }
    }
}

impl Display for SectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectorType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "industry" => Ok(Self::Industry),
            "concept" => Ok(Self::Concept),
            "region" => Ok(Self::Region),
            other => Err(ValidationError::MalformedParam {
                value: format!("sector_type={other}"),
            }),
        }
    }
}
