//! # Datastore Models
//!
//! Row types and queries for every datastore table. Each model owns its SQL;
//! callers pass a `PgPool` (or an open transaction where noted).

pub mod consumption;
pub mod fuel_type_summary;
pub mod meter_run;
pub mod project;
pub mod project_block;
pub mod project_owner;
pub mod user;
pub mod weather;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use consumption::{
    ConsumptionDetail, ConsumptionMetadata, ConsumptionRecord, NewConsumptionMetadata,
    NewConsumptionRecord,
};
pub use fuel_type_summary::{FuelTypeSummary, SummarySeries, SummaryTimeseries};
pub use meter_run::{MeterRun, MeterRunUsage, NewMeterRun, UsageSeries, UsageValue};
pub use project::{NewProject, Project};
pub use project_block::ProjectBlock;
pub use project_owner::ProjectOwner;
pub use user::{AccessToken, User};
pub use weather::{DailyTemperature, WeatherStation, ZipcodeCentroid};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct InvalidChoice {
    pub kind: &'static str,
    pub value: String,
}

/// Fuel type stored as a short code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FuelType {
    #[serde(rename = "E")]
    Electricity,
    #[serde(rename = "NG")]
    NaturalGas,
}

impl FuelType {
    pub fn code(&self) -> &'static str {
        match self {
            FuelType::Electricity => "E",
            FuelType::NaturalGas => "NG",
        }
    }

    /// Long name used in meter output
    pub fn tag(&self) -> &'static str {
        match self {
            FuelType::Electricity => "electricity",
            FuelType::NaturalGas => "natural_gas",
        }
    }
}

impl FromStr for FuelType {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "E" => Ok(FuelType::Electricity),
            "NG" => Ok(FuelType::NaturalGas),
            other => Err(InvalidChoice {
                kind: "fuel_type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for FuelType {
    type Error = InvalidChoice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyUnit {
    #[serde(rename = "KWH")]
    KilowattHour,
    #[serde(rename = "THM")]
    Therm,
}

impl EnergyUnit {
    pub fn code(&self) -> &'static str {
        match self {
            EnergyUnit::KilowattHour => "KWH",
            EnergyUnit::Therm => "THM",
        }
    }

    pub fn unit_name(&self) -> &'static str {
        match self {
            EnergyUnit::KilowattHour => "kWh",
            EnergyUnit::Therm => "therm",
        }
    }
}

impl FromStr for EnergyUnit {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KWH" => Ok(EnergyUnit::KilowattHour),
            "THM" => Ok(EnergyUnit::Therm),
            other => Err(InvalidChoice {
                kind: "energy_unit",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EnergyUnit {
    type Error = InvalidChoice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Meter configuration used to produce a meter run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterType {
    #[serde(rename = "DFLT_RES_E")]
    DefaultResidentialElectricity,
    #[serde(rename = "DFLT_RES_NG")]
    DefaultResidentialNaturalGas,
    #[serde(rename = "DFLT_COM_E")]
    DefaultCommercialElectricity,
    #[serde(rename = "DFLT_COM_NG")]
    DefaultCommercialNaturalGas,
}

impl MeterType {
    pub fn for_fuel(commercial: bool, fuel_type: FuelType) -> Self {
        match (commercial, fuel_type) {
            (false, FuelType::Electricity) => MeterType::DefaultResidentialElectricity,
            (false, FuelType::NaturalGas) => MeterType::DefaultResidentialNaturalGas,
            (true, FuelType::Electricity) => MeterType::DefaultCommercialElectricity,
            (true, FuelType::NaturalGas) => MeterType::DefaultCommercialNaturalGas,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            MeterType::DefaultResidentialElectricity => "DFLT_RES_E",
            MeterType::DefaultResidentialNaturalGas => "DFLT_RES_NG",
            MeterType::DefaultCommercialElectricity => "DFLT_COM_E",
            MeterType::DefaultCommercialNaturalGas => "DFLT_COM_NG",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MeterType::DefaultResidentialElectricity => "Default Residential Electricity",
            MeterType::DefaultResidentialNaturalGas => "Default Residential Natural Gas",
            MeterType::DefaultCommercialElectricity => "Default Commercial Electricity",
            MeterType::DefaultCommercialNaturalGas => "Default Commercial Natural Gas",
        }
    }
}

impl FromStr for MeterType {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DFLT_RES_E" => Ok(MeterType::DefaultResidentialElectricity),
            "DFLT_RES_NG" => Ok(MeterType::DefaultResidentialNaturalGas),
            "DFLT_COM_E" => Ok(MeterType::DefaultCommercialElectricity),
            "DFLT_COM_NG" => Ok(MeterType::DefaultCommercialNaturalGas),
            other => Err(InvalidChoice {
                kind: "meter_type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MeterType {
    type Error = InvalidChoice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
