//! Voies, numéros, toponymes and their positions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

use super::base_locale::{BaseLocale, BaseLocaleId};

/// Identifier shared by voie, numéro and toponyme records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of a position, serialized with its French BAL label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionType {
    #[serde(rename = "entrée")]
    Entree,
    #[serde(rename = "bâtiment")]
    Batiment,
    #[serde(rename = "cage d’escalier")]
    CageEscalier,
    #[serde(rename = "logement")]
    Logement,
    #[serde(rename = "service technique")]
    ServiceTechnique,
    #[serde(rename = "délivrance postale")]
    DelivrancePostale,
    #[serde(rename = "parcelle")]
    Parcelle,
    #[serde(rename = "segment")]
    Segment,
    #[serde(rename = "inconnue")]
    Inconnue,
}

impl PositionType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Entree => "entrée",
            Self::Batiment => "bâtiment",
            Self::CageEscalier => "cage d’escalier",
            Self::Logement => "logement",
            Self::ServiceTechnique => "service technique",
            Self::DelivrancePostale => "délivrance postale",
            Self::Parcelle => "parcelle",
            Self::Segment => "segment",
            Self::Inconnue => "inconnue",
        }
    }
}

impl FromStr for PositionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "entrée" => Self::Entree,
            "bâtiment" => Self::Batiment,
            "cage d’escalier" => Self::CageEscalier,
            "logement" => Self::Logement,
            "service technique" => Self::ServiceTechnique,
            "délivrance postale" => Self::DelivrancePostale,
            "parcelle" => Self::Parcelle,
            "segment" => Self::Segment,
            "inconnue" => Self::Inconnue,
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown position type '{other}'"
                )))
            }
        };
        Ok(kind)
    }
}

/// A WGS84 point with its kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub kind: PositionType,
    pub longitude: f64,
    pub latitude: f64,
}

impl Position {
    pub const fn new(kind: PositionType, longitude: f64, latitude: f64) -> Self {
        Self {
            kind,
            longitude,
            latitude,
        }
    }
}

/// A street
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voie {
    pub id: RecordId,
    pub base_locale_id: BaseLocaleId,
    pub nom: String,
    pub ban_id: Option<String>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

/// A place name, exported as a synthetic `99999` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toponyme {
    pub id: RecordId,
    pub base_locale_id: BaseLocaleId,
    pub nom: String,
    pub ban_id: Option<String>,
    pub parcelles: Vec<String>,
    pub positions: Vec<Position>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

/// A house number on a voie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Numero {
    pub id: RecordId,
    pub base_locale_id: BaseLocaleId,
    pub voie_id: RecordId,
    pub toponyme_id: Option<RecordId>,
    pub numero: u32,
    pub suffixe: Option<String>,
    pub certifie: bool,
    pub ban_id: Option<String>,
    pub parcelles: Vec<String>,
    pub positions: Vec<Position>,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

/// Every active record of a BaseLocale, read in one consistent pass
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub base_locale: BaseLocale,
    pub voies: Vec<Voie>,
    pub toponymes: Vec<Toponyme>,
    pub numeros: Vec<Numero>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_labels_parse_back() {
        for kind in [
            PositionType::Entree,
            PositionType::CageEscalier,
            PositionType::DelivrancePostale,
            PositionType::Inconnue,
        ] {
            assert_eq!(kind.label().parse::<PositionType>().unwrap(), kind);
        }
    }

    #[test]
    fn position_label_matches_serde() {
        let json = serde_json::to_string(&PositionType::Batiment).unwrap();
        assert_eq!(json, "\"bâtiment\"");
    }
}
