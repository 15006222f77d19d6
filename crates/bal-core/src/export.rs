//! Canonical BAL CSV export.
//!
//! The output is byte-stable for a given dataset: fixed header, fixed
//! number and date formats, and rows sorted by natural key. Its SHA-256
//! decides whether a publication needs a new upload.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::DateTime;
use sha2::{Digest, Sha256};

use crate::geo::{has_lambert93, to_lambert93};
use crate::models::{Dataset, Position, RecordId};

pub const CSV_HEADER: [&str; 19] = [
    "cle_interop",
    "id_ban_commune",
    "id_ban_toponyme",
    "id_ban_adresse",
    "voie_nom",
    "lieudit_complement_nom",
    "numero",
    "suffixe",
    "certification_commune",
    "commune_insee",
    "commune_nom",
    "position",
    "long",
    "lat",
    "x",
    "y",
    "cad_parcelles",
    "source",
    "date_der_maj",
];

const DELIMITER: char = ';';
const LINE_END: &str = "\r\n";
/// Numéro carried by the synthetic row of a toponyme
pub const TOPONYME_NUMERO: u32 = 99_999;
const SOURCE: &str = "commune";

/// Exported bytes, their hash and the dataset version they were taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    pub hash: String,
    /// `updatedAt` of the BaseLocale when the dataset was read
    pub updated_at: i64,
}

impl Snapshot {
    #[must_use]
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let bytes = render_csv(dataset).into_bytes();
        Self {
            hash: content_hash(&bytes),
            bytes,
            updated_at: dataset.base_locale.updated_at,
        }
    }
}

/// Lowercase hex SHA-256
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Interoperability key, e.g. `54084_xxxx_00012_bis`
#[must_use]
pub fn cle_interop(commune: &str, numero: u32, suffixe: Option<&str>) -> String {
    let key = match suffixe.filter(|suffixe| !suffixe.is_empty()) {
        Some(suffixe) => format!("{commune}_xxxx_{numero:05}_{suffixe}"),
        None => format!("{commune}_xxxx_{numero:05}"),
    };
    key.to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
struct Row {
    cle_interop: String,
    id_ban_commune: String,
    id_ban_toponyme: String,
    id_ban_adresse: String,
    voie_nom: String,
    lieudit_complement_nom: String,
    numero: u32,
    suffixe: String,
    certifie: bool,
    position: Option<Position>,
    parcelles: String,
    updated_at: i64,
}

impl Row {
    fn sort_cmp(&self, other: &Self) -> Ordering {
        let label = |row: &Self| row.position.map(|position| position.kind.label());
        let coordinate = |left: Option<f64>, right: Option<f64>| match (left, right) {
            (Some(left), Some(right)) => left.total_cmp(&right),
            (left, right) => left.is_some().cmp(&right.is_some()),
        };

        self.voie_nom
            .cmp(&other.voie_nom)
            .then(self.numero.cmp(&other.numero))
            .then_with(|| self.suffixe.cmp(&other.suffixe))
            .then_with(|| self.lieudit_complement_nom.cmp(&other.lieudit_complement_nom))
            .then_with(|| label(self).cmp(&label(other)))
            .then_with(|| {
                coordinate(
                    self.position.map(|position| position.longitude),
                    other.position.map(|position| position.longitude),
                )
            })
            .then_with(|| {
                coordinate(
                    self.position.map(|position| position.latitude),
                    other.position.map(|position| position.latitude),
                )
            })
            .then_with(|| self.id_ban_adresse.cmp(&other.id_ban_adresse))
    }

    fn fields(&self, commune: &str, nom_commune: &str) -> [String; 19] {
        let (long, lat, x, y) = match self.position {
            Some(position) => {
                let (x, y) = if has_lambert93(commune) {
                    let (x, y) = to_lambert93(position.longitude, position.latitude);
                    (format!("{x:.2}"), format!("{y:.2}"))
                } else {
                    (String::new(), String::new())
                };
                (
                    format!("{:.6}", position.longitude),
                    format!("{:.6}", position.latitude),
                    x,
                    y,
                )
            }
            None => Default::default(),
        };

        [
            self.cle_interop.clone(),
            self.id_ban_commune.clone(),
            self.id_ban_toponyme.clone(),
            self.id_ban_adresse.clone(),
            self.voie_nom.clone(),
            self.lieudit_complement_nom.clone(),
            self.numero.to_string(),
            self.suffixe.clone(),
            if self.certifie { "1" } else { "0" }.to_string(),
            commune.to_string(),
            nom_commune.to_string(),
            self.position
                .map(|position| position.kind.label().to_string())
                .unwrap_or_default(),
            long,
            lat,
            x,
            y,
            self.parcelles.clone(),
            SOURCE.to_string(),
            format_date(self.updated_at),
        ]
    }
}

/// Render the dataset as canonical CSV
#[must_use]
pub fn render_csv(dataset: &Dataset) -> String {
    let base_locale = &dataset.base_locale;
    let id_ban_commune = base_locale.ban_id.clone().unwrap_or_default();

    let voies: HashMap<RecordId, _> = dataset.voies.iter().map(|voie| (voie.id, voie)).collect();
    let toponymes: HashMap<RecordId, _> = dataset
        .toponymes
        .iter()
        .map(|toponyme| (toponyme.id, toponyme))
        .collect();

    let mut rows = Vec::new();

    for numero in dataset.numeros.iter().filter(|numero| numero.deleted_at.is_none()) {
        let Some(voie) = voies.get(&numero.voie_id) else {
            continue;
        };
        let lieudit = numero
            .toponyme_id
            .and_then(|id| toponymes.get(&id))
            .map(|toponyme| toponyme.nom.clone())
            .unwrap_or_default();

        let template = Row {
            cle_interop: cle_interop(
                &base_locale.commune,
                numero.numero,
                numero.suffixe.as_deref(),
            ),
            id_ban_commune: id_ban_commune.clone(),
            id_ban_toponyme: voie.ban_id.clone().unwrap_or_default(),
            id_ban_adresse: numero.ban_id.clone().unwrap_or_default(),
            voie_nom: voie.nom.clone(),
            lieudit_complement_nom: lieudit,
            numero: numero.numero,
            suffixe: numero.suffixe.clone().unwrap_or_default(),
            certifie: numero.certifie,
            position: None,
            parcelles: join_parcelles(&numero.parcelles),
            updated_at: numero.updated_at,
        };
        push_positions(&mut rows, template, &numero.positions);
    }

    for toponyme in dataset
        .toponymes
        .iter()
        .filter(|toponyme| toponyme.deleted_at.is_none())
    {
        let template = Row {
            cle_interop: cle_interop(&base_locale.commune, TOPONYME_NUMERO, None),
            id_ban_commune: id_ban_commune.clone(),
            id_ban_toponyme: toponyme.ban_id.clone().unwrap_or_default(),
            id_ban_adresse: String::new(),
            voie_nom: toponyme.nom.clone(),
            lieudit_complement_nom: String::new(),
            numero: TOPONYME_NUMERO,
            suffixe: String::new(),
            certifie: false,
            position: None,
            parcelles: join_parcelles(&toponyme.parcelles),
            updated_at: toponyme.updated_at,
        };
        push_positions(&mut rows, template, &toponyme.positions);
    }

    // Rows tied on the natural key fall back to their rendered fields
    let mut records: Vec<_> = rows
        .into_iter()
        .map(|row| {
            let fields = row.fields(&base_locale.commune, &base_locale.nom_commune);
            (row, fields)
        })
        .collect();
    records.sort_by(|(left, left_fields), (right, right_fields)| {
        left.sort_cmp(right).then_with(|| left_fields.cmp(right_fields))
    });

    let mut output = String::new();
    write_record(&mut output, CSV_HEADER.iter().copied());
    for (_, fields) in &records {
        write_record(&mut output, fields.iter().map(String::as_str));
    }
    output
}

fn push_positions(rows: &mut Vec<Row>, template: Row, positions: &[Position]) {
    if positions.is_empty() {
        rows.push(template);
        return;
    }
    for position in positions {
        rows.push(Row {
            position: Some(*position),
            ..template.clone()
        });
    }
}

fn join_parcelles(parcelles: &[String]) -> String {
    let mut parcelles = parcelles.to_vec();
    parcelles.sort();
    parcelles.join("|")
}

fn format_date(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn write_record<'a>(output: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (index, field) in fields.enumerate() {
        if index > 0 {
            output.push(DELIMITER);
        }
        push_field(output, field);
    }
    output.push_str(LINE_END);
}

fn push_field(output: &mut String, field: &str) {
    let needs_quotes = field.contains([DELIMITER, '"', '\r', '\n'])
        || field.starts_with(' ')
        || field.ends_with(' ');
    if !needs_quotes {
        output.push_str(field);
        return;
    }

    output.push('"');
    output.push_str(&field.replace('"', "\"\""));
    output.push('"');
}
