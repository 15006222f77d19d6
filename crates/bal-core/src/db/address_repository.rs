//! Voies, numéros and toponymes of a BaseLocale
//!
//! Creation helpers bump the owning BaseLocale's `updated_at`, the way the
//! CRUD layer does on every dataset mutation.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{
    BaseLocaleId, Dataset, Numero, Position, RecordId, Toponyme, Voie,
};
use libsql::{params, Connection, Row};

use super::base_locale_repository::{BaseLocaleRepository, LibSqlBaseLocaleRepository};

/// Input for a new numéro
#[derive(Debug, Clone, PartialEq)]
pub struct NewNumero {
    pub voie_id: RecordId,
    pub toponyme_id: Option<RecordId>,
    pub numero: u32,
    pub suffixe: Option<String>,
    pub certifie: bool,
    pub ban_id: Option<String>,
    pub parcelles: Vec<String>,
    pub positions: Vec<Position>,
}

impl NewNumero {
    pub const fn new(voie_id: RecordId, numero: u32) -> Self {
        Self {
            voie_id,
            toponyme_id: None,
            numero,
            suffixe: None,
            certifie: false,
            ban_id: None,
            parcelles: Vec::new(),
            positions: Vec::new(),
        }
    }
}

/// Trait for dataset storage operations (async)
#[allow(async_fn_in_trait)]
pub trait AddressRepository {
    async fn create_voie(&self, bal_id: &BaseLocaleId, nom: &str) -> Result<Voie>;

    async fn create_toponyme(
        &self,
        bal_id: &BaseLocaleId,
        nom: &str,
        parcelles: &[String],
        positions: &[Position],
    ) -> Result<Toponyme>;

    async fn create_numero(&self, bal_id: &BaseLocaleId, numero: &NewNumero) -> Result<Numero>;

    /// Soft delete a numéro
    async fn delete_numero(&self, id: &RecordId) -> Result<()>;

    /// Count non-deleted numéros on non-deleted voies
    async fn count_active_numeros(&self, bal_id: &BaseLocaleId) -> Result<u64>;

    /// Read the BaseLocale and every active record in one pass
    async fn load_dataset(&self, bal_id: &BaseLocaleId) -> Result<Option<Dataset>>;
}

/// libSQL implementation of `AddressRepository`
pub struct LibSqlAddressRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAddressRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn bump(&self, bal_id: &BaseLocaleId, now: i64) -> Result<()> {
        LibSqlBaseLocaleRepository::new(self.conn)
            .touch(bal_id, now)
            .await
    }

    async fn insert_positions(
        &self,
        owner_column: &str,
        owner_id: &RecordId,
        positions: &[Position],
    ) -> Result<()> {
        for (rank, position) in positions.iter().enumerate() {
            self.conn
                .execute(
                    &format!(
                        "INSERT INTO positions ({owner_column}, rank, kind, longitude, latitude)
                         VALUES (?, ?, ?, ?, ?)"
                    ),
                    params![
                        owner_id.as_str(),
                        i64::try_from(rank).unwrap_or(i64::MAX),
                        position.kind.label(),
                        position.longitude,
                        position.latitude,
                    ],
                )
                .await?;
        }
        Ok(())
    }

    /// Positions of every active numéro and toponyme, keyed by owner id
    async fn load_positions(
        &self,
        bal_id: &BaseLocaleId,
    ) -> Result<HashMap<String, Vec<Position>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(p.numero_id, p.toponyme_id), p.kind, p.longitude, p.latitude
                 FROM positions p
                 WHERE p.numero_id IN (SELECT id FROM numeros WHERE base_locale_id = ?1)
                    OR p.toponyme_id IN (SELECT id FROM toponymes WHERE base_locale_id = ?1)
                 ORDER BY p.rank, p.id",
                [bal_id.as_str()],
            )
            .await?;

        let mut positions: HashMap<String, Vec<Position>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let owner: String = row.get(0)?;
            let kind: String = row.get(1)?;
            positions.entry(owner).or_default().push(Position {
                kind: kind.parse()?,
                longitude: row.get(2)?,
                latitude: row.get(3)?,
            });
        }
        Ok(positions)
    }

    fn parse_id(value: &str) -> Result<RecordId> {
        value
            .parse()
            .map_err(|_| Error::Database(format!("invalid record id '{value}'")))
    }

    fn parse_voie(row: &Row, bal_id: BaseLocaleId) -> Result<Voie> {
        let id: String = row.get(0)?;
        Ok(Voie {
            id: Self::parse_id(&id)?,
            base_locale_id: bal_id,
            nom: row.get(1)?,
            ban_id: row.get(2)?,
            updated_at: row.get(3)?,
            deleted_at: None,
        })
    }

    fn parse_toponyme(
        row: &Row,
        bal_id: BaseLocaleId,
        positions: &mut HashMap<String, Vec<Position>>,
    ) -> Result<Toponyme> {
        let id: String = row.get(0)?;
        let parcelles: String = row.get(3)?;
        Ok(Toponyme {
            id: Self::parse_id(&id)?,
            base_locale_id: bal_id,
            nom: row.get(1)?,
            ban_id: row.get(2)?,
            parcelles: serde_json::from_str(&parcelles)?,
            positions: positions.remove(&id).unwrap_or_default(),
            updated_at: row.get(4)?,
            deleted_at: None,
        })
    }

    fn parse_numero(
        row: &Row,
        bal_id: BaseLocaleId,
        positions: &mut HashMap<String, Vec<Position>>,
    ) -> Result<Numero> {
        let id: String = row.get(0)?;
        let voie_id: String = row.get(1)?;
        let toponyme_id: Option<String> = row.get(2)?;
        let numero: i64 = row.get(3)?;
        let parcelles: String = row.get(7)?;
        Ok(Numero {
            id: Self::parse_id(&id)?,
            base_locale_id: bal_id,
            voie_id: Self::parse_id(&voie_id)?,
            toponyme_id: toponyme_id.as_deref().map(Self::parse_id).transpose()?,
            numero: u32::try_from(numero)
                .map_err(|_| Error::Database(format!("invalid numero {numero}")))?,
            suffixe: row.get(4)?,
            certifie: row.get::<i64>(5)? != 0,
            ban_id: row.get(6)?,
            parcelles: serde_json::from_str(&parcelles)?,
            positions: positions.remove(&id).unwrap_or_default(),
            updated_at: row.get(8)?,
            deleted_at: None,
        })
    }
}

impl AddressRepository for LibSqlAddressRepository<'_> {
    async fn create_voie(&self, bal_id: &BaseLocaleId, nom: &str) -> Result<Voie> {
        let now = chrono::Utc::now().timestamp_millis();
        let voie = Voie {
            id: RecordId::new(),
            base_locale_id: *bal_id,
            nom: nom.to_string(),
            ban_id: None,
            updated_at: now,
            deleted_at: None,
        };

        self.conn
            .execute(
                "INSERT INTO voies (id, base_locale_id, nom, ban_id, updated_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    voie.id.as_str(),
                    bal_id.as_str(),
                    voie.nom.clone(),
                    voie.ban_id.clone(),
                    now
                ],
            )
            .await?;
        self.bump(bal_id, now).await?;

        Ok(voie)
    }

    async fn create_toponyme(
        &self,
        bal_id: &BaseLocaleId,
        nom: &str,
        parcelles: &[String],
        positions: &[Position],
    ) -> Result<Toponyme> {
        let now = chrono::Utc::now().timestamp_millis();
        let toponyme = Toponyme {
            id: RecordId::new(),
            base_locale_id: *bal_id,
            nom: nom.to_string(),
            ban_id: None,
            parcelles: parcelles.to_vec(),
            positions: positions.to_vec(),
            updated_at: now,
            deleted_at: None,
        };

        self.conn
            .execute(
                "INSERT INTO toponymes (id, base_locale_id, nom, ban_id, parcelles, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    toponyme.id.as_str(),
                    bal_id.as_str(),
                    toponyme.nom.clone(),
                    toponyme.ban_id.clone(),
                    serde_json::to_string(&toponyme.parcelles)?,
                    now
                ],
            )
            .await?;
        self.insert_positions("toponyme_id", &toponyme.id, positions)
            .await?;
        self.bump(bal_id, now).await?;

        Ok(toponyme)
    }

    async fn create_numero(&self, bal_id: &BaseLocaleId, input: &NewNumero) -> Result<Numero> {
        let now = chrono::Utc::now().timestamp_millis();
        let numero = Numero {
            id: RecordId::new(),
            base_locale_id: *bal_id,
            voie_id: input.voie_id,
            toponyme_id: input.toponyme_id,
            numero: input.numero,
            suffixe: input.suffixe.clone(),
            certifie: input.certifie,
            ban_id: input.ban_id.clone(),
            parcelles: input.parcelles.clone(),
            positions: input.positions.clone(),
            updated_at: now,
            deleted_at: None,
        };

        self.conn
            .execute(
                "INSERT INTO numeros (
                    id, base_locale_id, voie_id, toponyme_id, numero, suffixe,
                    certifie, ban_id, parcelles, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    numero.id.as_str(),
                    bal_id.as_str(),
                    numero.voie_id.as_str(),
                    numero.toponyme_id.map(|id| id.as_str()),
                    i64::from(numero.numero),
                    numero.suffixe.clone(),
                    i64::from(numero.certifie),
                    numero.ban_id.clone(),
                    serde_json::to_string(&numero.parcelles)?,
                    now
                ],
            )
            .await?;
        self.insert_positions("numero_id", &numero.id, &numero.positions)
            .await?;
        self.bump(bal_id, now).await?;

        Ok(numero)
    }

    async fn delete_numero(&self, id: &RecordId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let mut rows = self
            .conn
            .query(
                "UPDATE numeros SET deleted_at = ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL
                 RETURNING base_locale_id",
                params![now, now, id.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Err(Error::NotFound(format!("Numero {id}")));
        };
        let bal_id: String = row.get(0)?;
        drop(rows);

        let bal_id: BaseLocaleId = bal_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid BaseLocale id '{bal_id}'")))?;
        self.bump(&bal_id, now).await
    }

    async fn count_active_numeros(&self, bal_id: &BaseLocaleId) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM numeros n
                 JOIN voies v ON v.id = n.voie_id
                 WHERE n.base_locale_id = ?
                   AND n.deleted_at IS NULL
                   AND v.deleted_at IS NULL",
                [bal_id.as_str()],
            )
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn load_dataset(&self, bal_id: &BaseLocaleId) -> Result<Option<Dataset>> {
        let Some(base_locale) = LibSqlBaseLocaleRepository::new(self.conn)
            .get(bal_id)
            .await?
        else {
            return Ok(None);
        };

        let mut positions = self.load_positions(bal_id).await?;

        let mut voies = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT id, nom, ban_id, updated_at FROM voies
                 WHERE base_locale_id = ? AND deleted_at IS NULL
                 ORDER BY id",
                [bal_id.as_str()],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            voies.push(Self::parse_voie(&row, *bal_id)?);
        }

        let mut toponymes = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT id, nom, ban_id, parcelles, updated_at FROM toponymes
                 WHERE base_locale_id = ? AND deleted_at IS NULL
                 ORDER BY id",
                [bal_id.as_str()],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            toponymes.push(Self::parse_toponyme(&row, *bal_id, &mut positions)?);
        }

        let mut numeros = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT n.id, n.voie_id, n.toponyme_id, n.numero, n.suffixe, n.certifie,
                        n.ban_id, n.parcelles, n.updated_at
                 FROM numeros n
                 JOIN voies v ON v.id = n.voie_id
                 WHERE n.base_locale_id = ?
                   AND n.deleted_at IS NULL
                   AND v.deleted_at IS NULL
                 ORDER BY n.id",
                [bal_id.as_str()],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            numeros.push(Self::parse_numero(&row, *bal_id, &mut positions)?);
        }

        Ok(Some(Dataset {
            base_locale,
            voies,
            toponymes,
            numeros,
        }))
    }
}
