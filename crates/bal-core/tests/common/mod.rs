#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bal_core::api_depot::{ApiError, ApiResult, HabilitationApi, RevisionApi};
use bal_core::db::NewNumero;
use bal_core::export::content_hash;
use bal_core::models::{
    BaseLocale, BaseLocaleStatus, Habilitation, HabilitationStatus, Position, PositionType,
    Revision, RevisionContext, RevisionFile, RevisionStatus, RevisionValidation, BAL_FILE_TYPE,
};
use bal_core::publication::Mailer;
use bal_core::{DatabaseService, Engine};

pub const COMMUNE: &str = "54084";

/// Call counters of the in-memory depot
#[derive(Debug, Default)]
pub struct Calls {
    pub fetch_habilitation: AtomicUsize,
    pub create_habilitation: AtomicUsize,
    pub get_current_revision: AtomicUsize,
    pub get_current_revisions: AtomicUsize,
    pub create_revision: AtomicUsize,
    pub compute_revision: AtomicUsize,
    pub upload_file: AtomicUsize,
    pub publish_revision: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Every call, read or write
    pub fn total(&self) -> usize {
        [
            &self.fetch_habilitation,
            &self.create_habilitation,
            &self.get_current_revision,
            &self.get_current_revisions,
            &self.create_revision,
            &self.compute_revision,
            &self.upload_file,
            &self.publish_revision,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }
}

#[derive(Debug, Default)]
struct DepotState {
    habilitations: HashMap<String, Habilitation>,
    /// Current revision per commune
    current: HashMap<String, Revision>,
    /// Revisions created but not yet published
    drafts: HashMap<String, Revision>,
    uploads: HashMap<String, Vec<u8>>,
    next_id: usize,
    validation_errors: Option<Vec<String>>,
    fail_listing: bool,
    failing_communes: HashSet<String>,
    /// Publication made by another client while the next listing is served
    publish_during_listing: Option<(String, String)>,
    /// `(since, served_at)` of every successful listing
    listings: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl DepotState {
    fn publish_external(&mut self, commune: &str, hash: &str) -> Revision {
        self.next_id += 1;
        let revision = Revision {
            id: format!("external-{}", self.next_id),
            code_commune: commune.to_string(),
            status: RevisionStatus::Published,
            ready: true,
            current: true,
            files: vec![RevisionFile {
                kind: BAL_FILE_TYPE.to_string(),
                hash: Some(hash.to_string()),
            }],
            validation: None,
            published_at: Some(Utc::now()),
        };
        self.current.insert(commune.to_string(), revision.clone());
        revision
    }
}

/// In-memory Api Depot recording every call
#[derive(Debug, Default)]
pub struct FakeDepot {
    state: Mutex<DepotState>,
    pub calls: Calls,
    /// Delay applied inside `get_current_revision`
    pub delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeDepot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an accepted habilitation valid for 30 days
    pub fn accept_habilitation(&self, id: &str, commune: &str) {
        self.insert_habilitation(Habilitation {
            id: id.to_string(),
            code_commune: commune.to_string(),
            status: HabilitationStatus::Accepted,
            expires_at: Some(Utc::now() + chrono::Duration::days(30)),
            email_commune: Some("mairie@example.fr".to_string()),
        });
    }

    pub fn insert_habilitation(&self, habilitation: Habilitation) {
        self.state
            .lock()
            .unwrap()
            .habilitations
            .insert(habilitation.id.clone(), habilitation);
    }

    /// Make the next `compute_revision` calls report these errors
    pub fn reject_validation(&self, errors: &[&str]) {
        self.state.lock().unwrap().validation_errors =
            Some(errors.iter().map(ToString::to_string).collect());
    }

    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_listing = fail;
    }

    /// Make `get_current_revision` fail for this commune
    pub fn fail_commune(&self, commune: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_communes
            .insert(commune.to_string());
    }

    /// Simulate a publication made by another client
    pub fn publish_elsewhere(&self, commune: &str, hash: &str) -> Revision {
        self.state.lock().unwrap().publish_external(commune, hash)
    }

    /// Publish elsewhere right after the next listing is computed
    pub fn publish_during_next_listing(&self, commune: &str, hash: &str) {
        self.state.lock().unwrap().publish_during_listing =
            Some((commune.to_string(), hash.to_string()));
    }

    pub fn listings(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.state.lock().unwrap().listings.clone()
    }

    pub fn current_revision(&self, commune: &str) -> Option<Revision> {
        self.state.lock().unwrap().current.get(commune).cloned()
    }

    pub fn uploaded(&self, revision_id: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().uploads.get(revision_id).cloned()
    }

    fn not_found(resource: &str) -> ApiError {
        ApiError::NotFound(resource.to_string())
    }
}

#[async_trait]
impl HabilitationApi for FakeDepot {
    async fn fetch_habilitation(&self, id: &str) -> ApiResult<Habilitation> {
        self.calls.fetch_habilitation.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .habilitations
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found("habilitation"))
    }

    async fn create_habilitation(&self, commune: &str) -> ApiResult<Habilitation> {
        self.calls.create_habilitation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let habilitation = Habilitation {
            id: format!("hab-{}", state.next_id),
            code_commune: commune.to_string(),
            status: HabilitationStatus::Pending,
            expires_at: None,
            email_commune: None,
        };
        state
            .habilitations
            .insert(habilitation.id.clone(), habilitation.clone());
        Ok(habilitation)
    }
}

#[async_trait]
impl RevisionApi for FakeDepot {
    async fn get_current_revision(&self, commune: &str) -> ApiResult<Option<Revision>> {
        self.calls
            .get_current_revision
            .fetch_add(1, Ordering::SeqCst);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let state = self.state.lock().unwrap();
        if state.failing_communes.contains(commune) {
            return Err(ApiError::Service {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        Ok(state.current.get(commune).cloned())
    }

    async fn get_current_revisions(&self, since: DateTime<Utc>) -> ApiResult<Vec<Revision>> {
        self.calls
            .get_current_revisions
            .fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(ApiError::Service {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        let listed = state
            .current
            .values()
            .filter(|revision| revision.published_at.is_some_and(|at| at >= since))
            .cloned()
            .collect();
        state.listings.push((since, Utc::now()));
        if let Some((commune, hash)) = state.publish_during_listing.take() {
            state.publish_external(&commune, &hash);
        }
        Ok(listed)
    }

    async fn create_revision(
        &self,
        commune: &str,
        _context: &RevisionContext,
    ) -> ApiResult<Revision> {
        self.calls.create_revision.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let revision = Revision {
            id: format!("rev-{}", state.next_id),
            code_commune: commune.to_string(),
            status: RevisionStatus::Pending,
            ready: false,
            current: false,
            files: Vec::new(),
            validation: None,
            published_at: None,
        };
        state.drafts.insert(revision.id.clone(), revision.clone());
        Ok(revision)
    }

    async fn compute_revision(&self, revision_id: &str) -> ApiResult<Revision> {
        self.calls.compute_revision.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let validation = match state.validation_errors.clone() {
            Some(errors) => RevisionValidation {
                valid: false,
                errors,
                warnings: Vec::new(),
            },
            None => RevisionValidation {
                valid: true,
                ..RevisionValidation::default()
            },
        };
        let revision = state
            .drafts
            .get_mut(revision_id)
            .ok_or_else(|| Self::not_found("revision"))?;
        revision.ready = validation.valid;
        revision.validation = Some(validation);
        Ok(revision.clone())
    }

    async fn upload_file(&self, revision_id: &str, bytes: &[u8]) -> ApiResult<()> {
        self.calls.upload_file.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if !state.drafts.contains_key(revision_id) {
            return Err(Self::not_found("revision"));
        }
        state.uploads.insert(revision_id.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn publish_revision(
        &self,
        revision_id: &str,
        _habilitation_id: &str,
    ) -> ApiResult<Revision> {
        self.calls.publish_revision.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let hash = state
            .uploads
            .get(revision_id)
            .map(|bytes| content_hash(bytes))
            .ok_or_else(|| Self::not_found("file"))?;
        let mut revision = state
            .drafts
            .remove(revision_id)
            .ok_or_else(|| Self::not_found("revision"))?;

        revision.status = RevisionStatus::Published;
        revision.current = true;
        revision.published_at = Some(Utc::now());
        revision.files = vec![RevisionFile {
            kind: BAL_FILE_TYPE.to_string(),
            hash: Some(hash),
        }];
        state
            .current
            .insert(revision.code_commune.clone(), revision.clone());
        Ok(revision)
    }
}

/// Mailer counting notices, optionally failing
#[derive(Debug, Default)]
pub struct FakeMailer {
    pub sent: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_publication_notice(&self, _base_locale: &BaseLocale) -> bal_core::Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(bal_core::Error::InvalidInput("smtp unavailable".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub db: DatabaseService,
    pub depot: Arc<FakeDepot>,
    pub mailer: Arc<FakeMailer>,
    pub engine: Engine,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_debounce(Duration::ZERO).await
    }

    pub async fn with_debounce(debounce: Duration) -> Self {
        Self::build(debounce, FakeMailer::default()).await
    }

    pub async fn build(debounce: Duration, mailer: FakeMailer) -> Self {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let depot = FakeDepot::new();
        let mailer = Arc::new(mailer);
        let engine = Engine::new(
            db.clone(),
            depot.clone(),
            depot.clone(),
            mailer.clone(),
            debounce,
        );
        Self {
            db,
            depot,
            mailer,
            engine,
        }
    }

    /// A BaseLocale holding one voie with one positioned numéro
    pub async fn seed(&self, commune: &str, status: BaseLocaleStatus) -> BaseLocale {
        let mut bal = BaseLocale::new("BAL de test", commune, "Nancy").unwrap();
        bal.status = status;
        self.db.create_base_locale(&bal).await.unwrap();

        let voie = self.db.create_voie(&bal.id, "Rue de la Paix").await.unwrap();
        let mut numero = NewNumero::new(voie.id, 1);
        numero.certifie = true;
        numero.parcelles = vec!["54084000AB0012".to_string()];
        numero.positions = vec![Position::new(PositionType::Entree, 6.18, 48.69)];
        self.db.create_numero(&bal.id, &numero).await.unwrap();

        self.db.get_base_locale(&bal.id).await.unwrap().unwrap()
    }

    /// A seeded draft with an accepted habilitation attached
    pub async fn seed_publishable(&self, commune: &str) -> BaseLocale {
        let bal = self.seed(commune, BaseLocaleStatus::Draft).await;
        let habilitation_id = format!("hab-{}", bal.id);
        self.depot.accept_habilitation(&habilitation_id, commune);
        self.db
            .set_habilitation(&bal.id, &habilitation_id)
            .await
            .unwrap();
        self.db.get_base_locale(&bal.id).await.unwrap().unwrap()
    }

    /// Add a numéro so the BaseLocale's `updated_at` moves forward
    pub async fn edit(&self, bal: &BaseLocale, numero: u32) {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let voie = self.db.create_voie(&bal.id, "Impasse du Lavoir").await.unwrap();
        self.db
            .create_numero(&bal.id, &NewNumero::new(voie.id, numero))
            .await
            .unwrap();
    }
}
