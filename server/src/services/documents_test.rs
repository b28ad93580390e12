use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use markup::geometry::Point;
use markup::{ColorTag, Shape, ShapeKind};

use super::*;
use crate::services::access::Role;
use crate::services::store::{MarkupStore, MemoryMarkupStore};
use crate::state::test_helpers::{actor, test_app_state, with_store};

const BLUEPRINT: &str = "https://blobs.example/level-2.png";

fn draft(owner: &Actor) -> MarkupDocument {
    MarkupDocument::new("Level 2 snags", BLUEPRINT, owner.user_id)
}

fn shared_draft(owner: &Actor) -> MarkupDocument {
    let mut doc = draft(owner);
    doc.set_location(Location::Shared, owner.site_id);
    doc
}

fn red_box(x: f64) -> Shape {
    Shape::new(ShapeKind::Box { origin: Point::new(x, 10.0), width: 40.0, height: 30.0, color_tag: ColorTag::Red })
}

/// Seed a stored record directly, bypassing the resolver.
async fn seed(state: &AppState, mut doc: MarkupDocument, updated_at: i64) -> MarkupDocument {
    doc.id = Some(Uuid::new_v4());
    doc.created_at = Some(updated_at);
    doc.updated_at = Some(updated_at);
    state.store.upsert(&doc).await.unwrap();
    doc
}

/// Store double that fails the first `failures` calls with a transient error.
struct FlakyStore {
    inner: MemoryMarkupStore,
    failures: AtomicU32,
    calls: AtomicU32,
    corrupt: bool,
}

impl FlakyStore {
    fn new(failures: u32) -> Self {
        Self { inner: MemoryMarkupStore::new(), failures: AtomicU32::new(failures), calls: AtomicU32::new(0), corrupt: false }
    }

    fn corrupt() -> Self {
        Self { corrupt: true, ..Self::new(u32::MAX) }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn trip(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.corrupt {
            return Err(StoreError::Corrupt { id: Uuid::nil(), reason: "bad shapes".into() });
        }
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MarkupStore for FlakyStore {
    async fn fetch(&self, id: DocumentId) -> Result<Option<MarkupDocument>, StoreError> {
        self.trip()?;
        self.inner.fetch(id).await
    }

    async fn upsert(&self, doc: &MarkupDocument) -> Result<(), StoreError> {
        self.trip()?;
        self.inner.upsert(doc).await
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<MarkupDocument>, StoreError> {
        self.trip()?;
        self.inner.list(scope).await
    }

    async fn soft_delete(&self, id: DocumentId, updated_at: i64) -> Result<bool, StoreError> {
        self.trip()?;
        self.inner.soft_delete(id, updated_at).await
    }
}

// =============================================================================
// SAVE
// =============================================================================

#[tokio::test]
async fn save_creates_with_actor_as_owner() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let mut doc = draft(&worker);
    doc.created_by = Uuid::new_v4();
    doc.push_shape(red_box(10.0)).unwrap();

    let out = save(&state, doc, &worker).await.unwrap();
    assert!(out.created);
    let id = out.document.id.expect("assigned id");
    assert_eq!(out.document.created_by, worker.user_id);
    assert!(out.document.created_at.is_some());
    assert_eq!(out.document.created_at, out.document.updated_at);
    assert_eq!(state.store.fetch(id).await.unwrap(), Some(out.document));
}

#[tokio::test]
async fn save_keeps_client_supplied_id_on_create() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let mut doc = draft(&worker);
    let id = Uuid::new_v4();
    doc.id = Some(id);

    let out = save(&state, doc, &worker).await.unwrap();
    assert!(out.created);
    assert_eq!(out.document.id, Some(id));
}

#[tokio::test]
async fn resending_a_new_document_after_a_lost_response_keeps_one_record() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let mut doc = draft(&worker);
    doc.id = Some(Uuid::new_v4());
    doc.push_shape(red_box(10.0)).unwrap();

    let first = save(&state, doc.clone(), &worker).await.unwrap();
    assert!(first.created);
    // Same request again, as a client retry would send it.
    let again = save(&state, doc, &worker).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.document, first.document);

    let listed = list_visible(&state, &worker, ListFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn shared_without_site_is_rejected_and_nothing_is_stored() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let mut doc = draft(&worker);
    doc.location = Location::Shared;

    let err = save(&state, doc, &worker).await.unwrap_err();
    assert!(matches!(err, MarkupError::Validation(ValidationError::MissingSiteId)));
    assert!(state.store.list(ListScope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn shared_to_foreign_site_is_denied() {
    let state = test_app_state();
    let worker = actor(Role::Worker, Some(Uuid::new_v4()));
    let mut doc = draft(&worker);
    doc.set_location(Location::Shared, Some(Uuid::new_v4()));

    let err = save(&state, doc, &worker).await.unwrap_err();
    assert!(matches!(err, MarkupError::PermissionDenied(_)));
}

#[tokio::test]
async fn resaving_identical_content_does_not_write() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let first = save(&state, draft(&worker), &worker).await.unwrap().document;

    let again = save(&state, first.clone(), &worker).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.document, first);
    assert_eq!(again.document.updated_at, first.updated_at);
}

#[tokio::test]
async fn updated_at_strictly_increases() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    // A stored stamp ahead of the wall clock must still be exceeded.
    let far_future = i64::MAX / 2;
    let stored = seed(&state, draft(&worker), far_future).await;

    let mut edit = stored.clone();
    edit.push_shape(red_box(5.0)).unwrap();
    let out = save(&state, edit, &worker).await.unwrap();
    assert!(!out.created);
    assert_eq!(out.document.updated_at, Some(far_future + 1));
    assert_eq!(out.document.created_at, Some(far_future));
}

#[tokio::test]
async fn update_preserves_original_owner() {
    let state = test_app_state();
    let site = Uuid::new_v4();
    let owner = actor(Role::Worker, Some(site));
    let colleague = actor(Role::SiteManager, Some(site));
    let stored = seed(&state, shared_draft(&owner), 1_000).await;

    let mut edit = stored.clone();
    edit.title = "Level 2 snags (reviewed)".into();
    edit.created_by = colleague.user_id;
    edit.created_at = Some(9_999);

    let out = save(&state, edit, &colleague).await.unwrap();
    assert_eq!(out.document.created_by, owner.user_id);
    assert_eq!(out.document.created_at, Some(1_000));
    assert_eq!(out.document.title, "Level 2 snags (reviewed)");
}

#[tokio::test]
async fn saving_over_someone_elses_personal_is_denied() {
    let state = test_app_state();
    let owner = actor(Role::Worker, None);
    let intruder = actor(Role::Worker, None);
    let stored = seed(&state, draft(&owner), 1_000).await;

    let mut edit = stored.clone();
    edit.title = "mine now".into();
    let err = save(&state, edit, &intruder).await.unwrap_err();
    assert!(matches!(err, MarkupError::PermissionDenied(_)));
    assert_eq!(state.store.fetch(stored.id.unwrap()).await.unwrap(), Some(stored));
}

#[tokio::test]
async fn admin_cannot_overwrite_personal() {
    let state = test_app_state();
    let owner = actor(Role::Worker, None);
    let admin = actor(Role::Admin, None);
    let stored = seed(&state, draft(&owner), 1_000).await;

    let mut edit = stored.clone();
    edit.description = Some("admin note".into());
    assert!(matches!(save(&state, edit, &admin).await, Err(MarkupError::PermissionDenied(_))));
}

#[tokio::test]
async fn moving_shared_to_personal_keeps_stored_owner() {
    let state = test_app_state();
    let site = Uuid::new_v4();
    let owner = actor(Role::Worker, Some(site));
    let colleague = actor(Role::Worker, Some(site));
    let stored = seed(&state, shared_draft(&owner), 1_000).await;

    // The colleague may edit the shared record but would lose access once it
    // became the owner's personal document.
    let mut edit = stored.clone();
    edit.set_location(Location::Personal, None);
    assert!(matches!(save(&state, edit.clone(), &colleague).await, Err(MarkupError::PermissionDenied(_))));

    let out = save(&state, edit, &owner).await.unwrap();
    assert_eq!(out.document.location, Location::Personal);
}

#[tokio::test]
async fn changing_blueprint_is_rejected() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let stored = seed(&state, draft(&worker), 1_000).await;

    let mut edit = MarkupDocument::new(stored.title.clone(), "https://blobs.example/level-3.png", worker.user_id);
    edit.id = stored.id;
    let err = save(&state, edit, &worker).await.unwrap_err();
    assert!(matches!(err, MarkupError::Validation(ValidationError::BlueprintChanged)));
}

#[tokio::test]
async fn saving_a_deleted_document_is_not_found() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let stored = seed(&state, draft(&worker), 1_000).await;
    delete(&state, stored.id.unwrap(), &worker).await.unwrap();

    let mut edit = stored.clone();
    edit.title = "revived".into();
    assert!(matches!(save(&state, edit, &worker).await, Err(MarkupError::NotFound(_))));
}

#[tokio::test]
async fn save_never_marks_deleted() {
    let state = test_app_state();
    let worker = actor(Role::Worker, None);
    let mut doc = draft(&worker);
    doc.is_deleted = true;

    let out = save(&state, doc, &worker).await.unwrap();
    assert!(!out.document.is_deleted);
}

// =============================================================================
// LIST / GET
// =============================================================================

#[tokio::test]
async fn list_returns_only_readable_documents() {
    let state = test_app_state();
    let site = Uuid::new_v4();
    let me = actor(Role::Worker, Some(site));
    let other = actor(Role::Worker, Some(site));
    let outsider = actor(Role::Worker, Some(Uuid::new_v4()));

    let mine = seed(&state, draft(&me), 1_000).await;
    let theirs = seed(&state, draft(&other), 2_000).await;
    let site_doc = seed(&state, shared_draft(&other), 3_000).await;
    let foreign = seed(&state, shared_draft(&outsider), 4_000).await;

    let visible = list_visible(&state, &me, ListFilter::default()).await.unwrap();
    let ids: Vec<_> = visible.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![site_doc.id, mine.id]);
    assert!(!ids.contains(&theirs.id));
    assert!(!ids.contains(&foreign.id));
}

#[tokio::test]
async fn administrators_list_everything_newest_first() {
    let state = test_app_state();
    let worker = actor(Role::Worker, Some(Uuid::new_v4()));
    let admin = actor(Role::SystemAdmin, None);
    let old = seed(&state, draft(&worker), 1_000).await;
    let new = seed(&state, shared_draft(&worker), 5_000).await;

    for admin_flag in [false, true] {
        let filter = ListFilter { admin: admin_flag, ..ListFilter::default() };
        let ids: Vec<_> = list_visible(&state, &admin, filter).await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }
}

#[tokio::test]
async fn admin_view_is_refused_for_non_administrators() {
    let state = test_app_state();
    let manager = actor(Role::SiteManager, Some(Uuid::new_v4()));
    let filter = ListFilter { admin: true, ..ListFilter::default() };
    let err = list_visible(&state, &manager, filter).await.unwrap_err();
    assert_eq!(err.error_code(), "E_PERMISSION_DENIED");
}

#[tokio::test]
async fn list_applies_location_and_site_filters() {
    let state = test_app_state();
    let site_a = Uuid::new_v4();
    let site_b = Uuid::new_v4();
    let admin = actor(Role::Admin, None);
    let worker_a = actor(Role::Worker, Some(site_a));
    let worker_b = actor(Role::Worker, Some(site_b));

    let personal = seed(&state, draft(&worker_a), 1_000).await;
    let shared_a = seed(&state, shared_draft(&worker_a), 2_000).await;
    let shared_b = seed(&state, shared_draft(&worker_b), 3_000).await;

    let only_personal = ListFilter { location: Some(Location::Personal), ..ListFilter::default() };
    let ids: Vec<_> = list_visible(&state, &admin, only_personal).await.unwrap().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![personal.id]);

    let only_b = ListFilter { site: Some(site_b), ..ListFilter::default() };
    let ids: Vec<_> = list_visible(&state, &admin, only_b).await.unwrap().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![shared_b.id]);

    let shared_for_a = ListFilter { location: Some(Location::Shared), ..ListFilter::default() };
    let ids: Vec<_> = list_visible(&state, &worker_a, shared_for_a).await.unwrap().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![shared_a.id]);
}

#[tokio::test]
async fn get_hides_unreadable_and_deleted_documents() {
    let state = test_app_state();
    let owner = actor(Role::Worker, None);
    let stranger = actor(Role::Worker, None);
    let doc = seed(&state, draft(&owner), 1_000).await;
    let id = doc.id.unwrap();

    assert_eq!(get(&state, id, &owner).await.unwrap(), doc);
    assert!(matches!(get(&state, id, &stranger).await, Err(MarkupError::NotFound(_))));
    assert!(matches!(get(&state, Uuid::new_v4(), &owner).await, Err(MarkupError::NotFound(_))));

    delete(&state, id, &owner).await.unwrap();
    assert!(matches!(get(&state, id, &owner).await, Err(MarkupError::NotFound(_))));
}

// =============================================================================
// DELETE
// =============================================================================

#[tokio::test]
async fn delete_is_soft_and_hides_from_lists() {
    let state = test_app_state();
    let owner = actor(Role::Worker, None);
    let doc = seed(&state, draft(&owner), 1_000).await;
    let id = doc.id.unwrap();

    delete(&state, id, &owner).await.unwrap();
    let kept = state.store.fetch(id).await.unwrap().expect("row kept");
    assert!(kept.is_deleted);
    assert!(kept.updated_at > doc.updated_at);
    assert!(list_visible(&state, &owner, ListFilter::default()).await.unwrap().is_empty());

    assert!(matches!(delete(&state, id, &owner).await, Err(MarkupError::NotFound(_))));
}

#[tokio::test]
async fn delete_requires_write_access() {
    let state = test_app_state();
    let site = Uuid::new_v4();
    let owner = actor(Role::Worker, None);
    let admin = actor(Role::Admin, None);
    let personal = seed(&state, draft(&owner), 1_000).await;
    let shared = seed(&state, shared_draft(&actor(Role::Worker, Some(site))), 1_000).await;

    assert!(matches!(delete(&state, personal.id.unwrap(), &admin).await, Err(MarkupError::PermissionDenied(_))));
    delete(&state, shared.id.unwrap(), &admin).await.unwrap();
    assert!(matches!(delete(&state, Uuid::new_v4(), &owner).await, Err(MarkupError::NotFound(_))));
}

// =============================================================================
// RETRY
// =============================================================================

#[tokio::test]
async fn transient_failures_are_retried() {
    let flaky = Arc::new(FlakyStore::new(2));
    let state = with_store(flaky.clone());
    let worker = actor(Role::Worker, None);

    let out = save(&state, draft(&worker), &worker).await.unwrap();
    assert!(out.created);
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_as_transient_io() {
    let flaky = Arc::new(FlakyStore::new(10));
    let state = with_store(flaky.clone());
    let worker = actor(Role::Worker, None);

    let err = list_visible(&state, &worker, ListFilter::default()).await.unwrap_err();
    assert!(matches!(err, MarkupError::TransientIo { attempts: 3, .. }));
    assert!(err.retryable());
    assert_eq!(err.error_code(), "E_TRANSIENT_IO");
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn permanent_store_errors_are_not_retried() {
    let flaky = Arc::new(FlakyStore::corrupt());
    let state = with_store(flaky.clone());
    let worker = actor(Role::Worker, None);

    let err = get(&state, Uuid::new_v4(), &worker).await.unwrap_err();
    assert!(matches!(err, MarkupError::Store(StoreError::Corrupt { .. })));
    assert!(!err.retryable());
    assert_eq!(flaky.calls(), 1);
}

#[test]
fn backoff_grows_exponentially_with_bounded_jitter() {
    assert_eq!(backoff_ms(0, 1), 0);
    for _ in 0..20 {
        let first = backoff_ms(100, 1);
        assert!((100..=150).contains(&first), "first retry delay {first}");
        let third = backoff_ms(100, 3);
        assert!((400..=600).contains(&third), "third retry delay {third}");
    }
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(MarkupError::Validation(ValidationError::EmptyTitle).error_code(), "E_VALIDATION");
    assert_eq!(MarkupError::PermissionDenied("x").error_code(), "E_PERMISSION_DENIED");
    assert_eq!(MarkupError::NotFound(Uuid::nil()).error_code(), "E_NOT_FOUND");
    assert_eq!(MarkupError::Store(StoreError::MissingId).error_code(), "E_STORE");
}
