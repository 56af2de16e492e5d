mod common;

use assert_matches::assert_matches;
use common::TestApp;
use chrono::{Duration as ChronoDuration, Utc};
use fitmarket_api::{
    entities::{
        outbox_event::{self, OutboxStatus},
        user, Role, RoleKind,
    },
    errors::ServiceError,
    events::{
        outbox::{self, drain_once, OutboxSettings},
        Broadcaster, Mailer, Notification, NotificationDispatcher,
    },
    services::{partners::PartnerRequest, role_entities::RoleEntityRequest},
};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use std::sync::Arc;
use std::time::Duration;

fn partner_request(role: RoleKind) -> PartnerRequest {
    PartnerRequest {
        role,
        company_name: Some("Iron Works".into()),
        contact_number: Some("555-0199".into()),
        user_id: None,
    }
}

fn profile_request(name: &str) -> RoleEntityRequest {
    RoleEntityRequest {
        id: None,
        partner_id: None,
        name: name.to_string(),
        email: Some("coach@example.com".into()),
        contact_number: None,
        address: None,
        description: Some("Strength coaching".into()),
    }
}

async fn role_of(app: &TestApp, id: i32) -> Role {
    user::Entity::find_by_id(id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
        .role
}

#[tokio::test]
async fn unapproved_partner_cannot_create_a_profile() {
    let app = TestApp::new().await;
    let coach = app.create_user("coach@example.com", Role::User).await;
    let services = &app.state.services;

    services
        .partners
        .apply_partner(&app.caller(&coach), partner_request(RoleKind::Trainer))
        .await
        .unwrap();

    let err = services
        .role_entities
        .add_role_entity(&app.caller(&coach), RoleKind::Trainer, profile_request("Coach K"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BadRequest(msg) if msg == "Partner is not approved yet");
}

#[tokio::test]
async fn duplicate_application_conflicts() {
    let app = TestApp::new().await;
    let coach = app.create_user("coach@example.com", Role::User).await;
    let partners = app.state.services.partners.clone();

    partners
        .apply_partner(&app.caller(&coach), partner_request(RoleKind::Driver))
        .await
        .unwrap();
    assert_matches!(
        partners
            .apply_partner(&app.caller(&coach), partner_request(RoleKind::Driver))
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn admin_path_rejects_a_partner_of_another_kind() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", Role::Admin).await;
    let driver = app.create_user("driver@example.com", Role::User).await;
    let services = &app.state.services;

    let partner = services
        .partners
        .apply_partner(&app.caller(&driver), partner_request(RoleKind::Driver))
        .await
        .unwrap();
    services
        .partners
        .update_partner_status(&app.caller(&admin), partner.id)
        .await
        .unwrap();

    let mut request = profile_request("Fast Wheels");
    request.partner_id = Some(partner.id);
    let err = services
        .role_entities
        .add_role_entity(&app.caller(&admin), RoleKind::Store, request)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BadRequest(msg) if msg.contains("applied as driver"));
}

#[tokio::test]
async fn self_path_without_matching_application_is_refused() {
    let app = TestApp::new().await;
    let coach = app.create_user("coach@example.com", Role::User).await;

    app.state
        .services
        .partners
        .apply_partner(&app.caller(&coach), partner_request(RoleKind::Driver))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .role_entities
        .add_role_entity(&app.caller(&coach), RoleKind::Trainer, profile_request("Coach K"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BadRequest(msg) if msg == "Partner not found");
}

#[tokio::test]
async fn activation_syncs_the_owner_role_both_ways() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", Role::Admin).await;
    let coach = app.create_user("coach@example.com", Role::User).await;
    let services = &app.state.services;

    let partner = services
        .partners
        .apply_partner(&app.caller(&coach), partner_request(RoleKind::Trainer))
        .await
        .unwrap();
    assert!(!partner.status);
    let approved = services
        .partners
        .update_partner_status(&app.caller(&admin), partner.id)
        .await
        .unwrap();
    assert!(approved.status);

    let profile = services
        .role_entities
        .add_role_entity(&app.caller(&coach), RoleKind::Trainer, profile_request("Coach K"))
        .await
        .unwrap();
    assert!(!profile.active);
    assert_eq!(profile.user_id, coach.id);

    // inactive profiles cannot be flipped by their owner
    assert_matches!(
        services
            .role_entities
            .update_role_entity_status(&app.caller(&coach), RoleKind::Trainer, profile.id)
            .await,
        Err(ServiceError::Unauthorized(_))
    );

    let activated = services
        .role_entities
        .update_role_entity_status(&app.caller(&admin), RoleKind::Trainer, profile.id)
        .await
        .unwrap();
    assert!(activated.active);
    assert_eq!(role_of(&app, coach.id).await, Role::Trainer);

    // owner may deactivate while active
    let deactivated = services
        .role_entities
        .update_role_entity_status(&app.caller(&coach), RoleKind::Trainer, profile.id)
        .await
        .unwrap();
    assert!(!deactivated.active);
    assert_eq!(role_of(&app, coach.id).await, Role::User);

    assert_matches!(
        services
            .role_entities
            .add_role_entity(&app.caller(&coach), RoleKind::Trainer, profile_request("Coach Q"))
            .await,
        Err(ServiceError::BadRequest(msg)) if msg == "User is already associated with a role profile"
    );
}

#[tokio::test]
async fn profiles_hidden_from_others_until_active() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", Role::Admin).await;
    let coach = app.create_user("coach@example.com", Role::User).await;
    let visitor = app.create_user("visitor@example.com", Role::User).await;
    let services = &app.state.services;

    let partner = services
        .partners
        .apply_partner(&app.caller(&coach), partner_request(RoleKind::Center))
        .await
        .unwrap();
    services
        .partners
        .update_partner_status(&app.caller(&admin), partner.id)
        .await
        .unwrap();
    let profile = services
        .role_entities
        .add_role_entity(&app.caller(&coach), RoleKind::Center, profile_request("Gym One"))
        .await
        .unwrap();

    let kind = RoleKind::Center;
    assert!(services
        .role_entities
        .list_role_entities(&app.caller(&visitor), kind)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        services
            .role_entities
            .list_role_entities(&app.caller(&coach), kind)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_matches!(
        services
            .role_entities
            .get_role_entity(&app.caller(&visitor), kind, profile.id)
            .await,
        Err(ServiceError::NotFound(_))
    );

    services
        .role_entities
        .update_role_entity_status(&app.caller(&admin), kind, profile.id)
        .await
        .unwrap();
    assert_eq!(
        services
            .role_entities
            .list_role_entities(&app.caller(&visitor), kind)
            .await
            .unwrap()
            .len(),
        1
    );

    // another kind never sees it
    assert!(services
        .role_entities
        .list_role_entities(&app.caller(&admin), RoleKind::Store)
        .await
        .unwrap()
        .is_empty());

    // partner cannot be removed while it backs the profile
    assert_matches!(
        services
            .partners
            .delete_partner(&app.caller(&admin), partner.id)
            .await,
        Err(ServiceError::Conflict(_))
    );

    services
        .role_entities
        .delete_role_entity(&app.caller(&admin), kind, profile.id)
        .await
        .unwrap();
    assert_eq!(role_of(&app, coach.id).await, Role::User);
    services
        .partners
        .delete_partner(&app.caller(&admin), partner.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn workflow_notifications_go_through_the_outbox() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", Role::Admin).await;
    let coach = app.create_user("coach@example.com", Role::User).await;
    let services = &app.state.services;
    let mut feed = app.dispatcher.broadcaster().subscribe();

    let partner = services
        .partners
        .apply_partner(&app.caller(&coach), partner_request(RoleKind::Trainer))
        .await
        .unwrap();
    // broadcast + admin email
    assert_eq!(outbox_event::Entity::find().count(&*app.db).await.unwrap(), 2);

    services
        .partners
        .update_partner_status(&app.caller(&admin), partner.id)
        .await
        .unwrap();
    let profile = services
        .role_entities
        .add_role_entity(&app.caller(&coach), RoleKind::Trainer, profile_request("Coach K"))
        .await
        .unwrap();
    services
        .role_entities
        .update_role_entity_status(&app.caller(&admin), RoleKind::Trainer, profile.id)
        .await
        .unwrap();
    // + approval email, profile broadcast, two activation emails
    assert_eq!(outbox_event::Entity::find().count(&*app.db).await.unwrap(), 6);

    let report = drain_once(&app.db, &app.dispatcher, &OutboxSettings::default())
        .await
        .unwrap();
    assert_eq!(report.claimed, 6);
    assert_eq!(report.delivered, 6);
    assert_eq!(report.failed, 0);

    let sent = app.mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].0, vec!["admin@example.com".to_string()]);
    assert!(sent
        .iter()
        .any(|(to, subject)| to == &vec!["coach@example.com".to_string()]
            && subject == "Your trainer profile was activated"));

    let first = feed.recv().await.unwrap();
    assert_eq!(first.topic, "partner");
    let second = feed.recv().await.unwrap();
    assert_eq!(second.topic, "trainer");

    // nothing left to deliver
    let again = drain_once(&app.db, &app.dispatcher, &OutboxSettings::default())
        .await
        .unwrap();
    assert_eq!(again.claimed, 0);
}

/// Transport that is always down
struct UnreachableMailer;

#[async_trait::async_trait]
impl Mailer for UnreachableMailer {
    async fn send(&self, _: &str, _: &[String], _: &str, _: &str) -> Result<(), String> {
        Err("smtp unreachable".to_string())
    }
}

async fn enqueue_email(app: &TestApp, to: &str) -> outbox_event::Model {
    outbox::enqueue(
        &*app.db,
        &Notification::email(vec![to.to_string()], "Hello", "Body"),
    )
    .await
    .unwrap();
    outbox_event::Entity::find()
        .all(&*app.db)
        .await
        .unwrap()
        .pop()
        .unwrap()
}

async fn reload(app: &TestApp, id: i32) -> outbox_event::Model {
    outbox_event::Entity::find_by_id(id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn stale_processing_rows_are_reclaimed_after_the_lease() {
    let app = TestApp::new().await;
    let settings = OutboxSettings {
        lease: Duration::from_secs(60),
        ..OutboxSettings::default()
    };

    // claimed by a worker that died ten minutes ago
    let stale = enqueue_email(&app, "stale@example.com").await;
    let mut active: outbox_event::ActiveModel = stale.clone().into();
    active.status = Set(OutboxStatus::Processing);
    active.attempts = Set(1);
    active.updated_at = Set(Utc::now() - ChronoDuration::minutes(10));
    active.update(&*app.db).await.unwrap();

    // claimed just now by a live worker
    let fresh = enqueue_email(&app, "fresh@example.com").await;
    let mut active: outbox_event::ActiveModel = fresh.clone().into();
    active.status = Set(OutboxStatus::Processing);
    active.attempts = Set(1);
    active.updated_at = Set(Utc::now());
    active.update(&*app.db).await.unwrap();

    let report = drain_once(&app.db, &app.dispatcher, &settings).await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.delivered, 1);

    let stale = reload(&app, stale.id).await;
    assert_eq!(stale.status, OutboxStatus::Delivered);
    assert_eq!(stale.attempts, 2);
    assert_eq!(reload(&app, fresh.id).await.status, OutboxStatus::Processing);

    let sent = app.mailer.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(vec!["stale@example.com".to_string()], "Hello".to_string())]);
}

#[tokio::test]
async fn failed_delivery_backs_off_then_gives_up() {
    let app = TestApp::new().await;
    let dispatcher = NotificationDispatcher::new(
        Arc::new(UnreachableMailer),
        Broadcaster::new(8),
        "no-reply@fitmarket.test".to_string(),
    );
    let settings = OutboxSettings {
        max_attempts: 2,
        ..OutboxSettings::default()
    };
    let row = enqueue_email(&app, "coach@example.com").await;

    let before = Utc::now();
    let first = drain_once(&app.db, &dispatcher, &settings).await.unwrap();
    assert_eq!(first.claimed, 1);
    assert_eq!(first.retried, 1);
    assert_eq!(first.failed, 0);

    let retrying = reload(&app, row.id).await;
    assert_eq!(retrying.status, OutboxStatus::Pending);
    assert_eq!(retrying.attempts, 1);
    assert!(retrying.available_at > before);
    assert_eq!(retrying.last_error.as_deref(), Some("smtp unreachable"));

    // not due yet
    let idle = drain_once(&app.db, &dispatcher, &settings).await.unwrap();
    assert_eq!(idle.claimed, 0);

    let mut active: outbox_event::ActiveModel = retrying.into();
    active.available_at = Set(Utc::now() - ChronoDuration::seconds(1));
    active.update(&*app.db).await.unwrap();

    let last = drain_once(&app.db, &dispatcher, &settings).await.unwrap();
    assert_eq!(last.failed, 1);
    assert_eq!(last.retried, 0);

    let failed = reload(&app, row.id).await;
    assert_eq!(failed.status, OutboxStatus::Failed);
    assert_eq!(failed.attempts, 2);
    assert!(failed
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("max attempts exceeded")));
}

#[tokio::test]
async fn worker_delivers_and_stops_on_shutdown() {
    let app = TestApp::new().await;
    enqueue_email(&app, "coach@example.com").await;

    let (stop, stopped) = tokio::sync::watch::channel(false);
    let settings = OutboxSettings {
        poll_interval: Duration::from_millis(10),
        ..OutboxSettings::default()
    };
    let worker = outbox::start_worker(app.db.clone(), app.dispatcher.clone(), settings, stopped);

    for _ in 0..200 {
        if !app.mailer.sent.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(app.mailer.sent.lock().unwrap().len(), 1);

    stop.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), worker)
        .await
        .expect("worker did not stop")
        .unwrap();
}
