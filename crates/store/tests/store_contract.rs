use chrono::{Duration, Utc};
use physihome_store::{
    canonical_participants, open_store, DoctorDocument, DocumentKind, MemoryStore, MessageId,
    Role, SqliteStore, Store, StoreError, StoredMessage, UserId, UserRecord, VerificationStatus,
};
use std::sync::Arc;

fn user(email: &str) -> UserRecord {
    let mut u = UserRecord::new(email, Utc::now());
    u.first_name = "Asha".into();
    u.last_name = "Rao".into();
    u.password_hash = "hash".into();
    u
}

async fn users_round_trip(s: &dyn Store) {
    let mut doc = user("doc@example.com");
    doc.role = Role::Doctor;
    doc.doctor_verification_status = Some(VerificationStatus::Pending);
    doc.phone = Some("9876543210".into());
    doc.city = Some("Pune".into());
    s.insert_user(&doc).await.unwrap();

    assert!(matches!(s.insert_user(&doc).await, Err(StoreError::AlreadyExists)));

    let got = s.get_user(&doc.id).await.unwrap().unwrap();
    assert_eq!(got.role, Role::Doctor);
    assert_eq!(got.doctor_verification_status, Some(VerificationStatus::Pending));

    let by_email = s.find_user_by_email("  DOC@example.com ").await.unwrap().unwrap();
    assert_eq!(by_email.id, doc.id);
    let by_phone = s.find_user_by_phone("9876543210").await.unwrap().unwrap();
    assert_eq!(by_phone.id, doc.id);

    let mut updated = got.clone();
    updated.doctor_verification_status = Some(VerificationStatus::Verified);
    updated.pending_email = Some("New@Example.com".into());
    s.update_user(&updated).await.unwrap();
    let pending = s
        .find_user_by_pending_email("new@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.id, doc.id);

    assert_eq!(s.list_doctors().await.unwrap().len(), 1);

    s.delete_user(&doc.id).await.unwrap();
    assert!(s.get_user(&doc.id).await.unwrap().is_none());
    assert!(matches!(s.delete_user(&doc.id).await, Err(StoreError::NotFound)));
    assert!(matches!(s.update_user(&doc).await, Err(StoreError::NotFound)));
}

async fn admin_mailbox_is_insert_if_absent(s: &dyn Store) {
    let mailbox = user("a@x.com");
    assert!(s.ensure_admin_mailbox(&mailbox).await.unwrap());

    let mut second = user("A@X.com ");
    second.is_admin = true;
    assert!(!s.ensure_admin_mailbox(&second).await.unwrap());
    assert_eq!(s.find_users_by_email_key("a@x.com").await.unwrap().len(), 1);

    let mut flagged = user("other@x.com");
    flagged.is_admin = true;
    s.insert_user(&flagged).await.unwrap();
    let mut by_role = user("role@x.com");
    by_role.role = Role::Admin;
    s.insert_user(&by_role).await.unwrap();
    s.insert_user(&user("plain@x.com")).await.unwrap();

    let candidates = s
        .list_admin_candidates(&["a@x.com".to_string()])
        .await
        .unwrap();
    let mut emails: Vec<String> = candidates.into_iter().map(|u| u.email).collect();
    emails.sort();
    assert_eq!(emails, vec!["a@x.com", "other@x.com", "role@x.com"]);
}

async fn conversations_and_messages(s: &dyn Store) {
    let a = UserId::new();
    let b = UserId::new();
    let now = Utc::now();

    let key = canonical_participants([b, a]);
    let (c1, created) = s.find_or_create_conversation(&key, now).await.unwrap();
    assert!(created);
    let (c2, created) = s
        .find_or_create_conversation(&canonical_participants([a, b]), now)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(c1.id, c2.id);
    assert_eq!(c1.participants, key);

    let by_members = s.find_conversation_with_members(&[b, a]).await.unwrap().unwrap();
    assert_eq!(by_members.id, c1.id);
    assert!(s
        .find_conversation_with_members(&[a])
        .await
        .unwrap()
        .is_none());

    let t1 = now + Duration::seconds(1);
    let m = StoredMessage {
        id: MessageId::new(),
        conversation_id: c1.id,
        sender_id: a,
        ciphertext: "ct".into(),
        created_at: t1,
    };
    s.insert_message(&m).await.unwrap();
    s.touch_conversation(&c1.id, t1).await.unwrap();

    assert_eq!(s.count_unread(&c1.id, &b, None).await.unwrap(), 1);
    assert_eq!(s.count_unread(&c1.id, &a, None).await.unwrap(), 0);
    assert_eq!(s.count_unread(&c1.id, &b, Some(t1)).await.unwrap(), 0);

    s.set_last_read(&c1.id, &b, t1).await.unwrap();
    let reloaded = s.get_conversation(&c1.id).await.unwrap().unwrap();
    assert_eq!(reloaded.last_read_at.get(&b), Some(&t1));
    assert_eq!(reloaded.updated_at, t1);

    assert_eq!(s.list_messages(&c1.id, None).await.unwrap().len(), 1);
    assert!(s.list_messages(&c1.id, Some(t1)).await.unwrap().is_empty());
    assert_eq!(s.latest_message(&c1.id).await.unwrap().unwrap().id, m.id);

    let (other, _) = s
        .find_or_create_conversation(&canonical_participants([a, UserId::new()]), now)
        .await
        .unwrap();
    let listed = s.list_conversations_for(&a).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, c1.id, "most recently updated first");
    assert_eq!(listed[1].id, other.id);
}

async fn racing_creates_converge(s: Arc<dyn Store>) {
    let key = canonical_participants([UserId::new(), UserId::new()]);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let s = s.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            s.find_or_create_conversation(&key, Utc::now()).await.unwrap()
        }));
    }
    let mut ids = Vec::new();
    let mut creations = 0;
    for h in handles {
        let (conv, created) = h.await.unwrap();
        ids.push(conv.id);
        creations += created as usize;
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(creations, 1);
}

async fn doctor_documents_replace_per_kind(s: &dyn Store) {
    let doc = user("docs@example.com");
    s.insert_user(&doc).await.unwrap();

    let upload = |kind, filename: &str, byte_len| DoctorDocument {
        user_id: doc.id,
        kind,
        filename: filename.into(),
        content_type: "image/png".into(),
        byte_len,
        uploaded_at: Utc::now(),
    };
    s.upsert_doctor_document(&upload(DocumentKind::VisitingCard, "card.png", 10))
        .await
        .unwrap();
    s.upsert_doctor_document(&upload(DocumentKind::DegreePhoto, "degree.png", 20))
        .await
        .unwrap();
    s.upsert_doctor_document(&upload(DocumentKind::DegreePhoto, "degree-2.png", 30))
        .await
        .unwrap();

    let held = s.list_doctor_documents(&doc.id).await.unwrap();
    let kinds: Vec<_> = held.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, [DocumentKind::DegreePhoto, DocumentKind::VisitingCard]);
    assert_eq!(held[0].filename, "degree-2.png");
    assert_eq!(held[0].byte_len, 30);

    let stranger = UserId::new();
    let orphan = DoctorDocument {
        user_id: stranger,
        ..upload(DocumentKind::SelfPhoto, "me.png", 1)
    };
    assert!(matches!(
        s.upsert_doctor_document(&orphan).await,
        Err(StoreError::NotFound)
    ));

    s.delete_user(&doc.id).await.unwrap();
    assert!(s.list_doctor_documents(&doc.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_store_contract() {
    let s = MemoryStore::new();
    users_round_trip(&s).await;
    admin_mailbox_is_insert_if_absent(&s).await;
    conversations_and_messages(&s).await;
    doctor_documents_replace_per_kind(&s).await;
    racing_creates_converge(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn sqlite_store_contract() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    users_round_trip(&s).await;
    admin_mailbox_is_insert_if_absent(&s).await;
    conversations_and_messages(&s).await;
    doctor_documents_replace_per_kind(&s).await;
    racing_creates_converge(Arc::new(SqliteStore::open_in_memory().await.unwrap())).await;
}

#[tokio::test]
async fn sqlite_store_persists_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("physihome.db").display());
    let u = user("persist@example.com");
    {
        let s = SqliteStore::open(&url).await.unwrap();
        s.insert_user(&u).await.unwrap();
    }
    let s = SqliteStore::open(&url).await.unwrap();
    assert_eq!(s.get_user(&u.id).await.unwrap().unwrap().email, u.email);
}

#[tokio::test]
async fn open_store_falls_back_to_memory() {
    let s = open_store(None).await.unwrap();
    users_round_trip(s.as_ref()).await;
    let s = open_store(Some("sqlite::memory:")).await.unwrap();
    users_round_trip(s.as_ref()).await;
}
