#![forbid(unsafe_code)]

use vecino_kernel_contracts::forum::{
    CommentDraft, PostAttachment, PostCategory, PostDraft, PostId, PostTags,
};
use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, MerchantId, MerchantRegistration,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_storage::repo::ForumRepo;
use vecino_storage::store::{StorageError, VecinoStore};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn merchant(s: &mut VecinoStore, t: &TenantId, email: &str) -> MerchantId {
    let reg = MerchantRegistration {
        full_name: "Carmen Soto".to_string(),
        email: Email::parse(email).unwrap(),
        password: "panaderia1".to_string(),
        confirm_password: "panaderia1".to_string(),
        whatsapp: None,
        relation: BusinessRelation::Owner,
        business_type: BusinessType::Bakery,
        comuna: "PUENTE_ALTO".to_string(),
    };
    s.insert_merchant(t.clone(), &reg, "h".to_string(), MonotonicTimeNs(1))
        .unwrap()
}

fn draft(title: &str, attachment: Option<PostAttachment>) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        content: "¿Alguien conoce un buen proveedor de harina?".to_string(),
        category: PostCategory::Question,
        attachment,
        tags: PostTags::parse("#harina, @vecino").unwrap(),
    }
}

#[test]
fn at_forum_db_01_posts_listed_newest_first_per_tenant() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let b = tenant("tenant_b");
    let ma = merchant(&mut s, &a, "carmen@espiga.cl");
    let mb = merchant(&mut s, &b, "carmen@espiga.cl");

    let p1 = s.insert_post_row(&a, ma, &draft("Primero", None), MonotonicTimeNs(10)).unwrap();
    let p2 = s.insert_post_row(&a, ma, &draft("Segundo", None), MonotonicTimeNs(20)).unwrap();
    s.insert_post_row(&b, mb, &draft("Otro tenant", None), MonotonicTimeNs(30)).unwrap();

    let ids: Vec<PostId> = s.post_rows_newest_first(&a).iter().map(|p| p.post_id).collect();
    assert_eq!(ids, vec![p2, p1]);
    assert_eq!(s.post_rows_newest_first(&b).len(), 1);
}

#[test]
fn at_forum_db_02_attachment_becomes_public_url() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let m = merchant(&mut s, &a, "carmen@espiga.cl");

    let up = s
        .insert_post(
            &a,
            m,
            &draft(
                "Con foto",
                Some(PostAttachment::Uploaded {
                    file_name: "vitrina.jpg".to_string(),
                }),
            ),
            MonotonicTimeNs(10),
        )
        .unwrap();
    let link = s
        .insert_post(
            &a,
            m,
            &draft(
                "Con link",
                Some(PostAttachment::ExternalLink(
                    "https://example.cl/foto.png".to_string(),
                )),
            ),
            MonotonicTimeNs(11),
        )
        .unwrap();
    assert_eq!(
        s.post(&a, up).unwrap().image_url.as_deref(),
        Some("/media/posts/vitrina.jpg")
    );
    assert_eq!(
        s.post(&a, link).unwrap().image_url.as_deref(),
        Some("https://example.cl/foto.png")
    );
    assert!(s.post(&a, up).unwrap().tags.mentions.contains("vecino"));
}

#[test]
fn at_forum_db_03_comments_oldest_first_and_fk_checked() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let m = merchant(&mut s, &a, "carmen@espiga.cl");
    let p = s.insert_post(&a, m, &draft("Hilo", None), MonotonicTimeNs(10)).unwrap();

    let c = |txt: &str| CommentDraft {
        content: txt.to_string(),
    };
    let late = s.insert_comment_row(&a, p, m, &c("después"), MonotonicTimeNs(30)).unwrap();
    let early = s.insert_comment_row(&a, p, m, &c("antes"), MonotonicTimeNs(20)).unwrap();
    let ids: Vec<_> = s.comment_rows(&a, p).iter().map(|r| r.comment_id).collect();
    assert_eq!(ids, vec![early, late]);
    assert_eq!(s.comment_count(&a, p), 2);

    assert!(matches!(
        s.insert_comment_row(&a, PostId(999), m, &c("huérfano"), MonotonicTimeNs(40)),
        Err(StorageError::ForeignKeyViolation { .. })
    ));
    assert!(matches!(
        s.insert_comment_row(&a, p, m, &c("   "), MonotonicTimeNs(40)),
        Err(StorageError::ContractViolation(_))
    ));
}

#[test]
fn at_forum_db_04_one_like_per_member() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let author = merchant(&mut s, &a, "carmen@espiga.cl");
    let fan = merchant(&mut s, &a, "fan@kiosco.cl");
    let p = s.insert_post(&a, author, &draft("Hilo", None), MonotonicTimeNs(10)).unwrap();

    s.insert_like_row(&a, p, fan).unwrap();
    assert!(matches!(
        s.insert_like_row(&a, p, fan),
        Err(StorageError::DuplicateKey { .. })
    ));
    s.insert_like_row(&a, p, author).unwrap();
    assert_eq!(s.like_count(&a, p), 2);
    assert!(s.has_liked(&a, p, fan));

    assert!(s.remove_like_row(&a, p, fan));
    assert!(!s.remove_like_row(&a, p, fan));
    assert_eq!(s.like_count(&a, p), 1);
}
