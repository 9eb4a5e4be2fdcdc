//! Address book lifecycle against in-memory fakes.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use address_book_core::{AddressFilter, AddressId, DefaultRole, UserId};
use address_book_integration_tests::{Harness, KARNATAKA, address_request, settle, user};
use address_book_service::services::{AddressError, AddressPage, Page};

async fn create(harness: &Harness, owner: UserId, name: &str) -> AddressId {
    harness
        .service
        .create(owner, &address_request(name), None)
        .await
        .unwrap()
        .id
}

async fn list(harness: &Harness, owner: UserId, filter: AddressFilter) -> AddressPage {
    harness
        .service
        .list(owner, filter, Page::default())
        .await
        .unwrap()
}

fn ids(page: &AddressPage) -> Vec<AddressId> {
    let mut ids: Vec<AddressId> = page.address_list.iter().map(|a| a.id).collect();
    ids.sort_by_key(|id| id.as_i32());
    ids
}

/// Default holders as stored, counted per role.
fn stored_defaults(harness: &Harness, owner: UserId) -> (usize, usize) {
    let rows = harness.store.rows(owner);
    (
        rows.iter().filter(|r| r.is_default_billing).count(),
        rows.iter().filter(|r| r.is_default_shipping).count(),
    )
}

#[tokio::test]
async fn test_first_address_holds_both_roles() {
    let harness = Harness::new();
    let address = harness
        .service
        .create(user(1), &address_request("Asha"), Some(DefaultRole::Shipping))
        .await
        .unwrap();

    assert!(address.is_default_billing);
    assert!(address.is_default_shipping);
    assert_eq!(address.region_name, "Maharashtra");
    assert_eq!(address.phone, "+919812345678");
}

#[tokio::test]
async fn test_later_addresses_hold_no_role() {
    let harness = Harness::new();
    create(&harness, user(1), "Asha").await;
    let second = harness
        .service
        .create(user(1), &address_request("Bela"), None)
        .await
        .unwrap();

    assert!(!second.is_default_billing);
    assert!(!second.is_default_shipping);
    assert_eq!(stored_defaults(&harness, user(1)), (1, 1));
}

#[tokio::test]
async fn test_list_slices() {
    let harness = Harness::new();
    let a = create(&harness, user(1), "Asha").await;
    let b = create(&harness, user(1), "Bela").await;
    let c = create(&harness, user(1), "Chitra").await;
    settle().await;

    let all = list(&harness, user(1), AddressFilter::All).await;
    assert_eq!(all.summary.count, 3);
    assert_eq!(ids(&all), vec![a, b, c]);

    let billing = list(&harness, user(1), AddressFilter::Billing).await;
    assert_eq!(ids(&billing), vec![a]);

    let shipping = list(&harness, user(1), AddressFilter::Shipping).await;
    assert_eq!(ids(&shipping), vec![a]);

    let other = list(&harness, user(1), AddressFilter::Other).await;
    assert_eq!(other.summary.count, 2);
    assert_eq!(ids(&other), vec![b, c]);
}

#[tokio::test]
async fn test_list_of_new_user_is_empty() {
    let harness = Harness::new();
    let page = list(&harness, user(9), AddressFilter::All).await;
    assert_eq!(page.summary.count, 0);
    assert!(page.address_list.is_empty());

    let billing = list(&harness, user(9), AddressFilter::Billing).await;
    assert!(billing.address_list.is_empty());
}

#[tokio::test]
async fn test_oversized_limit_uses_default_page() {
    let harness = Harness::new();
    for n in 0..12 {
        create(&harness, user(1), &format!("Guest{n}")).await;
    }
    settle().await;

    let page = Page::parse(Some("1000"), None).unwrap();
    let listed = harness
        .service
        .list(user(1), AddressFilter::All, page)
        .await
        .unwrap();
    assert_eq!(listed.summary.count, 10);

    let tail = Page::parse(Some("10"), Some("10")).unwrap();
    let rest = harness
        .service
        .list(user(1), AddressFilter::All, tail)
        .await
        .unwrap();
    assert_eq!(rest.summary.count, 2);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let harness = Harness::new();
    let mine = create(&harness, user(1), "Asha").await;
    create(&harness, user(2), "Bela").await;

    let theirs = list(&harness, user(2), AddressFilter::All).await;
    assert_eq!(theirs.summary.count, 1);
    assert!(theirs.address_list.iter().all(|a| a.id != mine));

    let err = harness.service.delete(user(2), mine).await.unwrap_err();
    assert!(matches!(err, AddressError::NotFound));
}

#[tokio::test]
async fn test_delete_default_billing_is_refused() {
    let harness = Harness::new();
    let a = create(&harness, user(1), "Asha").await;
    create(&harness, user(1), "Bela").await;

    let err = harness.service.delete(user(1), a).await.unwrap_err();
    assert!(
        matches!(&err, AddressError::Conflict(msg) if msg == "Cannot delete default billing address")
    );
    assert_eq!(harness.store.rows(user(1)).len(), 2);
}

#[tokio::test]
async fn test_delete_default_shipping_is_refused() {
    let harness = Harness::new();
    create(&harness, user(1), "Asha").await;
    let b = create(&harness, user(1), "Bela").await;
    harness
        .service
        .set_default(user(1), b, DefaultRole::Shipping)
        .await
        .unwrap();

    let err = harness.service.delete(user(1), b).await.unwrap_err();
    assert!(
        matches!(&err, AddressError::Conflict(msg) if msg == "Select a different default delivery address first.")
    );
}

#[tokio::test]
async fn test_delete_returns_remaining() {
    let harness = Harness::new();
    let a = create(&harness, user(1), "Asha").await;
    let b = create(&harness, user(1), "Bela").await;
    let c = create(&harness, user(1), "Chitra").await;
    settle().await;
    list(&harness, user(1), AddressFilter::All).await;

    let remaining = harness.service.delete(user(1), b).await.unwrap();
    assert_eq!(remaining.summary.count, 2);
    assert_eq!(ids(&remaining), vec![a, c]);

    let err = harness.service.delete(user(1), b).await.unwrap_err();
    assert!(matches!(err, AddressError::NotFound));
}

#[tokio::test]
async fn test_set_default_moves_role() {
    let harness = Harness::new();
    let a = create(&harness, user(1), "Asha").await;
    let b = create(&harness, user(1), "Bela").await;
    settle().await;
    list(&harness, user(1), AddressFilter::All).await;

    harness
        .service
        .set_default(user(1), b, DefaultRole::Billing)
        .await
        .unwrap();

    let billing = list(&harness, user(1), AddressFilter::Billing).await;
    assert_eq!(ids(&billing), vec![b]);
    let shipping = list(&harness, user(1), AddressFilter::Shipping).await;
    assert_eq!(ids(&shipping), vec![a]);
    assert_eq!(stored_defaults(&harness, user(1)), (1, 1));
}

#[tokio::test]
async fn test_set_default_is_idempotent() {
    let harness = Harness::new();
    create(&harness, user(1), "Asha").await;
    let b = create(&harness, user(1), "Bela").await;

    harness
        .service
        .set_default(user(1), b, DefaultRole::Billing)
        .await
        .unwrap();
    let after_first: Vec<_> = harness
        .store
        .rows(user(1))
        .into_iter()
        .map(|r| (r.id, r.is_default_billing, r.is_default_shipping, r.updated_at))
        .collect();

    harness
        .service
        .set_default(user(1), b, DefaultRole::Billing)
        .await
        .unwrap();
    let after_second: Vec<_> = harness
        .store
        .rows(user(1))
        .into_iter()
        .map(|r| (r.id, r.is_default_billing, r.is_default_shipping, r.updated_at))
        .collect();

    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_set_default_unknown_address() {
    let harness = Harness::new();
    create(&harness, user(1), "Asha").await;

    let err = harness
        .service
        .set_default(user(1), AddressId::new(999), DefaultRole::Billing)
        .await
        .unwrap_err();
    assert!(matches!(err, AddressError::NotFound));
}

#[tokio::test]
async fn test_create_with_default_promotes() {
    let harness = Harness::new();
    let a = create(&harness, user(1), "Asha").await;
    let b = harness
        .service
        .create(user(1), &address_request("Bela"), Some(DefaultRole::Shipping))
        .await
        .unwrap();

    assert!(b.is_default_shipping);
    assert!(!b.is_default_billing);

    let rows = harness.store.rows(user(1));
    let stored_a = rows.iter().find(|r| r.id == a).unwrap();
    assert!(stored_a.is_default_billing);
    assert!(!stored_a.is_default_shipping);
}

#[tokio::test]
async fn test_update_keeps_omitted_fields() {
    let harness = Harness::new();
    let a = create(&harness, user(1), "Asha").await;

    let mut request = address_request("Asha");
    request.address2 = None;
    request.city = Some("Bengaluru".to_string());
    request.address_region = Some(KARNATAKA.to_string());
    request.postcode = Some("560001".to_string());
    harness
        .service
        .update(user(1), a, &request, None)
        .await
        .unwrap();

    let row = harness.store.rows(user(1)).remove(0);
    assert_eq!(row.city, "Bengaluru");
    assert_eq!(row.region_name, "Karnataka");
    assert_eq!(row.address2, "Shivajinagar");
}

#[tokio::test]
async fn test_update_unknown_address() {
    let harness = Harness::new();
    create(&harness, user(1), "Asha").await;

    let err = harness
        .service
        .update(user(1), AddressId::new(999), &address_request("Asha"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AddressError::NotFound));
}

#[tokio::test]
async fn test_region_checks() {
    let harness = Harness::new();

    let mut unknown = address_request("Asha");
    unknown.address_region = Some("99".to_string());
    let err = harness
        .service
        .create(user(1), &unknown, None)
        .await
        .unwrap_err();
    assert!(matches!(&err, AddressError::Validation(fields) if fields[0].field == "address_region"));

    let mut mismatch = address_request("Asha");
    mismatch.country = Some("2".to_string());
    let err = harness
        .service
        .create(user(1), &mismatch, None)
        .await
        .unwrap_err();
    assert!(matches!(&err, AddressError::Validation(fields) if fields[0].field == "country"));

    assert!(harness.store.rows(user(1)).is_empty());
}

#[tokio::test]
async fn test_single_default_after_mixed_operations() {
    let harness = Harness::new();
    let owner = user(7);
    let a = create(&harness, owner, "Asha").await;
    let b = create(&harness, owner, "Bela").await;
    let c = create(&harness, owner, "Chitra").await;
    list(&harness, owner, AddressFilter::All).await;

    let steps = [
        (b, DefaultRole::Billing),
        (c, DefaultRole::Shipping),
        (a, DefaultRole::Shipping),
        (c, DefaultRole::Billing),
        (b, DefaultRole::Shipping),
    ];
    for (id, role) in steps {
        harness.service.set_default(owner, id, role).await.unwrap();
        let (billing, shipping) = stored_defaults(&harness, owner);
        assert!(billing <= 1 && shipping <= 1);
    }

    let d = harness
        .service
        .create(owner, &address_request("Devi"), Some(DefaultRole::Billing))
        .await
        .unwrap()
        .id;
    harness
        .service
        .update(owner, a, &address_request("Asha"), Some(DefaultRole::Billing))
        .await
        .unwrap();
    harness.service.delete(owner, d).await.unwrap();

    assert_eq!(stored_defaults(&harness, owner), (1, 1));
    let rows = harness.store.rows(owner);
    assert!(rows.iter().any(|r| r.id == a && r.is_default_billing));
    assert!(rows.iter().any(|r| r.id == b && r.is_default_shipping));
}
