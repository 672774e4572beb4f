use super::common::*;
use crate::marketplace::domain::{ApplicationId, ApplicationStatus, ListingId, ListingStatus};
use crate::marketplace::error::MarketplaceError;

#[tokio::test]
async fn owner_accepts_and_applicant_sees_the_decision() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;

    let application = harness
        .state
        .applications
        .submit(listing, applicant)
        .await
        .expect("submitted");

    let received = harness
        .state
        .applications
        .list_for_listing(listing, owner)
        .await
        .expect("owner can list");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id, application);
    assert_eq!(received[0].user_id, applicant);
    assert_eq!(received[0].status, ApplicationStatus::Pending);
    assert_eq!(received[0].applicant_email, "bilal@example.com");
    assert_eq!(received[0].applicant_phone.as_deref(), Some("555-0100"));

    let status = harness
        .state
        .applications
        .update_status(application, owner, "accepted")
        .await
        .expect("status updated");
    assert_eq!(status, ApplicationStatus::Accepted);

    let mine = harness
        .state
        .applications
        .list_mine(applicant)
        .await
        .expect("applicant can list");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ApplicationStatus::Accepted);
    assert_eq!(mine[0].location, "Lavasa");
    assert_eq!(mine[0].rent_amount, 5000.0);
    assert_eq!(mine[0].owner_name.as_deref(), Some("asha tester"));
}

#[tokio::test]
async fn second_submission_conflicts_whatever_the_first_status() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    let applications = &harness.state.applications;

    let first = applications.submit(listing, applicant).await.expect("submitted");
    assert!(matches!(
        applications.submit(listing, applicant).await,
        Err(MarketplaceError::Conflict(_))
    ));

    applications
        .update_status(first, owner, "rejected")
        .await
        .expect("rejected");
    assert!(matches!(
        applications.submit(listing, applicant).await,
        Err(MarketplaceError::Conflict(_))
    ));
}

#[tokio::test]
async fn concurrent_duplicate_submissions_leave_one_row() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    let applications = &harness.state.applications;

    let (left, right) = tokio::join!(
        applications.submit(listing, applicant),
        applications.submit(listing, applicant)
    );
    let outcomes = [left, right];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Err(MarketplaceError::Conflict(_)))));

    let mine = applications.list_mine(applicant).await.expect("list");
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn inactive_listing_refuses_applications_without_writing() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    harness
        .state
        .listings
        .soft_delete(listing, owner)
        .await
        .expect("soft delete");

    assert!(matches!(
        harness.state.applications.submit(listing, applicant).await,
        Err(MarketplaceError::ListingInactive)
    ));
    assert!(harness
        .state
        .applications
        .list_mine(applicant)
        .await
        .expect("list")
        .is_empty());

    assert!(matches!(
        harness.state.applications.submit(ListingId(404), applicant).await,
        Err(MarketplaceError::NotFound("listing"))
    ));
}

#[tokio::test]
async fn duplicate_is_reported_before_inactivity() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;

    harness
        .state
        .applications
        .submit(listing, applicant)
        .await
        .expect("submitted");
    harness
        .state
        .listings
        .soft_delete(listing, owner)
        .await
        .expect("soft delete");

    assert!(matches!(
        harness.state.applications.submit(listing, applicant).await,
        Err(MarketplaceError::Conflict(_))
    ));
}

#[tokio::test]
async fn received_applications_are_owner_only() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    harness
        .state
        .applications
        .submit(listing, applicant)
        .await
        .expect("submitted");

    assert!(matches!(
        harness
            .state
            .applications
            .list_for_listing(listing, applicant)
            .await,
        Err(MarketplaceError::Forbidden("listing"))
    ));
    assert!(matches!(
        harness
            .state
            .applications
            .list_for_listing(ListingId(404), owner)
            .await,
        Err(MarketplaceError::NotFound("listing"))
    ));
}

#[tokio::test]
async fn status_update_checks_existence_then_ownership_then_value() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    let application = harness
        .state
        .applications
        .submit(listing, applicant)
        .await
        .expect("submitted");
    let applications = &harness.state.applications;

    assert!(matches!(
        applications
            .update_status(ApplicationId(404), owner, "approved")
            .await,
        Err(MarketplaceError::NotFound("application"))
    ));
    assert!(matches!(
        applications.update_status(application, applicant, "approved").await,
        Err(MarketplaceError::Forbidden("application"))
    ));
    assert!(matches!(
        applications.update_status(application, applicant, "accepted").await,
        Err(MarketplaceError::Forbidden("application"))
    ));
    assert!(matches!(
        applications.update_status(application, owner, "approved").await,
        Err(MarketplaceError::InvalidInput(_))
    ));

    let mine = applications.list_mine(applicant).await.expect("list");
    assert_eq!(mine[0].status, ApplicationStatus::Pending);
}

#[tokio::test]
async fn status_can_be_overwritten_in_any_direction() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let listing = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    let applications = &harness.state.applications;
    let application = applications.submit(listing, applicant).await.expect("submitted");

    for status in ["accepted", "pending", "rejected", "rejected"] {
        applications
            .update_status(application, owner, status)
            .await
            .expect("overwrite allowed");
    }

    let mine = applications.list_mine(applicant).await.expect("list");
    assert_eq!(mine[0].status, ApplicationStatus::Rejected);
}

#[tokio::test]
async fn applications_outlive_a_soft_deleted_listing() {
    let harness = harness().await;
    let owner = register(&harness, "asha").await.user_id;
    let applicant = register(&harness, "bilal").await.user_id;
    let kept = create_listing(&harness, owner, "Baner", 6000.0).await;
    let removed = create_listing(&harness, owner, "Lavasa", 5000.0).await;
    let applications = &harness.state.applications;

    let older = applications.submit(kept, applicant).await.expect("submitted");
    let newer = applications.submit(removed, applicant).await.expect("submitted");
    harness
        .state
        .listings
        .soft_delete(removed, owner)
        .await
        .expect("soft delete");

    let mine = applications.list_mine(applicant).await.expect("list");
    let ids: Vec<ApplicationId> = mine.iter().map(|application| application.id).collect();
    assert_eq!(ids, vec![newer, older]);
    assert_eq!(mine[0].listing_status, ListingStatus::Inactive);
    assert_eq!(mine[0].status, ApplicationStatus::Pending);
    assert_eq!(mine[1].listing_status, ListingStatus::Active);
}
