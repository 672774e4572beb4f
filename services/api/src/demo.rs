use axum::body::Bytes;
use clap::Args;
use roomshare::error::AppError;
use roomshare::marketplace::accounts::Registration;
use roomshare::marketplace::{
    ApiState, ListingDraft, ListingId, LocalImageStore, MarketplaceError, PasswordHasher,
    PublishOutcome, SqliteStore, TokenIssuer, UploadedImage, UserId, WaivedPayments,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Image file to attach to the demo listing (repeatable)
    #[arg(long = "image")]
    pub(crate) images: Vec<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(SqliteStore::in_memory().await?);

    let upload_dir = std::env::temp_dir().join(format!(
        "roomshare-demo-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_millis()
    ));
    let hasher = PasswordHasher::with_cost(8 * 1024, 1).unwrap_or_default();
    let api = ApiState::assemble(
        store.clone(),
        Arc::new(TokenIssuer::new("demo-secret", chrono::Duration::hours(1))),
        hasher,
        Arc::new(LocalImageStore::new(&upload_dir)),
        Arc::new(WaivedPayments),
        5,
    );

    let owner = api.accounts.register(account("olivia")).await?.user_id;
    let applicant = api.accounts.register(account("sam")).await?.user_id;
    println!("Registered owner #{owner} and applicant #{applicant}");

    let images = read_images(&args.images).await?;
    let draft = ListingDraft {
        location: Some("12 Harbour Street".to_string()),
        rent_amount: Some(750.0),
        room_type: Some("private".to_string()),
        available_date: Some("2025-09-01".to_string()),
        roommates_needed: Some(1),
        amenities: Some(vec!["wifi".to_string(), "laundry".to_string()]),
        house_rules: Some("No smoking indoors".to_string()),
        contact_preferences: Some("email".to_string()),
        payment_token: None,
    };
    let listing = match api.listings.publish(owner, &draft, images).await? {
        PublishOutcome::Published { listing_id, images } => {
            println!("Published listing #{listing_id} with {} image(s)", images.len());
            listing_id
        }
        PublishOutcome::ImagesFailed { listing_id, error } => {
            println!("Published listing #{listing_id}; images were rejected: {error}");
            listing_id
        }
    };

    for summary in api.listings.list_active().await? {
        println!(
            "  active: #{} {} at {:.2}/month, featured image {}",
            summary.id,
            summary.location,
            summary.rent_amount,
            summary.featured_image.as_deref().unwrap_or("none")
        );
    }
    println!(
        "Listings up to 500/month: {}",
        api.listings.search(Some(500.0)).await?.len()
    );

    let application = api.applications.submit(listing, applicant).await?;
    println!("Applicant #{applicant} submitted application #{application}");
    match api.applications.submit(listing, applicant).await {
        Err(MarketplaceError::Conflict(reason)) => println!("Second application refused: {reason}"),
        Err(other) => return Err(other.into()),
        Ok(id) => println!("Unexpectedly accepted a second application #{id}"),
    }

    report_received(&api, listing, owner).await?;
    let status = api
        .applications
        .update_status(application, owner, "accepted")
        .await?;
    println!("Owner marked application #{application} as {}", status.label());

    api.listings.soft_delete(listing, owner).await?;
    println!(
        "Listing #{listing} deactivated; {} active listing(s) remain",
        api.listings.list_active().await?.len()
    );
    for mine in api.applications.list_mine(applicant).await? {
        println!(
            "  applicant still sees #{} for {} ({}, listing {})",
            mine.id,
            mine.location,
            mine.status.label(),
            mine.listing_status.label()
        );
    }

    store.close().await;
    if tokio::fs::try_exists(&upload_dir).await? {
        tokio::fs::remove_dir_all(&upload_dir).await?;
    }
    Ok(())
}

fn account(username: &str) -> Registration {
    Registration {
        username: Some(username.to_string()),
        password: Some(format!("{username}-password")),
        email: Some(format!("{username}@example.com")),
        name: Some(username.to_string()),
        phone: None,
    }
}

async fn read_images(paths: &[PathBuf]) -> Result<Vec<UploadedImage>, AppError> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await?;
        images.push(UploadedImage {
            file_name: Some(display_name(path)),
            content_type: Some(
                mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
            ),
            bytes: Bytes::from(bytes),
        });
    }
    Ok(images)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn report_received(
    api: &ApiState<SqliteStore>,
    listing: ListingId,
    owner: UserId,
) -> Result<(), AppError> {
    let received = api.applications.list_for_listing(listing, owner).await?;
    println!("Owner sees {} application(s) for listing #{listing}", received.len());
    for application in received {
        println!(
            "  #{} from {} <{}> ({})",
            application.id,
            application.applicant_name.as_deref().unwrap_or("unnamed"),
            application.applicant_email,
            application.status.label()
        );
    }
    Ok(())
}
