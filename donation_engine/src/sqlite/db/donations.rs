use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Donation, NewDonation, Reference},
    traits::DonationGatewayError,
};

/// Inserts the donation into the database, returning `false` in the second parameter if a donation with the same
/// reference already exists.
pub async fn idempotent_insert(
    donation: NewDonation,
    conn: &mut SqliteConnection,
) -> Result<(Donation, bool), DonationGatewayError> {
    let inserted = match fetch_donation_by_reference(&donation.reference, conn).await? {
        Some(donation) => (donation, false),
        None => {
            let donation = insert_donation(donation, conn).await?;
            debug!("🗃️ Donation [{}] inserted with id {}", donation.reference, donation.id);
            (donation, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new donation using the given connection. This is not atomic. You can embed this call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_donation(donation: NewDonation, conn: &mut SqliteConnection) -> Result<Donation, DonationGatewayError> {
    let donation = sqlx::query_as(
        r#"
            INSERT INTO donations (
                campaign_id,
                amount,
                currency,
                reference
            ) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(donation.campaign_id)
    .bind(donation.amount.value())
    .bind(donation.currency)
    .bind(donation.reference)
    .fetch_one(conn)
    .await?;
    Ok(donation)
}

/// Returns the donation matching the given processor reference, if any.
pub async fn fetch_donation_by_reference(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Option<Donation>, sqlx::Error> {
    let donation = sqlx::query_as("SELECT * FROM donations WHERE reference = $1")
        .bind(reference.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(donation)
}

/// Sets the donation to `Success` and stamps `completed_at`. Clears any failure fields so that a dispute resolved
/// in the merchant's favour fully restores the record. This is a "set to" operation and is safe to re-apply.
pub(crate) async fn set_donation_succeeded(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Donation, DonationGatewayError> {
    let result: Option<Donation> = sqlx::query_as(
        r#"
        UPDATE donations SET
            status = 'Success',
            completed_at = CURRENT_TIMESTAMP,
            failed_at = NULL,
            failure_reason = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(DonationGatewayError::DonationIdNotFound(id))
}

/// Sets the donation to `Failed` with the given reason and stamps `failed_at`. Safe to re-apply.
pub(crate) async fn set_donation_failed(
    id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Donation, DonationGatewayError> {
    let result: Option<Donation> = sqlx::query_as(
        r#"
        UPDATE donations SET
            status = 'Failed',
            failed_at = CURRENT_TIMESTAMP,
            failure_reason = $1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 RETURNING *
        "#,
    )
    .bind(reason)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(DonationGatewayError::DonationIdNotFound(id))
}
