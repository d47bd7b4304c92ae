use sqlx::SqliteConnection;

use crate::{
    db_types::{PaymentTransaction, SettlementStatus},
    traits::DonationGatewayError,
};

/// Returns the settlement ledger entry linked to the given donation, if any.
pub async fn fetch_for_donation(
    donation_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM payment_transactions WHERE donation_id = $1")
        .bind(donation_id)
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// Mirrors the settlement status onto the transaction linked to a donation. A no-op if the donation has no linked
/// transaction. `paid_at` is stamped only when the transaction settles.
pub(crate) async fn set_status_for_donation(
    donation_id: i64,
    status: SettlementStatus,
    conn: &mut SqliteConnection,
) -> Result<(), DonationGatewayError> {
    let paid_at_clause = match status {
        SettlementStatus::Settled => ", paid_at = CURRENT_TIMESTAMP",
        _ => "",
    };
    let query = format!(
        "UPDATE payment_transactions SET status = $1, updated_at = CURRENT_TIMESTAMP{paid_at_clause} WHERE \
         donation_id = $2"
    );
    sqlx::query(&query).bind(status.to_string()).bind(donation_id).execute(conn).await?;
    Ok(())
}
