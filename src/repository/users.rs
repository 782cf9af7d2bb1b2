//! Users table queries (read-only; accounts are managed elsewhere)

use sqlx::PgExecutor;

use crate::{error::AppResult, models::UserContact};

pub(super) async fn find_contact<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
) -> AppResult<Option<UserContact>> {
    let contact = sqlx::query_as::<_, UserContact>(
        "SELECT id, display_name, email FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(contact)
}
