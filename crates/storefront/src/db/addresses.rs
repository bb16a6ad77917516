//! Address book repository.

use sqlx::PgPool;

use marigold_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, user_id, name, phone, line1, line2, city, state, \
     postal_code, country, is_default, created_at, updated_at";

/// Repository for user addresses. Every operation is scoped to the owner.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(addresses)
    }

    /// Add an address. The user's first address, or one flagged
    /// `is_default`, becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_address_book(&mut tx, user_id).await?;

        let has_any = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM storefront.address WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let is_default = input.is_default || !has_any;

        if is_default {
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "INSERT INTO storefront.address \
             (user_id, name, phone, line1, line2, city, state, postal_code, country, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(address)
    }

    /// Replace an address's fields. `is_default = true` also makes it the
    /// default; `false` leaves the default flag as it was.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            lock_address_book(&mut tx, user_id).await?;
            clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "UPDATE storefront.address SET name = $3, phone = $4, line1 = $5, line2 = $6, \
             city = $7, state = $8, postal_code = $9, country = $10, \
             is_default = is_default OR $11 \
             WHERE id = $1 AND user_id = $2 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        Ok(address)
    }

    /// Make one address the user's only default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address;
    /// the previous default is kept.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_address_book(&mut tx, user_id).await?;

        clear_default(&mut tx, user_id).await?;

        let address = sqlx::query_as::<_, Address>(&format!(
            "UPDATE storefront.address SET is_default = TRUE \
             WHERE id = $1 AND user_id = $2 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        Ok(address)
    }

    /// Delete an address. No other address is promoted to default.
    ///
    /// # Returns
    ///
    /// Returns `false` if the user has no such address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.address WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Serialize writes that pick a default address for one user.
///
/// Two first-address inserts would otherwise both see an empty book and
/// both claim the default, tripping `address_one_default_per_user`.
async fn lock_address_book(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT 1 FROM storefront.user WHERE id = $1 FOR NO KEY UPDATE")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

async fn clear_default(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE storefront.address SET is_default = FALSE WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
