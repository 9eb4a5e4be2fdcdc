//! `PostgreSQL` implementation of [`AddressStore`].

use address_book_core::{
    Address, AddressId, AddressKind, CountryId, DefaultFlags, DefaultRole, RegionId, UserId,
    ValidationFlag,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use super::{AddressStore, Region, RepositoryError};

const SELECT_ADDRESS: &str = r"
    SELECT ca.id_customer_address, ca.fk_customer, ca.first_name, ca.last_name,
           ca.phone, ca.alternate_phone, ca.address1, ca.address2, ca.city,
           ca.fk_customer_address_region, r.name AS region_name, ca.postcode,
           ca.fk_country, ca.is_default_billing, ca.is_default_shipping,
           ca.address_type, COALESCE(adi.sms_opt, FALSE) AS sms_opt,
           ca.validation_flag, ca.created_at, ca.updated_at
    FROM customer_address ca
    JOIN customer_address_region r
      ON r.id_customer_address_region = ca.fk_customer_address_region
    LEFT JOIN customer_additional_info adi ON adi.fk_customer = ca.fk_customer
    WHERE ca.fk_customer = $1
";

/// An address row as stored: phone columns hold ciphertext.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredAddress {
    #[sqlx(rename = "id_customer_address")]
    pub id: AddressId,
    #[sqlx(rename = "fk_customer")]
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub address1: String,
    pub address2: String,
    pub city: String,
    #[sqlx(rename = "fk_customer_address_region")]
    pub region_id: RegionId,
    pub region_name: String,
    pub postcode: String,
    #[sqlx(rename = "fk_country")]
    pub country_id: CountryId,
    pub is_default_billing: bool,
    pub is_default_shipping: bool,
    pub address_type: String,
    pub sms_opt: bool,
    pub validation_flag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredAddress {
    /// Encrypted phone columns, empty when unset.
    #[must_use]
    pub fn encrypted_phones(&self) -> [String; 2] {
        [
            self.phone.clone().unwrap_or_default(),
            self.alternate_phone.clone().unwrap_or_default(),
        ]
    }

    /// Combine the row with its decrypted phone numbers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if `validation_flag` holds
    /// an unknown code.
    pub fn into_address(
        self,
        phone: String,
        alternate_phone: String,
    ) -> Result<Address, RepositoryError> {
        let validation_flag = ValidationFlag::from_code(&self.validation_flag).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "invalid validation_flag '{}' on address {}",
                self.validation_flag, self.id
            ))
        })?;

        Ok(Address {
            id: self.id,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            address1: self.address1,
            address2: self.address2,
            city: self.city,
            region_id: self.region_id,
            region_name: self.region_name,
            postcode: self.postcode,
            country_id: self.country_id,
            phone,
            alternate_phone,
            is_default_billing: self.is_default_billing,
            is_default_shipping: self.is_default_shipping,
            address_type: AddressKind::from_column(&self.address_type),
            sms_opt: self.sms_opt,
            validation_flag,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Column values written on insert and update.
///
/// `None` fields are left untouched on update and stored empty on insert.
/// Phones must already be encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRow {
    pub first_name: String,
    pub last_name: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub region_id: RegionId,
    pub country_id: CountryId,
    pub postcode: String,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub address_type: Option<AddressKind>,
    pub sms_opt: Option<bool>,
    pub validation_flag: ValidationFlag,
}

/// Address store backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgAddressStore {
    pool: PgPool,
}

impl PgAddressStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict(db_err.message().to_owned());
    }
    RepositoryError::Database(err)
}

async fn upsert_sms_opt(
    tx: &mut sqlx::PgConnection,
    user: UserId,
    sms_opt: Option<bool>,
) -> Result<(), RepositoryError> {
    let Some(sms_opt) = sms_opt else {
        return Ok(());
    };
    sqlx::query(
        r"
        INSERT INTO customer_additional_info (fk_customer, sms_opt)
        VALUES ($1, $2)
        ON CONFLICT (fk_customer) DO UPDATE SET sms_opt = EXCLUDED.sms_opt
        ",
    )
    .bind(user)
    .bind(sms_opt)
    .execute(tx)
    .await?;
    Ok(())
}

impl AddressStore for PgAddressStore {
    #[instrument(skip(self))]
    async fn find_region(&self, region: RegionId) -> Result<Option<Region>, RepositoryError> {
        let region = sqlx::query_as::<_, Region>(
            r"
            SELECT id_customer_address_region, name, fk_country
            FROM customer_address_region
            WHERE id_customer_address_region = $1
            ",
        )
        .bind(region)
        .fetch_optional(&self.pool)
        .await?;
        Ok(region)
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn count_addresses(&self, user: UserId) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customer_address WHERE fk_customer = $1")
                .bind(user)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn list_addresses(&self, user: UserId) -> Result<Vec<StoredAddress>, RepositoryError> {
        let query = format!("{SELECT_ADDRESS} ORDER BY ca.id_customer_address");
        let rows = sqlx::query_as::<_, StoredAddress>(&query)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(user_id = %user, address_id = %id))]
    async fn find_address(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<StoredAddress>, RepositoryError> {
        let query = format!("{SELECT_ADDRESS} AND ca.id_customer_address = $2");
        let row = sqlx::query_as::<_, StoredAddress>(&query)
            .bind(user)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self), fields(user_id = %user, address_id = %id))]
    async fn default_flags(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<DefaultFlags>, RepositoryError> {
        let flags: Option<(bool, bool)> = sqlx::query_as(
            r"
            SELECT is_default_billing, is_default_shipping
            FROM customer_address
            WHERE id_customer_address = $1 AND fk_customer = $2
            ",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        Ok(flags.map(|(billing, shipping)| DefaultFlags { billing, shipping }))
    }

    #[instrument(skip(self, row), fields(user_id = %user))]
    async fn insert_address(
        &self,
        user: UserId,
        row: &AddressRow,
        make_default: bool,
    ) -> Result<AddressId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: AddressId = sqlx::query_scalar(
            r"
            INSERT INTO customer_address (
                fk_customer, first_name, last_name, phone, alternate_phone,
                address1, address2, city, fk_customer_address_region, postcode,
                fk_country, is_default_billing, is_default_shipping,
                address_type, validation_flag
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12, $13, $14)
            RETURNING id_customer_address
            ",
        )
        .bind(user)
        .bind(&row.first_name)
        .bind(row.last_name.as_deref().unwrap_or_default())
        .bind(row.phone.as_deref())
        .bind(row.alternate_phone.as_deref())
        .bind(&row.address1)
        .bind(row.address2.as_deref().unwrap_or_default())
        .bind(&row.city)
        .bind(row.region_id)
        .bind(&row.postcode)
        .bind(row.country_id)
        .bind(make_default)
        .bind(row.address_type.unwrap_or_default().as_str())
        .bind(row.validation_flag.as_code())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        upsert_sms_opt(&mut tx, user, row.sms_opt).await?;

        tx.commit().await?;
        Ok(id)
    }

    #[instrument(skip(self, row), fields(user_id = %user, address_id = %id))]
    async fn update_address(
        &self,
        user: UserId,
        id: AddressId,
        row: &AddressRow,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE customer_address SET
                first_name = $3,
                last_name = COALESCE($4, last_name),
                phone = COALESCE($5, phone),
                alternate_phone = COALESCE($6, alternate_phone),
                address1 = $7,
                address2 = COALESCE($8, address2),
                city = $9,
                fk_customer_address_region = $10,
                postcode = $11,
                fk_country = $12,
                address_type = COALESCE($13, address_type),
                validation_flag = $14,
                updated_at = NOW()
            WHERE fk_customer = $1 AND id_customer_address = $2
            ",
        )
        .bind(user)
        .bind(id)
        .bind(&row.first_name)
        .bind(row.last_name.as_deref())
        .bind(row.phone.as_deref())
        .bind(row.alternate_phone.as_deref())
        .bind(&row.address1)
        .bind(row.address2.as_deref())
        .bind(&row.city)
        .bind(row.region_id)
        .bind(&row.postcode)
        .bind(row.country_id)
        .bind(row.address_type.map(AddressKind::as_str))
        .bind(row.validation_flag.as_code())
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        upsert_sms_opt(&mut tx, user, row.sms_opt).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(user_id = %user, address_id = %id))]
    async fn delete_address(&self, user: UserId, id: AddressId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM customer_address WHERE fk_customer = $1 AND id_customer_address = $2",
        )
        .bind(user)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(user_id = %user, address_id = %id, role = %role))]
    async fn set_default(
        &self,
        user: UserId,
        id: AddressId,
        role: DefaultRole,
    ) -> Result<u64, RepositoryError> {
        let column = role.column();
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent promotions for the same user.
        sqlx::query("SELECT 1 FROM customer_address WHERE fk_customer = $1 FOR UPDATE")
            .bind(user)
            .execute(&mut *tx)
            .await?;

        let promoted = sqlx::query(&format!(
            "UPDATE customer_address SET {column} = TRUE, updated_at = NOW() \
             WHERE fk_customer = $1 AND id_customer_address = $2"
        ))
        .bind(user)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if promoted == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        sqlx::query(&format!(
            "UPDATE customer_address SET {column} = FALSE, updated_at = NOW() \
             WHERE fk_customer = $1 AND id_customer_address <> $2 AND {column}"
        ))
        .bind(user)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(promoted)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
