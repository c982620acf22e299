//! PostgreSQL implementation of the persistence layer.
//!
//! Invariants are enforced by the schema in `migrations/`:
//! - `uq_gigs_one_active` keeps at most one active gig per tenant;
//! - `uq_song_requests_pending` keeps at most one pending request per
//!   `(tenant, gig, song, requester)`;
//! - `uq_tip_intents_provider_payment` keeps provider order ids unique.
//!
//! Gig replacement and admission additionally take a transaction-scoped
//! advisory lock so concurrent callers serialize instead of failing on the
//! index.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{GigRow, GigSummaryRow, PendingRow, RequestRow, TenantRow, TipIntentRow};
use super::{
    AdmissionRecord, AdmitOutcome, AuditEntry, PendingFilter, Store, StoreError, StoreResult,
};
use crate::config::GatewayConfig;
use crate::domain::{
    Gig, GigHandover, GigId, GigSummary, NewGig, NewTipIntent, PendingRequestRow, RequestId,
    RequestStatus, SongId, SongRequest, Tenant, TenantId, TipIntent, TipIntentId, TipStatus,
};

const TENANT_COLUMNS: &str = "id, slug, name, max_requests, tip_enabled_default, \
     paypal_client_id, paypal_client_secret, paypal_mode";

const GIG_COLUMNS: &str =
    "id, tenant_id, name, start_time, end_time, is_active, tip_enabled, announcement";

const REQUEST_COLUMNS: &str = "id, song_id, tenant_id, gig_id, requester, session_id, status, \
     tip_amount_minor, request_time, played_at";

const TIP_COLUMNS: &str = "id, musician_id, tenant_id, user_session_id, request_id, amount_minor, \
     currency, provider, provider_payment_id, status, created_at, updated_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the pool settings in `config` and, when
    /// `config.run_migrations` is set, applies the embedded migrations
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached
    /// or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
            tracing::info!("database migrations applied");
        }

        Ok(Self { pool })
    }

    /// Underlying pool, for seeding and maintenance tasks.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("42P01") => Self::NotProvisioned(db_err.message().to_string()),
                Some("23505" | "40001" | "40P01") => Self::Conflict(db_err.message().to_string()),
                _ => Self::Unavailable(err.to_string()),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Corrupt(err.to_string())
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().is_some_and(|code| code == "23505");
    }
    false
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_tenant(&self, tenant_id: TenantId) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
        ))
        .bind(tenant_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Tenant::from))
    }

    async fn get_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE slug = $1 AND active"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Tenant::from))
    }

    async fn set_max_requests(&self, tenant_id: TenantId, max: Option<u32>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE tenants SET max_requests = $2 WHERE id = $1")
            .bind(tenant_id.get())
            .bind(max.map(to_i32))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn start_gig(&self, new: NewGig) -> StoreResult<GigHandover> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("gig:{}", new.tenant_id))
            .execute(&mut *tx)
            .await?;

        let ended = sqlx::query_as::<_, GigRow>(&format!(
            "UPDATE gigs SET is_active = FALSE, end_time = $2 \
             WHERE tenant_id = $1 AND is_active RETURNING {GIG_COLUMNS}"
        ))
        .bind(new.tenant_id.get())
        .bind(new.start_time)
        .fetch_optional(&mut *tx)
        .await?;

        let started = sqlx::query_as::<_, GigRow>(&format!(
            "INSERT INTO gigs (tenant_id, name, start_time, is_active, tip_enabled) \
             VALUES ($1, $2, $3, TRUE, $4) RETURNING {GIG_COLUMNS}"
        ))
        .bind(new.tenant_id.get())
        .bind(&new.name)
        .bind(new.start_time)
        .bind(new.tip_enabled)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::Conflict("another gig became active concurrently".into())
            } else {
                StoreError::from(err)
            }
        })?;

        tx.commit().await?;
        Ok(GigHandover {
            started: started.into(),
            ended: ended.map(Gig::from),
        })
    }

    async fn end_active_gig(
        &self,
        tenant_id: TenantId,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<Option<Gig>> {
        let row = sqlx::query_as::<_, GigRow>(&format!(
            "UPDATE gigs SET is_active = FALSE, end_time = $2 \
             WHERE tenant_id = $1 AND is_active RETURNING {GIG_COLUMNS}"
        ))
        .bind(tenant_id.get())
        .bind(ended_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Gig::from))
    }

    async fn active_gig(&self, tenant_id: TenantId) -> StoreResult<Option<Gig>> {
        let row = sqlx::query_as::<_, GigRow>(&format!(
            "SELECT {GIG_COLUMNS} FROM gigs WHERE tenant_id = $1 AND is_active"
        ))
        .bind(tenant_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Gig::from))
    }

    async fn get_gig(&self, gig_id: GigId) -> StoreResult<Option<Gig>> {
        let row = sqlx::query_as::<_, GigRow>(&format!(
            "SELECT {GIG_COLUMNS} FROM gigs WHERE id = $1"
        ))
        .bind(gig_id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Gig::from))
    }

    async fn list_gigs(&self, tenant_id: TenantId) -> StoreResult<Vec<GigSummary>> {
        let rows = sqlx::query_as::<_, GigSummaryRow>(
            "SELECT g.id, g.tenant_id, g.name, g.start_time, g.end_time, g.is_active, \
                    g.tip_enabled, g.announcement, \
                    COUNT(r.id) AS request_count, \
                    COUNT(r.id) FILTER (WHERE r.status = 'fulfilled') AS fulfilled_count \
             FROM gigs g LEFT JOIN song_requests r ON r.gig_id = g.id \
             WHERE g.tenant_id = $1 \
             GROUP BY g.id \
             ORDER BY g.start_time DESC, g.id DESC",
        )
        .bind(tenant_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GigSummary::from).collect())
    }

    async fn has_gig_history(&self, tenant_id: TenantId) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM gigs WHERE tenant_id = $1)",
        )
        .bind(tenant_id.get())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn set_announcement(
        &self,
        gig_id: GigId,
        announcement: Option<String>,
    ) -> StoreResult<Option<Gig>> {
        let row = sqlx::query_as::<_, GigRow>(&format!(
            "UPDATE gigs SET announcement = $2 WHERE id = $1 AND is_active RETURNING {GIG_COLUMNS}"
        ))
        .bind(gig_id.get())
        .bind(announcement)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Gig::from))
    }

    async fn set_tip_enabled(&self, gig_id: GigId, tip_enabled: bool) -> StoreResult<Option<Gig>> {
        let row = sqlx::query_as::<_, GigRow>(&format!(
            "UPDATE gigs SET tip_enabled = $2 WHERE id = $1 AND is_active RETURNING {GIG_COLUMNS}"
        ))
        .bind(gig_id.get())
        .bind(tip_enabled)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Gig::from))
    }

    async fn admit_request(&self, record: AdmissionRecord) -> StoreResult<AdmitOutcome> {
        let tenant = record.tenant_id.get();
        let gig = record.gig_id.map(GigId::get);
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!(
                "admit:{tenant}:{}:{}",
                gig.unwrap_or(0),
                record.requester
            ))
            .execute(&mut *tx)
            .await?;

        let song_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM songs WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(record.song_id.get())
        .bind(tenant)
        .fetch_one(&mut *tx)
        .await?;
        if !song_exists {
            return Ok(AdmitOutcome::SongNotFound);
        }

        let duplicate = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM song_requests \
             WHERE tenant_id = $1 AND gig_id IS NOT DISTINCT FROM $2 \
               AND requester = $3 AND song_id = $4 AND status = 'pending')",
        )
        .bind(tenant)
        .bind(gig)
        .bind(&record.requester)
        .bind(record.song_id.get())
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Ok(AdmitOutcome::Duplicate);
        }

        let pending_for_requester = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM song_requests \
             WHERE tenant_id = $1 AND gig_id IS NOT DISTINCT FROM $2 \
               AND requester = $3 AND status = 'pending'",
        )
        .bind(tenant)
        .bind(gig)
        .bind(&record.requester)
        .fetch_one(&mut *tx)
        .await?;
        if to_u64(pending_for_requester) >= u64::from(record.max_requests) {
            return Ok(AdmitOutcome::QuotaExceeded {
                limit: record.max_requests,
            });
        }

        let pending_total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM song_requests \
             WHERE tenant_id = $1 AND gig_id IS NOT DISTINCT FROM $2 AND status = 'pending'",
        )
        .bind(tenant)
        .bind(gig)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE songs SET requests = requests + 1 WHERE id = $1")
            .bind(record.song_id.get())
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query_as::<_, RequestRow>(&format!(
            "INSERT INTO song_requests \
                 (song_id, tenant_id, gig_id, requester, session_id, status, \
                  tip_amount_minor, request_time) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7) RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(record.song_id.get())
        .bind(tenant)
        .bind(gig)
        .bind(&record.requester)
        .bind(&record.session_id)
        .bind(record.tip_amount.get())
        .bind(record.request_time)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Ok(AdmitOutcome::Duplicate),
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;
        Ok(AdmitOutcome::Admitted {
            request: SongRequest::try_from(row)?,
            queue_position: u32::try_from(pending_total.saturating_add(1)).unwrap_or(u32::MAX),
        })
    }

    async fn get_request(&self, request_id: RequestId) -> StoreResult<Option<SongRequest>> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM song_requests WHERE id = $1"
        ))
        .bind(request_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(SongRequest::try_from).transpose()
    }

    async fn finish_request(
        &self,
        request_id: RequestId,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE song_requests \
             SET status = $2, \
                 played_at = CASE WHEN $2 = 'fulfilled' THEN $3 ELSE played_at END \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(request_id.get())
        .bind(status.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fulfill_song(
        &self,
        tenant_id: TenantId,
        gig_id: Option<GigId>,
        song_id: SongId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE song_requests SET status = 'fulfilled', played_at = $4 \
             WHERE tenant_id = $1 AND song_id = $3 AND status = 'pending' \
               AND ($2::BIGINT IS NULL OR gig_id = $2)",
        )
        .bind(tenant_id.get())
        .bind(gig_id.map(GigId::get))
        .bind(song_id.get())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_requests(&self, tenant_id: TenantId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM song_requests WHERE tenant_id = $1")
            .bind(tenant_id.get())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pending_requests(
        &self,
        tenant_id: TenantId,
        filter: PendingFilter,
    ) -> StoreResult<Vec<PendingRequestRow>> {
        let rows = sqlx::query_as::<_, PendingRow>(
            "SELECT r.id AS request_id, r.song_id, s.title, s.author, s.image, \
                    r.requester, r.request_time, r.tip_amount_minor \
             FROM song_requests r JOIN songs s ON s.id = r.song_id \
             WHERE r.tenant_id = $1 AND r.status = 'pending' \
               AND ($2::BIGINT IS NULL OR r.gig_id = $2) \
               AND ($3::TEXT IS NULL OR r.requester = $3) \
             ORDER BY r.request_time ASC, r.id ASC",
        )
        .bind(tenant_id.get())
        .bind(filter.gig_id.map(GigId::get))
        .bind(filter.requester)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PendingRequestRow::from).collect())
    }

    async fn insert_tip_intent(&self, new: NewTipIntent) -> StoreResult<TipIntent> {
        let row = sqlx::query_as::<_, TipIntentRow>(&format!(
            "INSERT INTO tip_intents \
                 (musician_id, tenant_id, user_session_id, request_id, amount_minor, \
                  currency, provider, status, created_at, updated_at) \
             VALUES ($1, $1, $2, $3, $4, $5, $6, 'pending', $7, $7) RETURNING {TIP_COLUMNS}"
        ))
        .bind(new.tenant_id.get())
        .bind(&new.user_session_id)
        .bind(new.request_id.map(RequestId::get))
        .bind(new.amount.get())
        .bind(&new.currency)
        .bind(&new.provider)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;
        TipIntent::try_from(row)
    }

    async fn get_tip_intent(&self, intent_id: TipIntentId) -> StoreResult<Option<TipIntent>> {
        let row = sqlx::query_as::<_, TipIntentRow>(&format!(
            "SELECT {TIP_COLUMNS} FROM tip_intents WHERE id = $1"
        ))
        .bind(intent_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TipIntent::try_from).transpose()
    }

    async fn pending_tip_for_request(
        &self,
        request_id: RequestId,
    ) -> StoreResult<Option<TipIntent>> {
        let row = sqlx::query_as::<_, TipIntentRow>(&format!(
            "SELECT {TIP_COLUMNS} FROM tip_intents \
             WHERE request_id = $1 AND status = 'pending' \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(request_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TipIntent::try_from).transpose()
    }

    async fn attach_provider_payment_id(
        &self,
        intent_id: TipIntentId,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<TipIntent> {
        sqlx::query(
            "UPDATE tip_intents SET provider_payment_id = $2, updated_at = $3 \
             WHERE id = $1 AND provider_payment_id IS NULL",
        )
        .bind(intent_id.get())
        .bind(order_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        self.get_tip_intent(intent_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("tip intent {intent_id}")))
    }

    async fn finish_tip_intent(
        &self,
        intent_id: TipIntentId,
        status: TipStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE tip_intents SET status = $2, updated_at = $3 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(intent_id.get())
        .bind(status.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs \
                 (tenant_id, action, entity_type, entity_id, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.tenant_id.get())
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
