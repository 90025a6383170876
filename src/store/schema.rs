use anyhow::Result;
use sqlx::PgPool;

/// Advisory lock key serializing concurrent schema initialisation
const SCHEMA_LOCK_KEY: i64 = 0x5EDC_1ED6;

/// Create the ledger tables and indexes if they do not exist yet
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing ledger schema...");

    // IF NOT EXISTS is not safe against concurrent DDL on its own
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    let mut result = Ok(());
    for (name, stmt) in STATEMENTS {
        if let Err(e) = sqlx::query(stmt).execute(&mut *conn).await {
            result = Err(anyhow::anyhow!("Failed to create {}: {}", name, e));
            break;
        }
    }

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    result?;
    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}

// =============================================================================
// Ledger tables
// =============================================================================
//
// entries.account_id and transfers.*_account_id reference accounts without
// ON DELETE CASCADE: an account with ledger history cannot be deleted.

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          BIGSERIAL PRIMARY KEY,
    owner       VARCHAR NOT NULL,
    balance     BIGINT NOT NULL DEFAULT 0,
    currency    VARCHAR(3) NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT accounts_owner_currency_key UNIQUE (owner, currency)
)
"#;

const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id          BIGSERIAL PRIMARY KEY,
    account_id  BIGINT NOT NULL REFERENCES accounts (id),
    amount      BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id               BIGSERIAL PRIMARY KEY,
    from_account_id  BIGINT NOT NULL REFERENCES accounts (id),
    to_account_id    BIGINT NOT NULL REFERENCES accounts (id),
    amount           BIGINT NOT NULL CHECK (amount > 0),
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS accounts_owner_idx ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS entries_account_id_idx ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_account_id_idx ON transfers (from_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_to_account_id_idx ON transfers (to_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_pair_idx ON transfers (from_account_id, to_account_id)",
];

const STATEMENTS: [(&str, &str); 8] = [
    ("accounts table", CREATE_ACCOUNTS_TABLE),
    ("entries table", CREATE_ENTRIES_TABLE),
    ("transfers table", CREATE_TRANSFERS_TABLE),
    ("accounts_owner_idx", CREATE_INDEXES[0]),
    ("entries_account_id_idx", CREATE_INDEXES[1]),
    ("transfers_from_account_id_idx", CREATE_INDEXES[2]),
    ("transfers_to_account_id_idx", CREATE_INDEXES[3]),
    ("transfers_pair_idx", CREATE_INDEXES[4]),
];
