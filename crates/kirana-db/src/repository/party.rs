//! # Party Repository
//!
//! Customers and suppliers. A party's `state` is compared verbatim with the
//! store's home state to pick the tax jurisdiction of every document issued
//! to it.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use kirana_core::validation::{validate_gstin, validate_item_name, validate_state_name};
use kirana_core::{Party, PartyKind};

use super::new_id;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Validates and inserts a customer or supplier.
    pub async fn create(
        &self,
        name: &str,
        kind: PartyKind,
        state: &str,
        phone: Option<String>,
        gstin: Option<String>,
    ) -> DbResult<Party> {
        let party = Party {
            id: new_id(),
            name: name.trim().to_string(),
            kind,
            phone,
            state: state.to_string(),
            gstin,
            created_at: Utc::now(),
        };
        self.insert(&party).await?;
        Ok(party)
    }

    pub async fn insert(&self, party: &Party) -> DbResult<()> {
        validate_item_name(&party.name)?;
        validate_state_name(&party.state)?;
        if let Some(gstin) = &party.gstin {
            validate_gstin(gstin)?;
        }

        debug!(id = %party.id, kind = ?party.kind, "Inserting party");

        sqlx::query(
            r#"
            INSERT INTO parties (id, name, kind, phone, state, gstin, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&party.id)
        .bind(&party.name)
        .bind(party.kind)
        .bind(&party.phone)
        .bind(&party.state)
        .bind(&party.gstin)
        .bind(party.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Party>> {
        let party = sqlx::query_as::<_, Party>("SELECT * FROM parties WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(party)
    }

    pub async fn list(&self, kind: PartyKind) -> DbResult<Vec<Party>> {
        let parties = sqlx::query_as::<_, Party>("SELECT * FROM parties WHERE kind = ?1 ORDER BY name")
            .bind(kind)
            .fetch_all(&self.pool)
            .await?;
        Ok(parties)
    }
}

/// Loads a party inside a transaction.
pub async fn fetch_party(conn: &mut SqliteConnection, id: &str) -> DbResult<Party> {
    sqlx::query_as::<_, Party>("SELECT * FROM parties WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Party", id))
}
