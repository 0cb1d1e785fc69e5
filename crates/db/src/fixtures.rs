use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Table row counts the demo catalog guarantees once loaded.
const SEED_COUNTS: &[(&str, &str, i64)] = &[
    ("members", "SELECT COUNT(1) FROM member WHERE id IN (1, 2, 3)", 3),
    ("member-concerns", "SELECT COUNT(1) FROM member_concern WHERE member_id IN (1, 2, 3)", 5),
    ("products", "SELECT COUNT(1) FROM product WHERE id BETWEEN 101 AND 118", 18),
    ("effect-tags", "SELECT COUNT(1) FROM product_effect WHERE product_id BETWEEN 101 AND 118", 34),
    (
        "skin-compatibility",
        "SELECT COUNT(1) FROM product_skin_compat WHERE product_id BETWEEN 101 AND 118",
        11,
    ),
    (
        "neighbor-edges",
        "SELECT COUNT(1) FROM product_neighbor WHERE base_product_id IN (103, 105, 111)",
        15,
    ),
    ("anchors", "SELECT COUNT(1) FROM member_item WHERE id BETWEEN 1001 AND 1006", 6),
];

/// One anchor of the demo catalog and the path it exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemoAnchor {
    pub anchor_id: i64,
    pub member_id: i64,
    pub description: &'static str,
}

pub const DEMO_ANCHORS: &[DemoAnchor] = &[
    DemoAnchor { anchor_id: 1001, member_id: 1, description: "linked serum, oily skin, neighbor pool" },
    DemoAnchor { anchor_id: 1002, member_id: 1, description: "free-text toner, skin concern pool" },
    DemoAnchor { anchor_id: 1003, member_id: 2, description: "linked cream, dry skin, neighbor pool" },
    DemoAnchor { anchor_id: 1004, member_id: 2, description: "free-text item without category" },
    DemoAnchor { anchor_id: 1005, member_id: 3, description: "linked shampoo, no skin type" },
    DemoAnchor { anchor_id: 1006, member_id: 3, description: "linked product with unknown category" },
];

/// Demo catalog for local runs and end-to-end tests.
pub struct DemoCatalogSeed;

impl DemoCatalogSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    /// Loads the fixture in one transaction. Reloading is a no-op.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { anchors_seeded: DEMO_ANCHORS.to_vec() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_COUNTS.len() + DEMO_ANCHORS.len());

        for (name, sql, expected) in SEED_COUNTS {
            let count: i64 = sqlx::query_scalar(*sql).fetch_one(pool).await?;
            checks.push((*name, count == *expected));
        }

        for anchor in DEMO_ANCHORS {
            let owned: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM member_item WHERE id = ?1 AND member_id = ?2)",
            )
            .bind(anchor.anchor_id)
            .bind(anchor.member_id)
            .fetch_one(pool)
            .await?;
            checks.push((anchor.description, owned == 1));
        }

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes every demo row. Cascades take the dependent tables.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM member_item WHERE id BETWEEN 1001 AND 1006").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM member WHERE id IN (1, 2, 3)").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM product WHERE id BETWEEN 101 AND 118").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM recommendation_cache").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub anchors_seeded: Vec<DemoAnchor>,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.iter().filter(|(_, passed)| !passed).map(|(name, _)| *name)
    }
}
