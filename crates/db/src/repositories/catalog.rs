use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;

use carely_core::domain::anchor::{AnchorId, AnchorItem};
use carely_core::domain::member::{ConcernFlags, MemberId, SkinType};
use carely_core::domain::product::{CatalogProduct, NeighborEdge, ProductId, SkinCompatibility};
use carely_core::errors::ApplicationError;
use carely_core::recommend::RecommendationSource;
use carely_core::taxonomy::{Category, EffectId};

use super::{placeholders, RepositoryError, IDS_PER_QUERY};
use crate::DbPool;

const PRODUCT_COLUMNS: &str =
    "id, category_code, brand, name, price, discount_rate, stock, active, thumbnail_url";

/// Reads the catalog, member profile and neighbor tables.
pub struct SqlRecommendationSource {
    pool: DbPool,
}

impl SqlRecommendationSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_anchor_owner(&self, anchor_id: AnchorId) -> Result<Option<MemberId>, RepositoryError> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT member_id FROM member_item WHERE id = ?1")
            .bind(anchor_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner.map(MemberId))
    }

    async fn load_anchor(&self, anchor_id: AnchorId) -> Result<Option<AnchorItem>, RepositoryError> {
        // Linked anchors take the category of their catalog product.
        let row = sqlx::query(
            "SELECT mi.id, mi.member_id, mi.product_id, mi.name,
                    CASE WHEN mi.product_id IS NOT NULL THEN p.category_code
                         ELSE mi.category_code END AS category_code
             FROM member_item mi
             LEFT JOIN product p ON p.id = mi.product_id
             WHERE mi.id = ?1",
        )
        .bind(anchor_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_anchor).transpose()
    }

    async fn load_skin_type(&self, member_id: MemberId) -> Result<Option<SkinType>, RepositoryError> {
        let stored: Option<Option<String>> =
            sqlx::query_scalar("SELECT skin_type FROM member WHERE id = ?1")
                .bind(member_id.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(stored.flatten().as_deref().and_then(SkinType::parse))
    }

    async fn load_concerns(&self, member_id: MemberId) -> Result<ConcernFlags, RepositoryError> {
        let rows = sqlx::query(
            "SELECT domain, concern_code FROM member_concern WHERE member_id = ?1
             ORDER BY domain, concern_code",
        )
        .bind(member_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut flags = ConcernFlags::default();
        for row in &rows {
            let domain: String = decode(row, "domain")?;
            let code: String = decode(row, "concern_code")?;
            if !flags.insert_code(&domain, &code) {
                warn!(
                    event_name = "catalog.concern.unknown",
                    member_id = member_id.0,
                    domain = %domain,
                    code = %code,
                    "ignoring unknown concern code"
                );
            }
        }
        Ok(flags)
    }

    async fn load_edges(&self, product_id: ProductId, top_k: u32) -> Result<Vec<NeighborEdge>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT base_product_id, neighbor_product_id, sim_overall, rank_order
             FROM product_neighbor
             WHERE base_product_id = ?1
             ORDER BY rank_order ASC, neighbor_product_id ASC
             LIMIT ?2",
        )
        .bind(product_id.0)
        .bind(i64::from(top_k))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_edge).collect()
    }

    async fn load_products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, RepositoryError> {
        let mut products = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IDS_PER_QUERY) {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM product WHERE id IN ({})",
                placeholders(1, chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.0);
            }
            products.extend(decode_products(&query.fetch_all(&self.pool).await?));
        }
        products.sort_by_key(|product| product.id);
        Ok(products)
    }

    async fn load_active_products(&self) -> Result<Vec<CatalogProduct>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_products(&rows))
    }

    async fn load_effect_tags(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, BTreeSet<EffectId>>, RepositoryError> {
        let mut tags: HashMap<ProductId, BTreeSet<EffectId>> = HashMap::new();
        for chunk in ids.chunks(IDS_PER_QUERY) {
            let sql = format!(
                "SELECT product_id, effect_id FROM product_effect WHERE product_id IN ({})",
                placeholders(1, chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id.0);
            }
            for row in query.fetch_all(&self.pool).await? {
                let product_id = ProductId(decode(&row, "product_id")?);
                let raw: i64 = decode(&row, "effect_id")?;
                match u16::try_from(raw) {
                    Ok(effect) => {
                        tags.entry(product_id).or_default().insert(EffectId(effect));
                    }
                    Err(_) => warn!(
                        event_name = "catalog.effect.out_of_range",
                        product_id = product_id.0,
                        effect_id = raw,
                        "skipping effect tag"
                    ),
                }
            }
        }
        Ok(tags)
    }

    async fn load_compatibility(
        &self,
        ids: &[ProductId],
        skin_type: SkinType,
    ) -> Result<HashMap<ProductId, SkinCompatibility>, RepositoryError> {
        let mut flags = HashMap::new();
        for chunk in ids.chunks(IDS_PER_QUERY) {
            // ?1 is the skin type; ids start at ?2.
            let sql = format!(
                "SELECT product_id, flag FROM product_skin_compat
                 WHERE skin_type = ?1 AND product_id IN ({})",
                placeholders(2, chunk.len())
            );
            let mut query = sqlx::query(&sql).bind(skin_type.as_str());
            for id in chunk {
                query = query.bind(id.0);
            }
            for row in query.fetch_all(&self.pool).await? {
                let product_id = ProductId(decode(&row, "product_id")?);
                let flag: i64 = decode(&row, "flag")?;
                flags.insert(product_id, SkinCompatibility::from_flag(flag));
            }
        }
        Ok(flags)
    }
}

#[async_trait]
impl RecommendationSource for SqlRecommendationSource {
    async fn find_anchor_owner(&self, anchor_id: AnchorId) -> Result<Option<MemberId>, ApplicationError> {
        Ok(self.load_anchor_owner(anchor_id).await?)
    }

    async fn get_anchor(&self, anchor_id: AnchorId) -> Result<Option<AnchorItem>, ApplicationError> {
        Ok(self.load_anchor(anchor_id).await?)
    }

    async fn get_member_skin_type(&self, member_id: MemberId) -> Result<Option<SkinType>, ApplicationError> {
        Ok(self.load_skin_type(member_id).await?)
    }

    async fn get_concern_flags(&self, member_id: MemberId) -> Result<ConcernFlags, ApplicationError> {
        Ok(self.load_concerns(member_id).await?)
    }

    async fn get_neighbor_edges(
        &self,
        product_id: ProductId,
        top_k: u32,
    ) -> Result<Vec<NeighborEdge>, ApplicationError> {
        Ok(self.load_edges(product_id, top_k).await?)
    }

    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, ApplicationError> {
        Ok(self.load_products(ids).await?)
    }

    async fn get_all_active_products(&self) -> Result<Vec<CatalogProduct>, ApplicationError> {
        Ok(self.load_active_products().await?)
    }

    async fn get_effect_tags(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, BTreeSet<EffectId>>, ApplicationError> {
        Ok(self.load_effect_tags(ids).await?)
    }

    async fn get_skin_compatibility(
        &self,
        ids: &[ProductId],
        skin_type: SkinType,
    ) -> Result<HashMap<ProductId, SkinCompatibility>, ApplicationError> {
        Ok(self.load_compatibility(ids, skin_type).await?)
    }
}

fn decode<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_anchor(row: &SqliteRow) -> Result<AnchorItem, RepositoryError> {
    let category_code: Option<i64> = decode(row, "category_code")?;
    let product_id: Option<i64> = decode(row, "product_id")?;

    Ok(AnchorItem {
        id: AnchorId(decode(row, "id")?),
        member_id: MemberId(decode(row, "member_id")?),
        product_id: product_id.map(ProductId),
        category: category_code.and_then(Category::from_code),
        name: decode(row, "name")?,
    })
}

fn row_to_edge(row: &SqliteRow) -> Result<NeighborEdge, RepositoryError> {
    let rank: i64 = decode(row, "rank_order")?;
    let rank_order = u32::try_from(rank)
        .map_err(|_| RepositoryError::Decode(format!("rank_order {rank} out of range")))?;

    Ok(NeighborEdge {
        base_product_id: ProductId(decode(row, "base_product_id")?),
        neighbor_product_id: ProductId(decode(row, "neighbor_product_id")?),
        sim_overall: decode(row, "sim_overall")?,
        rank_order,
    })
}

fn row_to_product(row: &SqliteRow) -> Result<CatalogProduct, RepositoryError> {
    let id: i64 = decode(row, "id")?;
    let category_code: i64 = decode(row, "category_code")?;
    let category = Category::from_code(category_code).ok_or_else(|| {
        RepositoryError::Decode(format!("product {id} has unknown category code {category_code}"))
    })?;
    let price: String = decode(row, "price")?;
    let discount_rate: String = decode(row, "discount_rate")?;
    let active: i64 = decode(row, "active")?;

    Ok(CatalogProduct {
        id: ProductId(id),
        category,
        brand: decode(row, "brand")?,
        name: decode(row, "name")?,
        price: parse_decimal(&price, "price")?,
        discount_rate: parse_decimal(&discount_rate, "discount_rate")?,
        stock: decode(row, "stock")?,
        active: active != 0,
        thumbnail: decode(row, "thumbnail_url")?,
    })
}

/// Rows that fail to decode are logged and left out of the pool.
fn decode_products(rows: &[SqliteRow]) -> Vec<CatalogProduct> {
    rows.iter()
        .filter_map(|row| match row_to_product(row) {
            Ok(product) => Some(product),
            Err(error) => {
                warn!(event_name = "catalog.product.skipped", error = %error, "skipping product row");
                None
            }
        })
        .collect()
}

fn parse_decimal(raw: &str, column: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| RepositoryError::Decode(format!("invalid {column} `{raw}`: {e}")))
}
