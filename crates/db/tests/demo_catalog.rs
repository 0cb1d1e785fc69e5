use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;

use carely_core::config::RecommendationConfig;
use carely_core::domain::anchor::AnchorId;
use carely_core::domain::member::{MemberId, SkinType};
use carely_core::domain::product::{ProductId, SkinCompatibility};
use carely_core::errors::{ApplicationError, DomainError};
use carely_core::recommend::{
    PoolMode, RecommendationEngine, RecommendationRequest, RecommendationSource, UNRANKED,
};
use carely_core::taxonomy::{Category, EffectId};
use carely_db::{connect_with_settings, migrations, DbPool, DemoCatalogSeed, SqlRecommendationSource};

type DemoTestResult = Result<(), String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn seeded_pool() -> Result<DbPool, String> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    DemoCatalogSeed::load(&pool).await.map_err(|e| e.to_string())?;
    Ok(pool)
}

async fn engine() -> Result<RecommendationEngine, String> {
    let source = SqlRecommendationSource::new(seeded_pool().await?);
    Ok(RecommendationEngine::new(Arc::new(source), RecommendationConfig::default()))
}

#[tokio::test]
async fn source_reads_anchor_owner_and_category() -> DemoTestResult {
    let source = SqlRecommendationSource::new(seeded_pool().await?);

    let owner = source.find_anchor_owner(AnchorId(1001)).await.map_err(|e| e.to_string())?;
    require_eq!(owner, Some(MemberId(1)));
    require_eq!(source.find_anchor_owner(AnchorId(9999)).await.map_err(|e| e.to_string())?, None::<MemberId>);

    let linked = source
        .get_anchor(AnchorId(1001))
        .await
        .map_err(|e| e.to_string())?
        .ok_or("linked anchor should exist")?;
    require_eq!(linked.product_id, Some(ProductId(103)));
    require_eq!(linked.category, Some(Category::Serum));

    let free_text = source
        .get_anchor(AnchorId(1002))
        .await
        .map_err(|e| e.to_string())?
        .ok_or("free-text anchor should exist")?;
    require_eq!(free_text.product_id, None::<ProductId>);
    require_eq!(free_text.category, Some(Category::Toner));

    let unknown_category = source
        .get_anchor(AnchorId(1006))
        .await
        .map_err(|e| e.to_string())?
        .ok_or("legacy anchor should exist")?;
    require_eq!(unknown_category.category, None::<Category>);
    Ok(())
}

#[tokio::test]
async fn source_reads_member_profile() -> DemoTestResult {
    let source = SqlRecommendationSource::new(seeded_pool().await?);

    require_eq!(
        source.get_member_skin_type(MemberId(1)).await.map_err(|e| e.to_string())?,
        Some(SkinType::Oily)
    );
    require_eq!(source.get_member_skin_type(MemberId(3)).await.map_err(|e| e.to_string())?, None::<SkinType>);

    let flags = source.get_concern_flags(MemberId(2)).await.map_err(|e| e.to_string())?;
    require_eq!(flags.skin.len(), 1);
    require_eq!(flags.hair.len(), 1);
    require!(flags.health.is_empty());

    let nobody = source.get_concern_flags(MemberId(42)).await.map_err(|e| e.to_string())?;
    require!(nobody.is_empty());
    Ok(())
}

#[tokio::test]
async fn source_reads_catalog_tables() -> DemoTestResult {
    let source = SqlRecommendationSource::new(seeded_pool().await?);

    let edges = source.get_neighbor_edges(ProductId(103), 3).await.map_err(|e| e.to_string())?;
    let ranks: Vec<u32> = edges.iter().map(|edge| edge.rank_order).collect();
    require_eq!(ranks, vec![1, 2, 3]);
    require_eq!(edges[0].neighbor_product_id, ProductId(117));

    let products = source
        .get_products_by_ids(&[ProductId(101), ProductId(118), ProductId(7777)])
        .await
        .map_err(|e| e.to_string())?;
    // 118 carries an unknown category code and is skipped.
    require_eq!(products.len(), 1);
    require_eq!(products[0].discount_price(), Decimal::new(16_200, 0));

    let active = source.get_all_active_products().await.map_err(|e| e.to_string())?;
    require_eq!(active.len(), 16);
    require!(active.iter().all(|product| product.active));

    let tags = source
        .get_effect_tags(&[ProductId(101), ProductId(113)])
        .await
        .map_err(|e| e.to_string())?;
    require_eq!(tags.get(&ProductId(101)).map(|set| set.len()), Some(3));
    require!(tags[&ProductId(113)].contains(&EffectId(14)));

    let compatibility = source
        .get_skin_compatibility(&[ProductId(101), ProductId(109), ProductId(117)], SkinType::Oily)
        .await
        .map_err(|e| e.to_string())?;
    require_eq!(compatibility.get(&ProductId(101)), Some(&SkinCompatibility::Good));
    require_eq!(compatibility.get(&ProductId(109)), Some(&SkinCompatibility::Incompatible));
    require_eq!(compatibility.get(&ProductId(117)), None::<&SkinCompatibility>);
    Ok(())
}

#[tokio::test]
async fn linked_anchor_recommends_from_neighbors() -> DemoTestResult {
    let engine = engine().await?;
    let request = RecommendationRequest::new(AnchorId(1001), MemberId(1));

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let response =
            engine.recommend_with_rng(&request, &mut rng).await.map_err(|e| e.to_string())?;
        let ids: Vec<i64> = response.items.iter().map(|item| item.product_id.0).collect();

        require_eq!(response.mode, PoolMode::Internal);
        require_eq!(ids.len(), 6);
        require_eq!(ids[0], 101);
        for excluded in [103, 106, 109, 110] {
            require!(!ids.contains(&excluded), "seed {seed} returned excluded product {excluded}");
        }
        let unique: HashSet<i64> = ids.iter().copied().collect();
        require_eq!(unique.len(), ids.len());
        let aurelle = response.items.iter().filter(|item| item.brand == "Aurelle").count();
        require!(aurelle <= 2, "seed {seed} returned {aurelle} Aurelle products");
    }

    require!(engine.counters().snapshot().excluded_incompatible >= 20);
    Ok(())
}

#[tokio::test]
async fn free_text_anchor_recommends_by_concern_overlap() -> DemoTestResult {
    let engine = engine().await?;
    let request = RecommendationRequest::new(AnchorId(1002), MemberId(1));
    let mut rng = StdRng::seed_from_u64(7);

    let response = engine.recommend_with_rng(&request, &mut rng).await.map_err(|e| e.to_string())?;
    let ids: Vec<i64> = response.items.iter().map(|item| item.product_id.0).collect();

    // 101 and 102 share the Aurelle brand with 103 and 117 and are capped out.
    require_eq!(response.mode, PoolMode::External);
    require_eq!(ids.first().copied(), Some(103));
    require_eq!(ids.iter().copied().collect::<HashSet<_>>(), HashSet::from([103, 108, 117]));
    require!(response.items.iter().all(|item| item.rank_order == UNRANKED));
    Ok(())
}

#[tokio::test]
async fn unresolved_category_returns_empty_and_counts() -> DemoTestResult {
    let engine = engine().await?;
    let request = RecommendationRequest::new(AnchorId(1006), MemberId(3));

    let response = engine.recommend(&request).await.map_err(|e| e.to_string())?;
    require!(response.items.is_empty());
    require_eq!(engine.counters().snapshot().unresolved_category, 1);
    Ok(())
}

#[tokio::test]
async fn foreign_anchor_is_rejected() -> DemoTestResult {
    let engine = engine().await?;
    let request = RecommendationRequest::new(AnchorId(1001), MemberId(2));

    match engine.recommend(&request).await {
        Err(ApplicationError::Domain(DomainError::AnchorNotOwned { anchor_id, member_id })) => {
            require_eq!(anchor_id, AnchorId(1001));
            require_eq!(member_id, MemberId(2));
            Ok(())
        }
        other => Err(format!("expected AnchorNotOwned, got {other:?}")),
    }
}

#[tokio::test]
async fn source_reads_catalogs_larger_than_one_bind_list() -> DemoTestResult {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    // Above SQLite's host parameter ceiling of 32766.
    let count: i64 = 33_000;
    sqlx::query(
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
         INSERT INTO product (id, category_code, brand, name, price, stock, active)
         SELECT 200000 + n, 1, 'Bulk', 'Bulk ' || n, '1000', 5, 1 FROM seq",
    )
    .bind(count)
    .execute(&pool)
    .await
    .map_err(|e| e.to_string())?;
    sqlx::query("INSERT INTO product_effect (product_id, effect_id) SELECT id, 1 FROM product")
        .execute(&pool)
        .await
        .map_err(|e| e.to_string())?;
    sqlx::query(
        "INSERT INTO product_skin_compat (product_id, skin_type, flag) SELECT id, 'oily', 1 FROM product",
    )
    .execute(&pool)
    .await
    .map_err(|e| e.to_string())?;

    let source = SqlRecommendationSource::new(pool);
    let active = source.get_all_active_products().await.map_err(|e| e.to_string())?;
    require_eq!(active.len() as i64, count);
    let ids: Vec<ProductId> = active.iter().map(|product| product.id).collect();

    let tags = source.get_effect_tags(&ids).await.map_err(|e| e.to_string())?;
    require_eq!(tags.len() as i64, count);
    require!(tags.values().all(|set| set.contains(&EffectId(1))));

    let products = source.get_products_by_ids(&ids).await.map_err(|e| e.to_string())?;
    require_eq!(products.len() as i64, count);
    require!(products.windows(2).all(|pair| pair[0].id < pair[1].id), "products should stay ordered by id");

    let compatibility =
        source.get_skin_compatibility(&ids, SkinType::Oily).await.map_err(|e| e.to_string())?;
    require_eq!(compatibility.len() as i64, count);
    Ok(())
}
