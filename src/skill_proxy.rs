use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::tables::{SourceTables, with_int64_keys};

pub const CARRIER_AVG_COLUMN: &str = "carrier_avg_yards";
const PLAY_COUNT_COLUMN: &str = "carrier_play_count";

pub fn resolve_ball_carriers(plays: LazyFrame, player_play: LazyFrame) -> LazyFrame {
    let credited = col("hadRushAttempt")
        .cast(DataType::Int32)
        .eq(lit(1))
        .or(col("hadPassReception").cast(DataType::Int32).eq(lit(1)));

    let carriers = with_int64_keys(player_play, &["gameId", "playId", "nflId"])
        .filter(credited)
        .group_by_stable([col("gameId"), col("playId")])
        .agg([col("nflId").first().alias("ballCarrierId")]);

    with_int64_keys(plays, &["gameId", "playId"])
        .join(
            carriers,
            [col("gameId"), col("playId")],
            [col("gameId"), col("playId")],
            JoinArgs::new(JoinType::Left),
        )
        .filter(col("ballCarrierId").is_not_null())
}

/// Mean yardage per carrier over the whole play population (leakage is intended).
/// Carriers with `min_plays` or fewer recorded gains, and plays whose carrier has no
/// proxy, fall back to the population mean.
pub fn attach_skill_proxy(plays: LazyFrame, min_plays: u32) -> Result<LazyFrame> {
    let yards = col("prePenaltyYardsGained").cast(DataType::Float64);

    let global = plays
        .clone()
        .select([yards.clone().mean().alias("global_mean")])
        .collect()?;
    let global_mean = global
        .column("global_mean")?
        .f64()?
        .get(0)
        .unwrap_or_default();

    let proxy = plays
        .clone()
        .group_by([col("ballCarrierId")])
        .agg([
            yards.clone().mean().alias(CARRIER_AVG_COLUMN),
            yards.count().alias(PLAY_COUNT_COLUMN),
        ])
        .filter(col(PLAY_COUNT_COLUMN).gt(lit(min_plays)))
        .select([col("ballCarrierId"), col(CARRIER_AVG_COLUMN)]);

    Ok(plays
        .join(
            proxy,
            [col("ballCarrierId")],
            [col("ballCarrierId")],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col(CARRIER_AVG_COLUMN).fill_null(lit(global_mean))))
}

pub fn attach_week(plays: LazyFrame, games: LazyFrame) -> LazyFrame {
    let weeks = with_int64_keys(games, &["gameId", "week"]).select([col("gameId"), col("week")]);
    plays.join(
        weeks,
        [col("gameId")],
        [col("gameId")],
        JoinArgs::new(JoinType::Left),
    )
}

pub fn enrich_plays(sources: &SourceTables, min_carrier_plays: u32) -> Result<DataFrame> {
    let raw_plays = sources.plays.height();
    let with_carrier = resolve_ball_carriers(
        sources.plays.clone().lazy(),
        sources.player_play.clone().lazy(),
    );
    let with_proxy = attach_skill_proxy(with_carrier, min_carrier_plays)?;
    let enriched = attach_week(with_proxy, sources.games.clone().lazy()).collect()?;

    info!(
        raw_plays,
        with_carrier = enriched.height(),
        "resolved ball carriers and skill proxy"
    );
    Ok(enriched)
}
