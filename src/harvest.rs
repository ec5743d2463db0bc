use chrono::Local;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    client::{StatsSource, SEASON1},
    config::{MapDef, RankDef},
    hero::{HeroEntry, HeroStatRow, RowContext, Side},
};

pub const ROW_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Append-only, ordered collection of rows gathered during one run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultTable {
    rows: Vec<HeroStatRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: HeroStatRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[HeroStatRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Queries every map x rank pair, maps outer and ranks inner, and collects
/// the hero rows of both sides. A failed pair adds nothing.
pub fn harvest(source: &impl StatsSource, maps: &[MapDef], ranks: &[RankDef]) -> ResultTable {
    let mut table = ResultTable::new();

    for map in maps {
        for rank in ranks {
            let timestamp = Local::now().format(ROW_TIME_FORMAT).to_string();
            let response = source.fetch(&map.code, &[rank.code.clone()]);

            let Some(data1) = response.as_ref().and_then(|r| r.pointer("/jData/data1")) else {
                warn!(map = %map.name, rank = %rank.name, "no usable data, skipping");
                continue;
            };

            let context = RowContext {
                map_name: &map.name,
                rank_name: &rank.name,
                season: SEASON1,
                timestamp: &timestamp,
            };
            let added = append_sides(&mut table, data1, &context);
            info!(map = %map.name, rank = %rank.name, rows = added, "processed");
        }
    }

    table
}

// Only side1 and side2 are read; any other key in data1 is ignored.
fn append_sides(table: &mut ResultTable, data1: &Value, context: &RowContext<'_>) -> usize {
    let mut added = 0;
    for side in Side::ALL {
        let Some(heroes) = data1.get(side.key()).and_then(Value::as_array) else {
            continue;
        };
        for hero in heroes {
            table.push(HeroStatRow::new(HeroEntry::from_value(hero), side, context));
            added += 1;
        }
    }
    added
}
