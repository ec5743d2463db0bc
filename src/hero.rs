use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

pub const UNKNOWN_HERO: &str = "未知";

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct HeroEntry {
    #[serde(default, deserialize_with = "lenient_name")]
    pub heroName: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub winRate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub selectRate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub kd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub damageAve: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: Option<f64>,
}

impl HeroEntry {
    /// Decodes one entry of a side list. Anything that is not a usable
    /// object still counts as a hero, with every field defaulted.
    pub fn from_value(value: &Value) -> Self {
        match HeroEntry::deserialize(value) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("unreadable hero entry, using defaults: {e}");
                HeroEntry::default()
            }
        }
    }
}

// Per-field extraction: a value of the wrong type only defaults its own field.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Attack,
    Defense,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Attack, Side::Defense];

    /// Key of this side inside `jData.data1`.
    pub fn key(self) -> &'static str {
        match self {
            Side::Attack => "side1",
            Side::Defense => "side2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Attack => "进攻方",
            Side::Defense => "防守方",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeroStatRow {
    pub hero_name: String,
    pub side: Side,
    pub win_rate: f64,
    pub select_rate: f64,
    pub kd: f64,
    pub avg_damage: f64,
    pub score: f64,
    pub map_name: String,
    pub rank_name: String,
    pub season: String,
    pub timestamp: String,
}

impl HeroStatRow {
    pub fn new(entry: HeroEntry, side: Side, context: &RowContext<'_>) -> Self {
        Self {
            hero_name: entry.heroName.unwrap_or_else(|| UNKNOWN_HERO.to_string()),
            side,
            win_rate: entry.winRate.unwrap_or(0.0),
            select_rate: entry.selectRate.unwrap_or(0.0),
            kd: entry.kd.unwrap_or(0.0),
            avg_damage: entry.damageAve.unwrap_or(0.0),
            score: entry.score.unwrap_or(0.0),
            map_name: context.map_name.to_string(),
            rank_name: context.rank_name.to_string(),
            season: context.season.to_string(),
            timestamp: context.timestamp.to_string(),
        }
    }
}

/// Values shared by every row produced from one API call.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub map_name: &'a str,
    pub rank_name: &'a str,
    pub season: &'a str,
    pub timestamp: &'a str,
}
