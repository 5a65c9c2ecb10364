//! Process configuration from the environment and per-workspace settings
//! stored as JSON sections in the `settings` table.

use crate::db;
use crate::grading::PASS_THRESHOLD;
use crate::model::{AssessmentType, DEFAULT_MAX_MARKS};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::warn;

pub const ENV_WORKSPACE: &str = "GRADEBOOKD_WORKSPACE";
pub const ENV_LOG: &str = "GRADEBOOKD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl DaemonConfig {
    /// Reads the process environment after loading a `.env` file if one is
    /// present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Self {
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
            log_filter: non_empty(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Marks,
    Analytics,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Marks, SetupSection::Analytics];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "marks" => Some(Self::Marks),
            "analytics" => Some(Self::Analytics),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Marks => "marks",
            Self::Analytics => "analytics",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Marks => "setup.marks",
            Self::Analytics => "setup.analytics",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Marks => json!({
            "defaultMaxMarks": DEFAULT_MAX_MARKS,
            "defaultAssessmentType": AssessmentType::default().as_str()
        }),
        SetupSection::Analytics => json!({
            "topPerformersLimit": 10,
            "failingThreshold": PASS_THRESHOLD
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v
        .as_f64()
        .ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_assessment_type(v: &Value, key: &str) -> Result<AssessmentType, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    AssessmentType::parse(s.trim()).ok_or_else(|| {
        let names: Vec<&str> = AssessmentType::ALL.iter().map(|t| t.as_str()).collect();
        format!("{} must be one of: {}", key, names.join(", "))
    })
}

/// Applies `patch` onto `current` field by field. Unknown fields and
/// out-of-range values reject the whole patch.
pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Marks => match k.as_str() {
                "defaultMaxMarks" => {
                    obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 1.0, 1000.0)?));
                }
                "defaultAssessmentType" => {
                    let t = parse_assessment_type(v, k)?;
                    obj.insert(k.clone(), Value::String(t.as_str().to_string()));
                }
                _ => return Err(format!("unknown marks field: {}", k)),
            },
            SetupSection::Analytics => match k.as_str() {
                "topPerformersLimit" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
                }
                "failingThreshold" => {
                    obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 0.0, 100.0)?));
                }
                _ => return Err(format!("unknown analytics field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // A stale saved section falls back to defaults instead of failing reads.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                warn!(section = section.name(), error = %e, "ignoring saved settings");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn save_section(conn: &Connection, section: SetupSection, value: &Value) -> anyhow::Result<()> {
    db::settings_set_json(conn, section.key(), value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkSettings {
    pub default_max_marks: f64,
    pub default_assessment_type: AssessmentType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsSettings {
    pub top_performers_limit: usize,
    pub failing_threshold: f64,
}

pub fn mark_settings(conn: &Connection) -> anyhow::Result<MarkSettings> {
    let v = load_section(conn, SetupSection::Marks)?;
    Ok(MarkSettings {
        default_max_marks: v
            .get("defaultMaxMarks")
            .and_then(|x| x.as_f64())
            .unwrap_or(DEFAULT_MAX_MARKS),
        default_assessment_type: v
            .get("defaultAssessmentType")
            .and_then(|x| x.as_str())
            .and_then(AssessmentType::parse)
            .unwrap_or_default(),
    })
}

pub fn analytics_settings(conn: &Connection) -> anyhow::Result<AnalyticsSettings> {
    let v = load_section(conn, SetupSection::Analytics)?;
    Ok(AnalyticsSettings {
        top_performers_limit: v
            .get("topPerformersLimit")
            .and_then(|x| x.as_u64())
            .map(|n| n as usize)
            .unwrap_or(10),
        failing_threshold: v
            .get("failingThreshold")
            .and_then(|x| x.as_f64())
            .unwrap_or(PASS_THRESHOLD),
    })
}
