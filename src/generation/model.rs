use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::GenerationError;

pub const MAX_EQUIPMENT_ITEMS: usize = 20;
pub const MAX_FOCUS_AREAS: usize = 10;
pub const MAX_NOTES_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// 用户指定的生成约束
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub goal: String,
    pub experience_level: ExperienceLevel,
    pub days_per_week: u8,
    pub duration_minutes: u16,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.goal.trim().is_empty() {
            return Err(GenerationError::Validation("训练目标不能为空".into()));
        }
        if !(1..=7).contains(&self.days_per_week) {
            return Err(GenerationError::Validation(
                "每周训练天数必须在1到7之间".into(),
            ));
        }
        if !(10..=180).contains(&self.duration_minutes) {
            return Err(GenerationError::Validation(
                "单次训练时长必须在10到180分钟之间".into(),
            ));
        }
        if self.equipment.len() > MAX_EQUIPMENT_ITEMS {
            return Err(GenerationError::Validation(format!(
                "器材最多{}项",
                MAX_EQUIPMENT_ITEMS
            )));
        }
        if self.focus_areas.len() > MAX_FOCUS_AREAS {
            return Err(GenerationError::Validation(format!(
                "重点部位最多{}项",
                MAX_FOCUS_AREAS
            )));
        }
        if self
            .notes
            .as_ref()
            .is_some_and(|notes| notes.chars().count() > MAX_NOTES_LEN)
        {
            return Err(GenerationError::Validation(format!(
                "备注最多{}个字符",
                MAX_NOTES_LEN
            )));
        }
        Ok(())
    }

    /// 归一化后的参数：去除首尾空白、统一小写、列表排序去重
    pub fn normalized(&self) -> Self {
        fn normalize_list(items: &[String]) -> Vec<String> {
            let mut items: Vec<String> = items
                .iter()
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect();
            items.sort();
            items.dedup();
            items
        }

        Self {
            goal: self.goal.trim().to_lowercase(),
            experience_level: self.experience_level,
            days_per_week: self.days_per_week,
            duration_minutes: self.duration_minutes,
            equipment: normalize_list(&self.equipment),
            focus_areas: normalize_list(&self.focus_areas),
            notes: self
                .notes
                .as_ref()
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        }
    }

    /// 计划缓存使用的哈希，由用户ID和归一化参数共同决定
    pub fn fingerprint(&self, user_id: &str) -> String {
        let canonical = serde_json::to_string(&self.normalized()).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// AI 生成的训练计划蓝图
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutBlueprint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub days: Vec<BlueprintDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueprintDay {
    pub day: u8,
    pub title: String,
    pub exercises: Vec<BlueprintExercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueprintExercise {
    pub name: String,
    pub sets: u8,
    /// 次数区间，例如 "8-12" 或 "30s"
    pub reps: String,
    pub rest_seconds: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

const KEY_MIN_LEN: usize = 8;
const KEY_MAX_LEN: usize = 128;

/// 校验客户端提供的幂等键
pub fn validate_idempotency_key(key: &str) -> Result<(), GenerationError> {
    if key.len() < KEY_MIN_LEN || key.len() > KEY_MAX_LEN {
        return Err(GenerationError::Validation(format!(
            "幂等键长度必须在{}到{}个字符之间",
            KEY_MIN_LEN, KEY_MAX_LEN
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
    {
        return Err(GenerationError::Validation(
            "幂等键只允许使用字母、数字以及 - _ : .".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams {
            goal: "Build Strength".into(),
            experience_level: ExperienceLevel::Intermediate,
            days_per_week: 3,
            duration_minutes: 45,
            equipment: vec!["Dumbbells".into(), " barbell".into()],
            focus_areas: vec![],
            notes: None,
        }
    }

    #[test]
    fn fingerprint_ignores_case_whitespace_and_order() {
        let mut reordered = params();
        reordered.goal = "  build strength ".into();
        reordered.equipment = vec!["BARBELL".into(), "dumbbells".into(), "barbell".into()];

        assert_eq!(params().fingerprint("u1"), reordered.fingerprint("u1"));
    }

    #[test]
    fn fingerprint_is_scoped_per_user() {
        assert_ne!(params().fingerprint("u1"), params().fingerprint("u2"));
        assert_eq!(params().fingerprint("u1").len(), 64);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut invalid = params();
        invalid.days_per_week = 0;
        assert!(matches!(invalid.validate(), Err(GenerationError::Validation(_))));

        let mut invalid = params();
        invalid.duration_minutes = 500;
        assert!(matches!(invalid.validate(), Err(GenerationError::Validation(_))));

        let mut invalid = params();
        invalid.goal = "   ".into();
        assert!(matches!(invalid.validate(), Err(GenerationError::Validation(_))));

        assert!(params().validate().is_ok());
    }

    #[test]
    fn idempotency_key_format() {
        assert!(validate_idempotency_key("gen-2024-01-01:abc").is_ok());
        assert!(validate_idempotency_key("short").is_err());
        assert!(validate_idempotency_key("has spaces in it").is_err());
        assert!(validate_idempotency_key(&"x".repeat(129)).is_err());
    }
}
