//! Profile, assessment and refinement context

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caller-supplied body and background attributes
///
/// Field names match the service's form fields. Height is in centimetres,
/// weight in kilograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,

    #[serde(deserialize_with = "lenient_number")]
    pub age: u32,

    pub gender: String,

    #[serde(deserialize_with = "lenient_number")]
    pub height: f64,

    #[serde(deserialize_with = "lenient_number")]
    pub weight: f64,

    pub occupation: String,

    pub experience_level: String,
}

impl Profile {
    /// Check that every required attribute is present and sane
    pub fn validate(&self) -> Result<(), String> {
        debug!(name = %self.name, "Profile::validate: called");
        let text_fields = [
            ("name", &self.name),
            ("gender", &self.gender),
            ("occupation", &self.occupation),
            ("experience_level", &self.experience_level),
        ];
        for (field, value) in text_fields {
            if value.trim().is_empty() {
                return Err(format!("Profile field '{}' is required", field));
            }
        }
        if self.age == 0 {
            return Err("Profile field 'age' must be positive".to_string());
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err("Profile field 'height' must be a positive number".to_string());
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err("Profile field 'weight' must be a positive number".to_string());
        }
        Ok(())
    }

    /// Body mass index from height (cm) and weight (kg)
    pub fn bmi(&self) -> f64 {
        let metres = self.height / 100.0;
        self.weight / (metres * metres)
    }

    /// Form-encoded representation used by every service call that takes a profile
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("age", self.age.to_string()),
            ("gender", self.gender.clone()),
            ("height", self.height.to_string()),
            ("weight", self.weight.to_string()),
            ("occupation", self.occupation.clone()),
            ("experience_level", self.experience_level.clone()),
        ]
    }
}

/// Accept `30` as well as `"30"`; the browser client stored form values as strings.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString<T> {
        Number(T),
        Text(String),
    }

    match NumberOrString::<T>::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Narrative assessment produced by the service from a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assessment(pub String);

impl Assessment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the user will train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingEnvironment {
    /// Well-equipped gym
    #[default]
    Gym,
    /// Home with dumbbells, bands and similar
    HomeLight,
    /// No equipment
    Bodyweight,
}

impl TrainingEnvironment {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gym => "gym",
            Self::HomeLight => "home_light",
            Self::Bodyweight => "bodyweight",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gym => "Well-Equipped Gym",
            Self::HomeLight => "Home Workout with Light Weights",
            Self::Bodyweight => "Bodyweight Workout",
        }
    }
}

impl fmt::Display for TrainingEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gym" => Ok(Self::Gym),
            "home_light" | "home-light" | "home" => Ok(Self::HomeLight),
            "bodyweight" | "body" => Ok(Self::Bodyweight),
            other => Err(format!(
                "Unknown training environment '{}'. Expected: gym, home_light, bodyweight",
                other
            )),
        }
    }
}

/// Free text plus environment, consumed only at plan-generation time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefinementContext {
    pub additional_info: String,
    pub training_environment: TrainingEnvironment,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            name: "Ada".to_string(),
            age: 30,
            gender: "female".to_string(),
            height: 170.0,
            weight: 65.0,
            occupation: "Engineer".to_string(),
            experience_level: "Beginner".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_profile() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut p = profile();
        p.name = "   ".to_string();
        let err = p.validate().unwrap_err();
        assert!(err.contains("name"));
    }

    #[test]
    fn test_validate_rejects_non_positive_numbers() {
        let mut p = profile();
        p.age = 0;
        assert!(p.validate().is_err());

        let mut p = profile();
        p.height = 0.0;
        assert!(p.validate().is_err());

        let mut p = profile();
        p.weight = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_bmi() {
        let p = profile();
        let bmi = p.bmi();
        assert!((bmi - 22.49).abs() < 0.01, "bmi was {}", bmi);
    }

    #[test]
    fn test_deserialize_numbers_from_strings() {
        let json = r#"{
            "name": "Ada", "age": "30", "gender": "female",
            "height": "170", "weight": 65.5,
            "occupation": "Engineer", "experience_level": "Beginner"
        }"#;
        let p: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(p.age, 30);
        assert_eq!(p.height, 170.0);
        assert_eq!(p.weight, 65.5);
    }

    #[test]
    fn test_deserialize_rejects_garbage_number() {
        let json = r#"{
            "name": "Ada", "age": "thirty", "gender": "female",
            "height": 170, "weight": 65,
            "occupation": "Engineer", "experience_level": "Beginner"
        }"#;
        assert!(serde_json::from_str::<Profile>(json).is_err());
    }

    #[test]
    fn test_training_environment_wire_values() {
        assert_eq!(serde_json::to_string(&TrainingEnvironment::HomeLight).unwrap(), "\"home_light\"");
        assert_eq!("bodyweight".parse::<TrainingEnvironment>().unwrap(), TrainingEnvironment::Bodyweight);
        assert_eq!(TrainingEnvironment::default(), TrainingEnvironment::Gym);
        assert!("pool".parse::<TrainingEnvironment>().is_err());
    }

    #[test]
    fn test_form_fields_cover_profile() {
        let fields = profile().form_fields();
        let names: Vec<_> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            vec!["name", "age", "gender", "height", "weight", "occupation", "experience_level"]
        );
    }
}
