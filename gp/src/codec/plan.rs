//! Plan export document

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::CodecError;
use crate::domain::{Plan, Profile, RefinementContext, TrainingEnvironment};

/// Everything needed to resume a finished plan without calling the service
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDocument {
    pub plan: Plan,
    pub profile: Profile,
    pub refinement: RefinementContext,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wire {
    workout_plan: Plan,
    user_data: Profile,
    #[serde(default)]
    additional_info: String,
    #[serde(default)]
    training_environment: TrainingEnvironment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl PlanDocument {
    /// Pretty JSON, as written to export files
    pub fn to_json(&self) -> Result<String, CodecError> {
        let wire = Wire {
            workout_plan: self.plan.clone(),
            user_data: self.profile.clone(),
            additional_info: self.refinement.additional_info.clone(),
            training_environment: self.refinement.training_environment,
            session_id: self.session_id.clone(),
        };
        Ok(serde_json::to_string_pretty(&wire)?)
    }
}

fn require_object(object: &serde_json::Map<String, Value>, key: &str) -> Result<(), CodecError> {
    match object.get(key) {
        Some(Value::Object(_)) => Ok(()),
        Some(Value::Null) | None => Err(CodecError::Validation(format!("missing required key '{}'", key))),
        Some(_) => Err(CodecError::Validation(format!("'{}' must be an object", key))),
    }
}

/// Parse and validate a plan export
///
/// `workoutPlan` and `userData` are required objects; `additionalInfo`
/// defaults to empty and `trainingEnvironment` to gym.
pub fn decode_plan(raw: &str) -> Result<PlanDocument, CodecError> {
    debug!(len = raw.len(), "decode_plan: called");
    let value: Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| CodecError::Validation("plan export must be a JSON object".to_string()))?;
    require_object(object, "workoutPlan")?;
    require_object(object, "userData")?;

    let wire: Wire = serde_json::from_value(value).map_err(|e| CodecError::Validation(e.to_string()))?;
    Ok(PlanDocument {
        plan: wire.workout_plan,
        profile: wire.user_data,
        refinement: RefinementContext {
            additional_info: wire.additional_info,
            training_environment: wire.training_environment,
        },
        session_id: wire.session_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn profile_json() -> Value {
        json!({
            "name": "Ada", "age": "30", "gender": "female", "height": "170",
            "weight": "65", "occupation": "Engineer", "experience_level": "Beginner"
        })
    }

    fn sample() -> PlanDocument {
        PlanDocument {
            plan: serde_json::from_value(json!({
                "Monday": ["Squat 3x5", {"exercise": "Bench", "sets": 3}],
                "Thursday": ["Row"]
            }))
            .unwrap(),
            profile: serde_json::from_value(profile_json()).unwrap(),
            refinement: RefinementContext {
                additional_info: "bad knee".to_string(),
                training_environment: TrainingEnvironment::HomeLight,
            },
            session_id: Some("s-3".to_string()),
        }
    }

    #[test]
    fn test_roundtrip() {
        let doc = sample();
        assert_eq!(decode_plan(&doc.to_json().unwrap()).unwrap(), doc);
    }

    #[test]
    fn test_wire_keys() {
        let json: Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert!(json["workoutPlan"].is_object());
        assert_eq!(json["userData"]["age"], 30);
        assert_eq!(json["additionalInfo"], "bad knee");
        assert_eq!(json["trainingEnvironment"], "home_light");
        assert_eq!(json["sessionId"], "s-3");
    }

    #[test]
    fn test_optional_fields_default() {
        let raw = json!({"workoutPlan": {"Monday": ["Run"]}, "userData": profile_json()}).to_string();
        let doc = decode_plan(&raw).unwrap();
        assert_eq!(doc.refinement, RefinementContext::default());
        assert_eq!(doc.session_id, None);
        assert_eq!(doc.profile.age, 30);
    }

    #[test]
    fn test_missing_workout_plan_is_validation_error() {
        let raw = json!({"userData": profile_json()}).to_string();
        match decode_plan(&raw) {
            Err(CodecError::Validation(msg)) => assert!(msg.contains("workoutPlan")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_shape_errors() {
        let plan_as_list = json!({"workoutPlan": ["Monday"], "userData": profile_json()}).to_string();
        assert!(matches!(decode_plan(&plan_as_list), Err(CodecError::Validation(_))));

        let no_profile = json!({"workoutPlan": {"Monday": []}, "userData": null}).to_string();
        assert!(matches!(decode_plan(&no_profile), Err(CodecError::Validation(_))));

        let bad_env = json!({
            "workoutPlan": {"Monday": []},
            "userData": profile_json(),
            "trainingEnvironment": "moon"
        })
        .to_string();
        assert!(matches!(decode_plan(&bad_env), Err(CodecError::Validation(_))));
    }

    fn exercise() -> impl Strategy<Value = Value> {
        let attribute = prop_oneof![".{0,8}".prop_map(Value::from), any::<i64>().prop_map(Value::from)];
        prop_oneof![
            ".{0,16}".prop_map(Value::from),
            proptest::collection::vec(("[a-z_]{1,8}", attribute), 0..4)
                .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
        ]
    }

    fn plan() -> impl Strategy<Value = Plan> {
        proptest::collection::vec((".{0,12}", proptest::collection::vec(exercise(), 0..5)), 0..6).prop_map(|days| {
            let days: serde_json::Map<String, Value> = days
                .into_iter()
                .map(|(day, exercises)| (day, Value::Array(exercises)))
                .collect();
            serde_json::from_value(Value::Object(days)).unwrap()
        })
    }

    fn profile() -> impl Strategy<Value = Profile> {
        (".{0,12}", 1u32..120, "[a-z]{0,8}", 200u32..500, 60u32..400, ".{0,12}", ".{0,12}").prop_map(
            |(name, age, gender, height, weight, occupation, experience_level)| Profile {
                name,
                age,
                gender,
                height: f64::from(height) / 2.0,
                weight: f64::from(weight) / 2.0,
                occupation,
                experience_level,
            },
        )
    }

    fn environment() -> impl Strategy<Value = TrainingEnvironment> {
        prop_oneof![
            Just(TrainingEnvironment::Gym),
            Just(TrainingEnvironment::HomeLight),
            Just(TrainingEnvironment::Bodyweight),
        ]
    }

    proptest! {
        #[test]
        fn prop_plan_roundtrip_keeps_order(
            plan in plan(),
            profile in profile(),
            additional_info in ".{0,40}",
            training_environment in environment(),
            session_id in proptest::option::of("[a-z0-9-]{1,16}"),
        ) {
            let doc = PlanDocument {
                plan,
                profile,
                refinement: RefinementContext { additional_info, training_environment },
                session_id,
            };
            let decoded = decode_plan(&doc.to_json().unwrap()).unwrap();
            prop_assert_eq!(
                serde_json::to_string(&decoded.plan).unwrap(),
                serde_json::to_string(&doc.plan).unwrap()
            );
            prop_assert_eq!(decoded, doc);
        }
    }
}
