//! Pit-stop prediction tools.
//!
//! No model is loaded. `predict_pit_stops` returns fixed rule-of-thumb
//! estimates with zero confidence so agents can wire the tool into a workflow
//! before a trained model exists.

use crate::error::{GatewayError, GatewayResult};
use crate::tools::args;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MODEL_VERSION: &str = "placeholder-v0.1";

/// Placeholder mean stationary time per stop.
const ESTIMATED_PIT_MS: f64 = 2500.0;
const MAX_RACE_LAPS: u32 = 200;
const MAX_PIT_STOP_NUMBER: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    OptimalPitCount,
    PitStopDuration,
}

impl PredictionType {
    pub const ALL: [PredictionType; 2] = [Self::OptimalPitCount, Self::PitStopDuration];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OptimalPitCount => "optimal_pit_count",
            Self::PitStopDuration => "pit_stop_duration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeatherConditions {
    Dry,
    Wet,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TireCompound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
}

fn default_season() -> i64 {
    2023
}

fn default_race_laps() -> u32 {
    60
}

fn default_pit_stop_number() -> u32 {
    1
}

/// Input for the predict_pit_stops tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictPitStopsInput {
    /// "optimal_pit_count" or "pit_stop_duration"
    pub prediction_type: PredictionType,
    #[serde(default)]
    pub circuit_id: Option<i64>,
    #[serde(default)]
    pub driver_id: Option<i64>,
    /// Constructor/team ID. Required for pit_stop_duration.
    #[serde(default)]
    pub constructor_id: Option<i64>,
    /// Season year for historical context. Default: 2023
    #[serde(default = "default_season")]
    pub season: i64,
    /// Total race laps. Default: 60
    #[serde(default = "default_race_laps")]
    pub race_laps: u32,
    /// Which stop to predict the duration for (1st, 2nd, ...). Default: 1
    #[serde(default = "default_pit_stop_number")]
    pub pit_stop_number: u32,
    #[serde(default)]
    pub weather_conditions: Option<WeatherConditions>,
    /// Starting tire compound
    #[serde(default)]
    pub tire_compound: Option<TireCompound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PitStopPrediction {
    pub prediction_type: PredictionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_pit_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_total_pit_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_avg_pit_ms: Option<f64>,
    pub confidence: f64,
    pub model_version: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PredictPitStopsOutput {
    pub input_parameters: PredictPitStopsInput,
    #[serde(flatten)]
    pub prediction: PitStopPrediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ModelInfoOutput {
    pub model_loaded: bool,
    pub model_version: String,
    pub supported_predictions: Vec<PredictionType>,
    pub status: String,
    pub message: String,
}

/// Handler for the prediction tools.
#[derive(Debug, Default)]
pub struct PredictionToolHandler;

impl PredictionToolHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn predict(&self, input: PredictPitStopsInput) -> GatewayResult<PredictPitStopsOutput> {
        args::required_season(input.season)?;
        args::bounded("race_laps", Some(input.race_laps), 60, MAX_RACE_LAPS)?;
        args::bounded(
            "pit_stop_number",
            Some(input.pit_stop_number),
            1,
            MAX_PIT_STOP_NUMBER,
        )?;

        let prediction = match input.prediction_type {
            PredictionType::OptimalPitCount => PitStopPrediction {
                prediction_type: PredictionType::OptimalPitCount,
                optimal_pit_count: Some(pit_count_for_laps(input.race_laps)),
                predicted_total_pit_ms: None,
                predicted_avg_pit_ms: None,
                confidence: 0.0,
                model_version: MODEL_VERSION.to_string(),
                message: "PLACEHOLDER: estimate from race length only, no model is loaded."
                    .to_string(),
            },
            PredictionType::PitStopDuration => {
                if input.constructor_id.is_none() {
                    return Err(GatewayError::invalid_argument(
                        "constructor_id",
                        "is required for pit_stop_duration predictions",
                    ));
                }
                PitStopPrediction {
                    prediction_type: PredictionType::PitStopDuration,
                    optimal_pit_count: None,
                    predicted_total_pit_ms: Some(ESTIMATED_PIT_MS * input.pit_stop_number as f64),
                    predicted_avg_pit_ms: Some(ESTIMATED_PIT_MS),
                    confidence: 0.0,
                    model_version: MODEL_VERSION.to_string(),
                    message: "PLACEHOLDER: fixed average stop time, no model is loaded."
                        .to_string(),
                }
            }
        };

        Ok(PredictPitStopsOutput {
            input_parameters: input,
            prediction,
        })
    }

    pub fn model_info(&self) -> ModelInfoOutput {
        ModelInfoOutput {
            model_loaded: false,
            model_version: MODEL_VERSION.to_string(),
            supported_predictions: PredictionType::ALL.to_vec(),
            status: "placeholder".to_string(),
            message: "No trained model is loaded. Predictions are fixed estimates with zero \
                      confidence."
                .to_string(),
        }
    }
}

fn pit_count_for_laps(race_laps: u32) -> u32 {
    match race_laps {
        0..40 => 1,
        40..60 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> PredictPitStopsInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let input = input(json!({"prediction_type": "optimal_pit_count"}));
        assert_eq!(input.season, 2023);
        assert_eq!(input.race_laps, 60);
        assert_eq!(input.pit_stop_number, 1);
    }

    #[test]
    fn test_pit_count_thresholds() {
        assert_eq!(pit_count_for_laps(39), 1);
        assert_eq!(pit_count_for_laps(40), 2);
        assert_eq!(pit_count_for_laps(59), 2);
        assert_eq!(pit_count_for_laps(60), 3);
    }

    #[test]
    fn test_optimal_pit_count() {
        let output = PredictionToolHandler::new()
            .predict(input(json!({"prediction_type": "optimal_pit_count", "race_laps": 52})))
            .unwrap();
        assert_eq!(output.prediction.optimal_pit_count, Some(2));
        assert_eq!(output.prediction.confidence, 0.0);
        assert_eq!(output.prediction.model_version, MODEL_VERSION);
    }

    #[test]
    fn test_duration_requires_constructor() {
        let err = PredictionToolHandler::new()
            .predict(input(json!({"prediction_type": "pit_stop_duration"})))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
        assert!(err.to_string().contains("constructor_id"));
    }

    #[test]
    fn test_duration_scales_with_stop_number() {
        let output = PredictionToolHandler::new()
            .predict(input(json!({
                "prediction_type": "pit_stop_duration",
                "constructor_id": 9,
                "pit_stop_number": 2,
                "tire_compound": "medium"
            })))
            .unwrap();
        assert_eq!(output.prediction.predicted_avg_pit_ms, Some(2500.0));
        assert_eq!(output.prediction.predicted_total_pit_ms, Some(5000.0));
        assert_eq!(output.input_parameters.tire_compound, Some(TireCompound::Medium));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(
            serde_json::from_value::<PredictPitStopsInput>(json!({"prediction_type": "lap_time"}))
                .is_err()
        );
        let err = PredictionToolHandler::new()
            .predict(input(json!({"prediction_type": "optimal_pit_count", "race_laps": 0})))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
    }

    #[test]
    fn test_model_info() {
        let info = PredictionToolHandler::new().model_info();
        assert!(!info.model_loaded);
        assert_eq!(info.status, "placeholder");
        assert_eq!(info.supported_predictions.len(), 2);
        assert_eq!(PredictionType::PitStopDuration.as_str(), "pit_stop_duration");
    }
}
