//! Validación de un request antes de crear el job: si falla no se crea estado.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::fields::{is_uuid_shaped, FieldKind};
use crate::job::JobKind;
use crate::request::GenerationRequest;

/// Margen para errores de redondeo al sumar pesos
const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("la probabilidad de repetición {0} está fuera de [0, 1]")]
    RepeatProbability(f64),

    #[error("el custom log {index} tiene un peso inválido ({weight})")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("los pesos de los custom logs suman {0}, más que 1")]
    WeightsExceedOne(f64),

    #[error("el custom log {0} no tiene campos")]
    EmptyOverlay(usize),

    #[error("el custom log {0} no tiene los mismos campos que el primero")]
    InconsistentFields(usize),

    #[error("el valor {value} no es válido para el campo {field}")]
    InvalidPoolValue { field: &'static str, value: String },

    #[error("un job batch necesita batch_settings")]
    MissingBatchSettings,

    #[error("log_rate debe ser mayor que cero")]
    InvalidLogRate,
}

pub fn validate(request: &GenerationRequest, kind: JobKind) -> Result<(), ValidationError> {
    let p = request.repeat_probability;
    if !(0.0..=1.0).contains(&p) {
        return Err(ValidationError::RepeatProbability(p));
    }

    validate_overlays(request)?;
    validate_pools(request)?;

    match kind {
        JobKind::Batch => {
            if request.batch_settings.is_none() {
                return Err(ValidationError::MissingBatchSettings);
            }
        }
        JobKind::Stream => {
            if request.log_rate() == Some(0) {
                return Err(ValidationError::InvalidLogRate);
            }
        }
    }

    Ok(())
}

fn validate_overlays(request: &GenerationRequest) -> Result<(), ValidationError> {
    let overlays = &request.custom_overlays;
    if overlays.is_empty() {
        return Ok(());
    }

    let mut total = 0.0;
    for (index, overlay) in overlays.iter().enumerate() {
        if !overlay.weight.is_finite() || overlay.weight < 0.0 {
            return Err(ValidationError::InvalidWeight {
                index,
                weight: overlay.weight,
            });
        }
        total += overlay.weight;
    }

    if total > 1.0 + WEIGHT_EPSILON {
        return Err(ValidationError::WeightsExceedOne(total));
    }

    let required: BTreeSet<&String> = overlays[0].fields.keys().collect();
    for (index, overlay) in overlays.iter().enumerate() {
        if overlay.fields.is_empty() {
            return Err(ValidationError::EmptyOverlay(index));
        }
        let names: BTreeSet<&String> = overlay.fields.keys().collect();
        if names != required {
            return Err(ValidationError::InconsistentFields(index));
        }
    }

    Ok(())
}

fn validate_pools(request: &GenerationRequest) -> Result<(), ValidationError> {
    for kind in FieldKind::ALL {
        for value in &request.field_settings.get(kind).values {
            if !pool_value_ok(kind, value) {
                return Err(ValidationError::InvalidPoolValue {
                    field: kind.key(),
                    value: value.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn pool_value_ok(kind: FieldKind, value: &Value) -> bool {
    match kind {
        k if k.is_integer() => value.is_i64() || value.is_u64(),
        FieldKind::FileSha256 => value.as_str().map(is_uuid_shaped).unwrap_or(false),
        _ => value.is_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{BatchSettings, CustomOverlay, FieldSetting, StreamSettings};
    use serde_json::json;

    fn overlay(weight: f64, fields: Value) -> CustomOverlay {
        CustomOverlay {
            weight,
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    fn batch_request() -> GenerationRequest {
        GenerationRequest {
            batch_settings: Some(BatchSettings { number_of_logs: 5 }),
            ..Default::default()
        }
    }

    #[test]
    fn request_minimo_es_valido() {
        assert_eq!(validate(&batch_request(), JobKind::Batch), Ok(()));
        assert_eq!(validate(&GenerationRequest::default(), JobKind::Stream), Ok(()));
    }

    #[test]
    fn rechaza_pesos_que_suman_mas_de_uno() {
        let mut req = batch_request();
        req.custom_overlays = vec![overlay(0.7, json!({"a": 1})), overlay(0.4, json!({"a": 2}))];

        assert!(matches!(
            validate(&req, JobKind::Batch),
            Err(ValidationError::WeightsExceedOne(_))
        ));
    }

    #[test]
    fn acepta_pesos_que_suman_uno_con_redondeo() {
        let mut req = batch_request();
        req.custom_overlays = vec![
            overlay(0.1, json!({"a": 1})),
            overlay(0.2, json!({"a": 2})),
            overlay(0.7, json!({"a": 3})),
        ];
        assert_eq!(validate(&req, JobKind::Batch), Ok(()));
    }

    #[test]
    fn rechaza_pesos_negativos() {
        let mut req = batch_request();
        req.custom_overlays = vec![overlay(-0.1, json!({"a": 1}))];
        assert_eq!(
            validate(&req, JobKind::Batch),
            Err(ValidationError::InvalidWeight { index: 0, weight: -0.1 })
        );
    }

    #[test]
    fn rechaza_overlays_con_campos_distintos() {
        let mut req = batch_request();
        req.custom_overlays = vec![overlay(0.3, json!({"a": 1})), overlay(0.3, json!({"b": 1}))];
        assert_eq!(
            validate(&req, JobKind::Batch),
            Err(ValidationError::InconsistentFields(1))
        );
    }

    #[test]
    fn rechaza_probabilidad_fuera_de_rango() {
        let mut req = batch_request();
        req.repeat_probability = 1.5;
        assert_eq!(
            validate(&req, JobKind::Batch),
            Err(ValidationError::RepeatProbability(1.5))
        );
    }

    #[test]
    fn valida_tipos_de_los_pools() {
        let mut req = batch_request();
        req.field_settings.time_stamp = FieldSetting::with_values(vec![json!("ayer")]);
        assert!(matches!(
            validate(&req, JobKind::Batch),
            Err(ValidationError::InvalidPoolValue { field: "timeStamp", .. })
        ));

        let mut req = batch_request();
        req.field_settings.file_sha256 = FieldSetting::with_values(vec![json!("no-es-uuid")]);
        assert!(matches!(
            validate(&req, JobKind::Batch),
            Err(ValidationError::InvalidPoolValue { field: "fileSHA256", .. })
        ));

        let mut req = batch_request();
        req.field_settings.file_sha256 =
            FieldSetting::with_values(vec![json!("1c9e3f7a-1111-2222-3333-444455556666")]);
        req.field_settings.disposition = FieldSetting::with_values(vec![json!(1), json!(4)]);
        assert_eq!(validate(&req, JobKind::Batch), Ok(()));
    }

    #[test]
    fn batch_sin_settings_y_stream_con_rate_cero() {
        assert_eq!(
            validate(&GenerationRequest::default(), JobKind::Batch),
            Err(ValidationError::MissingBatchSettings)
        );

        let req = GenerationRequest {
            stream_settings: Some(StreamSettings {
                log_rate: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(validate(&req, JobKind::Stream), Err(ValidationError::InvalidLogRate));
    }
}
