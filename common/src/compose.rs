use std::collections::BTreeSet;

use rand::Rng;
use serde_json::{Map, Value};

use crate::fields::{self, FieldKind};
use crate::overlay::{choose_overlay_with, merge_overlay, reconcile};
use crate::request::GenerationRequest;

/// Una línea de log: nombre de campo -> valor (puede ser null).
pub type LogLine = Map<String, Value>;

/// Arma una línea: campos de fábrica según el request, a lo sumo un
/// overlay encima y los campos faltantes de la lista maestra en null.
pub fn compose_line<R: Rng + ?Sized>(
    request: &GenerationRequest,
    master_fields: &BTreeSet<String>,
    rng: &mut R,
) -> LogLine {
    let mut line = LogLine::new();

    for kind in FieldKind::ALL {
        let setting = request.field_settings.get(kind);
        if setting.include {
            line.insert(
                kind.key().to_string(),
                fields::generate(kind, &setting.values, rng),
            );
        }
    }

    merge_overlay(&mut line, choose_overlay_with(&request.custom_overlays, rng));
    reconcile(&mut line, master_fields);

    line
}

/// Sorteo de repetición: lo hace quien llama, porque afecta el conteo del loop.
pub fn should_repeat<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    rng.random::<f64>() < probability
}

/// Arma un arreglo JSON `[l1,\nl2]` por tandas, sin retener las líneas ya
/// entregadas. Quien escribe manda `OPEN`, cada `frame(..)` y al final `CLOSE`.
#[derive(Debug, Default)]
pub struct ArrayFramer {
    lines: u64,
}

impl ArrayFramer {
    pub const OPEN: &'static str = "[";
    pub const CLOSE: &'static str = "]";

    pub fn new() -> Self {
        Self::default()
    }

    /// Texto de una tanda, con el separador delante si ya hubo líneas antes.
    pub fn frame(&mut self, rendered: &[String]) -> String {
        let mut out = String::with_capacity(rendered.iter().map(|l| l.len() + 2).sum());
        for line in rendered {
            if self.lines > 0 {
                out.push_str(",\n");
            }
            out.push_str(line);
            self.lines += 1;
        }
        out
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }
}

/// Una tanda suelta como arreglo JSON completo (cuerpo de un POST).
pub fn json_array(rendered: &[String]) -> String {
    let mut framer = ArrayFramer::new();
    format!("{}{}{}", ArrayFramer::OPEN, framer.frame(rendered), ArrayFramer::CLOSE)
}

/// Serializa una línea; `Value` siempre se puede mostrar, no hay error posible.
pub fn render_line(line: LogLine) -> String {
    Value::Object(line).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CustomOverlay, FieldSetting, FieldSettings};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn overlay(weight: f64, fields: Value) -> CustomOverlay {
        CustomOverlay {
            weight,
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn linea_tiene_exactamente_los_campos_incluidos() {
        let request = GenerationRequest {
            field_settings: FieldSettings::including(&[
                FieldKind::TimeStamp,
                FieldKind::Disposition,
                FieldKind::CurrentUserId,
            ]),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let line = compose_line(&request, &BTreeSet::new(), &mut rng);

        let keys: Vec<&str> = line.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["currentUserID", "disposition", "timeStamp"]);
    }

    #[test]
    fn overlay_con_peso_uno_siempre_se_aplica() {
        let mut settings = FieldSettings::including(&[FieldKind::Disposition]);
        settings.processing_time = FieldSetting::with_values(vec![json!(42)]);

        let request = GenerationRequest {
            field_settings: settings,
            custom_overlays: vec![overlay(1.0, json!({"disposition": 9, "app": "demo"}))],
            ..Default::default()
        };
        let master = crate::overlay::master_field_list(&request.custom_overlays);
        let mut rng = StdRng::seed_from_u64(2);

        for _ in 0..20 {
            let line = compose_line(&request, &master, &mut rng);
            assert_eq!(line["disposition"], json!(9));
            assert_eq!(line["app"], json!("demo"));
            assert_eq!(line["processingTime"], json!(42));
        }
    }

    #[test]
    fn sin_overlay_elegido_los_campos_maestros_quedan_en_null() {
        let request = GenerationRequest {
            custom_overlays: vec![overlay(0.0, json!({"app": "demo"}))],
            ..Default::default()
        };
        let master = crate::overlay::master_field_list(&request.custom_overlays);
        let mut rng = StdRng::seed_from_u64(3);

        let line = compose_line(&request, &master, &mut rng);

        assert_eq!(line.len(), 1);
        assert_eq!(line["app"], Value::Null);
    }

    #[test]
    fn should_repeat_en_los_extremos() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            assert!(!should_repeat(0.0, &mut rng));
            assert!(should_repeat(1.0, &mut rng));
        }
    }

    #[test]
    fn framer_por_tandas_arma_un_solo_arreglo() {
        let mut framer = ArrayFramer::new();
        let mut out = String::from(ArrayFramer::OPEN);
        out.push_str(&framer.frame(&[r#"{"a":1}"#.to_string()]));
        out.push_str(&framer.frame(&[]));
        out.push_str(&framer.frame(&[r#"{"a":2}"#.to_string(), r#"{"a":3}"#.to_string()]));
        out.push_str(ArrayFramer::CLOSE);

        assert_eq!(framer.lines(), 3);
        assert_eq!(out, "[{\"a\":1},\n{\"a\":2},\n{\"a\":3}]");

        let parsed: Vec<Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn json_array_de_una_tanda() {
        assert_eq!(json_array(&[]), "[]");

        let body = json_array(&[r#"{"a":1}"#.to_string(), r#"{"b":2}"#.to_string()]);
        let parsed: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, vec![json!({"a": 1}), json!({"b": 2})]);
    }
}
