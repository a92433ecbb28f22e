//! Resolución de custom logs (overlays) ponderados.

use std::collections::BTreeSet;

use rand::Rng;
use serde_json::Value;

use crate::compose::LogLine;
use crate::fields::FieldKind;
use crate::request::{CustomOverlay, FieldSettings};

/// Recorre los overlays acumulando pesos y devuelve el primero cuyo
/// acumulado supera `draw`. Si los pesos suman menos de 1 queda un hueco
/// donde no se elige ninguno.
pub fn choose_overlay(overlays: &[CustomOverlay], draw: f64) -> Option<&CustomOverlay> {
    let mut cumulative = 0.0;

    for overlay in overlays {
        cumulative += overlay.weight;
        if cumulative > draw {
            return Some(overlay);
        }
    }

    None
}

pub fn choose_overlay_with<'a, R: Rng + ?Sized>(
    overlays: &'a [CustomOverlay],
    rng: &mut R,
) -> Option<&'a CustomOverlay> {
    if overlays.is_empty() {
        return None;
    }
    choose_overlay(overlays, rng.random::<f64>())
}

/// Los campos del overlay pisan a los de la línea y agregan los nuevos.
pub fn merge_overlay(line: &mut LogLine, overlay: Option<&CustomOverlay>) {
    let Some(overlay) = overlay else {
        return;
    };

    for (key, value) in &overlay.fields {
        line.insert(key.clone(), value.clone());
    }
}

/// Unión de los nombres de campo de todos los overlays.
pub fn master_field_list(overlays: &[CustomOverlay]) -> BTreeSet<String> {
    overlays
        .iter()
        .flat_map(|o| o.fields.keys().cloned())
        .collect()
}

/// Agrega con `null` los campos de la lista maestra que falten; nunca quita.
pub fn reconcile(line: &mut LogLine, master: &BTreeSet<String>) {
    for field in master {
        if !line.contains_key(field) {
            line.insert(field.clone(), Value::Null);
        }
    }
}

/// Saca de los overlays los campos de fábrica que el request no incluye.
pub fn strip_excluded_fields(overlays: &mut [CustomOverlay], settings: &FieldSettings) {
    let excluded: Vec<&'static str> = FieldKind::ALL
        .into_iter()
        .filter(|k| !settings.is_included(*k))
        .map(|k| k.key())
        .collect();

    for overlay in overlays.iter_mut() {
        for key in &excluded {
            overlay.fields.remove(*key);
        }
    }
}
