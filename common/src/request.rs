use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::FieldKind;

/// Configuración de un campo generado: si se incluye y, opcionalmente,
/// un pool de valores literales de donde elegir.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSetting {
    #[serde(default)]
    pub include: bool,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl FieldSetting {
    pub fn included() -> Self {
        Self {
            include: true,
            values: Vec::new(),
        }
    }

    pub fn with_values(values: Vec<Value>) -> Self {
        Self {
            include: true,
            values,
        }
    }
}

/// Las claves JSON coinciden con los nombres de campo de cada línea.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSettings {
    #[serde(default, rename = "timeStamp")]
    pub time_stamp: FieldSetting,
    #[serde(default, rename = "processingTime")]
    pub processing_time: FieldSetting,
    #[serde(default, rename = "currentUserID")]
    pub current_user_id: FieldSetting,
    #[serde(default, rename = "businessGUID")]
    pub business_guid: FieldSetting,
    #[serde(default, rename = "pathToFile")]
    pub path_to_file: FieldSetting,
    #[serde(default, rename = "fileSHA256")]
    pub file_sha256: FieldSetting,
    #[serde(default)]
    pub disposition: FieldSetting,
}

impl FieldSettings {
    pub fn get(&self, kind: FieldKind) -> &FieldSetting {
        match kind {
            FieldKind::TimeStamp => &self.time_stamp,
            FieldKind::ProcessingTime => &self.processing_time,
            FieldKind::CurrentUserId => &self.current_user_id,
            FieldKind::BusinessGuid => &self.business_guid,
            FieldKind::PathToFile => &self.path_to_file,
            FieldKind::FileSha256 => &self.file_sha256,
            FieldKind::Disposition => &self.disposition,
        }
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> &mut FieldSetting {
        match kind {
            FieldKind::TimeStamp => &mut self.time_stamp,
            FieldKind::ProcessingTime => &mut self.processing_time,
            FieldKind::CurrentUserId => &mut self.current_user_id,
            FieldKind::BusinessGuid => &mut self.business_guid,
            FieldKind::PathToFile => &mut self.path_to_file,
            FieldKind::FileSha256 => &mut self.file_sha256,
            FieldKind::Disposition => &mut self.disposition,
        }
    }

    /// Habilita los campos indicados (sin pool de valores).
    pub fn including(kinds: &[FieldKind]) -> Self {
        let mut settings = Self::default();
        for kind in kinds {
            *settings.get_mut(*kind) = FieldSetting::included();
        }
        settings
    }

    pub fn is_included(&self, kind: FieldKind) -> bool {
        self.get(kind).include
    }
}

/// Overlay definido por el usuario: con probabilidad `weight` sus campos
/// pisan a los generados en una línea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomOverlay {
    #[serde(rename = "frequency", alias = "weight")]
    pub weight: f64,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    pub number_of_logs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Líneas por segundo; sin valor se usa el default del servidor
    #[serde(default)]
    pub log_rate: Option<u32>,

    /// Si viene, cada tanda se envía por POST a esta dirección
    #[serde(default)]
    pub stream_address: Option<String>,

    /// Con `stream_address`: además guardar las líneas en un artefacto
    #[serde(default, alias = "saveLogs")]
    pub save_logs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Probabilidad (0..=1) de duplicar la línea recién generada
    #[serde(
        default,
        rename = "repeating_loglines_percent",
        alias = "repeat_probability"
    )]
    pub repeat_probability: f64,

    #[serde(default)]
    pub field_settings: FieldSettings,

    #[serde(default, rename = "custom_logs", alias = "custom_overlays")]
    pub custom_overlays: Vec<CustomOverlay>,

    #[serde(default)]
    pub batch_settings: Option<BatchSettings>,

    #[serde(default)]
    pub stream_settings: Option<StreamSettings>,
}

impl GenerationRequest {
    pub fn stream_address(&self) -> Option<&str> {
        self.stream_settings
            .as_ref()
            .and_then(|s| s.stream_address.as_deref())
            .filter(|addr| !addr.trim().is_empty())
    }

    pub fn log_rate(&self) -> Option<u32> {
        self.stream_settings.as_ref().and_then(|s| s.log_rate)
    }

    pub fn save_logs(&self) -> bool {
        self.stream_settings.as_ref().is_some_and(|s| s.save_logs)
    }
}
