//! Generador de valores para los campos "de fábrica" de cada línea.

use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    TimeStamp,
    ProcessingTime,
    CurrentUserId,
    BusinessGuid,
    PathToFile,
    FileSha256,
    Disposition,
}

/// Carpetas posibles para `pathToFile`
const FOLDERS: [&str; 6] = [
    "C:/Program Files",
    "C:/Windows",
    "C:/Program Files (x86)",
    "C:/Program Files (x86)/Common Files",
    "/tmp",
    "/home",
];

const EXTENSIONS: [&str; 9] = [
    ".pdf", ".xlsx", ".csv", ".txt", ".json", ".sys", ".docx", ".jpg", ".zip",
];

impl FieldKind {
    /// Orden en que se generan los campos de una línea
    pub const ALL: [FieldKind; 7] = [
        FieldKind::TimeStamp,
        FieldKind::ProcessingTime,
        FieldKind::CurrentUserId,
        FieldKind::BusinessGuid,
        FieldKind::PathToFile,
        FieldKind::FileSha256,
        FieldKind::Disposition,
    ];

    /// Nombre del campo en la línea emitida
    pub fn key(&self) -> &'static str {
        match self {
            FieldKind::TimeStamp => "timeStamp",
            FieldKind::ProcessingTime => "processingTime",
            FieldKind::CurrentUserId => "currentUserID",
            FieldKind::BusinessGuid => "businessGUID",
            FieldKind::PathToFile => "pathToFile",
            FieldKind::FileSha256 => "fileSHA256",
            FieldKind::Disposition => "disposition",
        }
    }

    pub fn from_key(key: &str) -> Option<FieldKind> {
        FieldKind::ALL.into_iter().find(|k| k.key() == key)
    }

    /// true si los valores del campo son enteros (si no, strings)
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldKind::TimeStamp | FieldKind::ProcessingTime | FieldKind::Disposition
        )
    }
}

/// Devuelve un valor para `kind`: uno del pool si no está vacío, si no uno sintético.
pub fn generate<R: Rng + ?Sized>(kind: FieldKind, pool: &[Value], rng: &mut R) -> Value {
    if let Some(value) = pool.choose(rng) {
        return value.clone();
    }

    match kind {
        FieldKind::TimeStamp => Value::from(random_timestamp(rng)),
        FieldKind::ProcessingTime => Value::from(random_processing_time(rng)),
        FieldKind::CurrentUserId | FieldKind::BusinessGuid | FieldKind::FileSha256 => {
            Value::from(random_id(rng))
        }
        FieldKind::PathToFile => Value::from(random_file_path(rng)),
        FieldKind::Disposition => Value::from(random_disposition(rng)),
    }
}

/// Segundos en [0, ahora): `ahora * random()`, sesgado hacia el pasado.
pub fn random_timestamp<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    let now = Utc::now().timestamp();
    (now as f64 * rng.random::<f64>()) as i64
}

pub fn random_processing_time<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    (rng.random::<f64>() * 1000.0) as i64
}

/// Identificador con forma de UUID, sacado del mismo generador que el resto.
pub fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

pub fn random_file_path<R: Rng + ?Sized>(rng: &mut R) -> String {
    let folder = FOLDERS[rng.random_range(0..FOLDERS.len())];
    let ext = EXTENSIONS[rng.random_range(0..EXTENSIONS.len())];
    format!("{}/{}{}", folder, random_id(rng), ext)
}

/// 1 = Clean, 2 = Suspicious, 3 = Malicious, 4 = Unknown
pub fn random_disposition<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    rng.random_range(1..=4)
}

/// Formato 8-4-4-4-12 en hexadecimal.
pub fn is_uuid_shaped(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lens = [8, 4, 4, 4, 12];

    groups.len() == lens.len()
        && groups
            .iter()
            .zip(lens)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}
